//! Result emitter: single-writer discipline over the shared transport.
//!
//! Invocation processing is concurrent, but the connection's transport send
//! path is one shared resource. A dedicated emitter task owns it; handlers
//! and bridges enqueue [`OutboundMessage`]s through a cheaply cloneable
//! [`EmitterHandle`] and never touch the transport directly.
//!
//! # Architecture
//!
//! ```text
//! Invocation 1 ─┐
//! Invocation 2 ─┼─► mpsc::Sender<OutboundMessage> ─► Emitter Task ─► Transport
//! Invocation N ─┘
//! ```
//!
//! A transport send failure marks the affected invocation as cancelled:
//! messages already queued for it are dropped and its bridge stops draining.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::StreamError;
use crate::codec::MsgPackCodec;
use crate::error::{HubError, Result};
use crate::invocation::{InvocationId, Value};
use crate::transport::Transport;

/// Default emitter queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The outcome of (part of) one invocation, as produced by the dispatcher
/// and the streaming bridge.
#[derive(Debug)]
pub enum Outcome {
    /// Unary success carrying the return value.
    Completed(Value),
    /// Push-shaped call: nothing is emitted to the caller.
    Void,
    /// Dispatch-time or handler-level failure.
    Faulted(String),
    /// One stream item; zero or more per invocation.
    StreamItem(Value),
    /// Terminal stream signal; exactly once, after all items.
    StreamEnd(Option<StreamError>),
}

/// One serialized message bound for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Terminal message for a unary or faulted invocation.
    #[serde(rename_all = "camelCase")]
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    /// One item of a server or bidirectional stream.
    #[serde(rename_all = "camelCase")]
    StreamItem { invocation_id: String, item: Value },
    /// Terminal message for a streaming invocation.
    #[serde(rename_all = "camelCase")]
    StreamEnd {
        invocation_id: String,
        error: Option<String>,
    },
    /// Server-to-client notification; not tied to an invocation.
    #[serde(rename_all = "camelCase")]
    Push { target: String, arguments: Vec<Value> },
}

impl OutboundMessage {
    fn invocation_id(&self) -> Option<&str> {
        match self {
            OutboundMessage::Completion { invocation_id, .. }
            | OutboundMessage::StreamItem { invocation_id, .. }
            | OutboundMessage::StreamEnd { invocation_id, .. } => Some(invocation_id),
            OutboundMessage::Push { .. } => None,
        }
    }
}

/// Configuration for the emitter task.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Capacity of the outbound message queue.
    pub channel_capacity: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for enqueueing outbound messages.
///
/// Cheaply cloneable; shared by the dispatcher, every bridge task, and the
/// push capability.
#[derive(Clone)]
pub struct EmitterHandle {
    tx: mpsc::Sender<OutboundMessage>,
    cancelled: Arc<DashSet<InvocationId>>,
}

impl EmitterHandle {
    /// Emit an outcome for the given invocation.
    ///
    /// Fails with [`HubError::Cancelled`] if the invocation was cancelled by
    /// an earlier transport failure, which is the bridge's signal to stop
    /// draining its channel.
    pub async fn emit(&self, id: &InvocationId, outcome: Outcome) -> Result<()> {
        if self.cancelled.contains(id) {
            return Err(HubError::Cancelled);
        }
        let message = match outcome {
            Outcome::Completed(value) => OutboundMessage::Completion {
                invocation_id: id.0.clone(),
                result: Some(value),
                error: None,
            },
            Outcome::Void => return Ok(()),
            Outcome::Faulted(error) => OutboundMessage::Completion {
                invocation_id: id.0.clone(),
                result: None,
                error: Some(error),
            },
            Outcome::StreamItem(item) => OutboundMessage::StreamItem {
                invocation_id: id.0.clone(),
                item,
            },
            Outcome::StreamEnd(error) => OutboundMessage::StreamEnd {
                invocation_id: id.0.clone(),
                error: error.map(|e| e.message().to_string()),
            },
        };
        self.send(message).await
    }

    /// Enqueue a raw outbound message (used by the push capability).
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| HubError::ConnectionClosed)
    }

    /// Whether emission for this invocation has been cancelled.
    pub fn is_cancelled(&self, id: &InvocationId) -> bool {
        self.cancelled.contains(id)
    }

    /// Mark an invocation as cancelled: queued and future messages for it
    /// are dropped.
    pub fn cancel(&self, id: InvocationId) {
        self.cancelled.insert(id);
    }
}

/// Spawn the emitter task writing through the given transport.
///
/// The task is linked to the connection's cancellation token: aborting the
/// connection stops the loop and drops whatever is still queued, so nothing
/// is written after an abort.
pub fn spawn_emitter_task(
    transport: Arc<dyn Transport>,
    config: EmitterConfig,
    cancel: CancellationToken,
) -> (EmitterHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let cancelled = Arc::new(DashSet::new());
    let handle = EmitterHandle {
        tx,
        cancelled: cancelled.clone(),
    };
    let task = tokio::spawn(emitter_loop(rx, transport, cancelled, cancel));
    (handle, task)
}

/// Main emitter loop: serialize and send, one message at a time.
async fn emitter_loop(
    mut rx: mpsc::Receiver<OutboundMessage>,
    transport: Arc<dyn Transport>,
    cancelled: Arc<DashSet<InvocationId>>,
    cancel: CancellationToken,
) {
    loop {
        // Biased so an abort always wins over a ready queue.
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            message = rx.recv() => match message {
                Some(message) => message,
                None => return,
            },
        };

        // Skip leftovers of invocations cancelled by an earlier failure.
        if let Some(id) = message.invocation_id() {
            if cancelled.contains(&InvocationId(id.to_string())) {
                continue;
            }
        }

        let payload = match MsgPackCodec::encode(&message) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::error!("failed to encode outbound message: {}", e);
                continue;
            }
        };

        if let Err(e) = transport.send(payload) {
            match message.invocation_id() {
                Some(id) => {
                    tracing::warn!("send failed for invocation {}: {}", id, e);
                    cancelled.insert(InvocationId(id.to_string()));
                }
                None => tracing::warn!("send failed for push message: {}", e),
            }
        }
    }
}
