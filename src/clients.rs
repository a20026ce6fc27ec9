//! Push/notify capability.
//!
//! Lets a handler address a single connected caller by identity or
//! broadcast to every connection. Addressing is always explicit: the
//! capability is handed to handler bodies through the [`HandlerContext`]
//! rather than looked up from ambient state.
//!
//! [`HandlerContext`]: crate::handler::HandlerContext

use std::sync::Arc;

use dashmap::DashMap;

use crate::emit::{EmitterHandle, OutboundMessage};
use crate::error::{HubError, Result};
use crate::invocation::{ConnectionId, Value};

/// Handle addressing connected callers.
#[derive(Clone)]
pub struct Clients {
    connections: Arc<DashMap<ConnectionId, EmitterHandle>>,
}

impl Clients {
    /// Create an empty connection set.
    pub(crate) fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Register a connection's emitter under its identity.
    pub(crate) fn register(&self, id: ConnectionId, emitter: EmitterHandle) {
        self.connections.insert(id, emitter);
    }

    /// Remove a connection. Idempotent.
    pub(crate) fn unregister(&self, id: &ConnectionId) {
        self.connections.remove(id);
    }

    /// Push a notification to one connection.
    pub async fn send_to(
        &self,
        connection: &ConnectionId,
        target: &str,
        arguments: Vec<Value>,
    ) -> Result<()> {
        let emitter = self
            .connections
            .get(connection)
            .map(|entry| entry.value().clone())
            .ok_or(HubError::ConnectionClosed)?;
        emitter
            .send(OutboundMessage::Push {
                target: target.to_string(),
                arguments,
            })
            .await
    }

    /// Push a notification to every connection.
    ///
    /// A connection whose emitter is gone is skipped; delivery to the rest
    /// proceeds.
    pub async fn broadcast(&self, target: &str, arguments: Vec<Value>) -> Result<()> {
        let emitters: Vec<EmitterHandle> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for emitter in emitters {
            if let Err(e) = emitter
                .send(OutboundMessage::Push {
                    target: target.to_string(),
                    arguments: arguments.clone(),
                })
                .await
            {
                tracing::debug!("broadcast skipped closed connection: {}", e);
            }
        }
        Ok(())
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
