//! Invocation dispatcher.
//!
//! Resolves a decoded invocation against the handler registry by exact
//! `(name, arity)`, then executes the handler under its shape. Every
//! invocation runs on its own task so a slow or infinite producer never
//! blocks dispatch of other invocations on the same connection. Outcomes are
//! handed to the emitter immediately; nothing is buffered here.
//!
//! Dispatch-time errors (unknown method, arity mismatch, invalid argument)
//! never execute the handler and surface as an immediate failure completion.
//! Handler-level failures are caught and converted to a faulted outcome so
//! one bad invocation cannot fault the shared connection.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::pump_stream;
use crate::clients::Clients;
use crate::emit::{EmitterHandle, Outcome};
use crate::handler::{HandlerContext, HandlerRegistry, HandlerShape};
use crate::invocation::{ConnectionId, Invocation};

/// Per-connection dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    emitter: EmitterHandle,
    clients: Clients,
    connection: ConnectionId,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher bound to one connection.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        emitter: EmitterHandle,
        clients: Clients,
        connection: ConnectionId,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            emitter,
            clients,
            connection,
            cancel,
        }
    }

    /// Dispatch one invocation on its own task.
    ///
    /// The returned handle resolves once the invocation's terminal message
    /// has been emitted (or the connection was aborted).
    pub fn dispatch(&self, invocation: Invocation) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let emitter = self.emitter.clone();
        let clients = self.clients.clone();
        let connection = self.connection.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            run_invocation(registry, emitter, clients, connection, cancel, invocation).await;
        })
    }

    /// The connection this dispatcher serves.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection
    }
}

async fn run_invocation(
    registry: Arc<HandlerRegistry>,
    emitter: EmitterHandle,
    clients: Clients,
    connection: ConnectionId,
    cancel: CancellationToken,
    mut invocation: Invocation,
) {
    let id = invocation.id.clone();
    let shape = match registry.resolve(&invocation.method, invocation.arguments.len()) {
        Ok(shape) => shape,
        Err(e) => {
            tracing::warn!("dispatch failed for '{}': {}", invocation.method, e);
            let _ = emitter.emit(&id, Outcome::Faulted(e.to_string())).await;
            return;
        }
    };

    tracing::debug!(
        "dispatching {} as {:?} (invocation {})",
        invocation.method,
        shape,
        id
    );

    let ctx = HandlerContext::new(connection, id.clone(), clients, cancel.clone());
    let args = std::mem::take(&mut invocation.arguments);

    match shape {
        HandlerShape::Unary(f) => {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = f(ctx, args) => match result {
                    Ok(value) => Outcome::Completed(value),
                    Err(e) => Outcome::Faulted(e.to_string()),
                },
            };
            let _ = emitter.emit(&id, outcome).await;
        }
        HandlerShape::Push(f) => {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = f(ctx, args) => match result {
                    Ok(()) => Outcome::Void,
                    Err(e) => {
                        tracing::error!("push handler faulted (invocation {}): {}", id, e);
                        Outcome::Faulted(e.to_string())
                    }
                },
            };
            let _ = emitter.emit(&id, outcome).await;
        }
        HandlerShape::ServerStream(f) => match f(ctx, args) {
            Ok(rx) => pump_stream(id, rx, emitter, cancel).await,
            Err(e) => {
                let _ = emitter.emit(&id, stream_setup_failure(e)).await;
            }
        },
        HandlerShape::ClientStream(f) => {
            let Some(input) = invocation.input.take() else {
                let _ = emitter.emit(&id, missing_input(&invocation.method)).await;
                return;
            };
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = f(ctx, input, args) => match result {
                    Ok(value) => Outcome::Completed(value),
                    Err(e) => Outcome::Faulted(e.to_string()),
                },
            };
            let _ = emitter.emit(&id, outcome).await;
        }
        HandlerShape::BidiStream(f) => {
            let Some(input) = invocation.input.take() else {
                let _ = emitter.emit(&id, missing_input(&invocation.method)).await;
                return;
            };
            match f(ctx, input, args) {
                Ok(rx) => pump_stream(id, rx, emitter, cancel).await,
                Err(e) => {
                    let _ = emitter.emit(&id, stream_setup_failure(e)).await;
                }
            }
        }
    }
}

/// A streaming handler that failed before producing its channel still owes
/// the caller a terminal signal.
fn stream_setup_failure(e: crate::error::HubError) -> Outcome {
    Outcome::StreamEnd(Some(crate::channel::StreamError::Faulted(e.to_string())))
}

fn missing_input(method: &str) -> Outcome {
    let e = crate::error::HubError::InvalidArgument(format!(
        "method '{}' requires a client stream",
        method
    ));
    tracing::warn!("{}", e);
    Outcome::Faulted(e.to_string())
}
