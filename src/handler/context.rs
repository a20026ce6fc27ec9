//! Execution context passed to handler bodies.
//!
//! Carries the caller's connection identity, the invocation id, the push
//! capability, and the connection's cancellation token. Producer tasks for
//! streaming handlers are spawned through [`HandlerContext::spawn`] so that
//! aborting the connection reaches every one of them; there are no unlinked
//! background tasks.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clients::Clients;
use crate::invocation::{ConnectionId, InvocationId};

/// Context handed to every handler invocation.
///
/// `HandlerContext` is `Clone` and can be moved into spawned producer tasks.
#[derive(Clone)]
pub struct HandlerContext {
    connection: ConnectionId,
    invocation: InvocationId,
    clients: Clients,
    cancel: CancellationToken,
}

impl HandlerContext {
    /// Create a new context.
    pub(crate) fn new(
        connection: ConnectionId,
        invocation: InvocationId,
        clients: Clients,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connection,
            invocation,
            clients,
            cancel,
        }
    }

    /// Identity of the calling connection.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection
    }

    /// Id of the invocation this handler is serving.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation
    }

    /// Push capability: address one caller or broadcast to all.
    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    /// The connection's cancellation token.
    ///
    /// Long-running handler bodies should check this at their own suspension
    /// points (e.g. between delayed stream items).
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the connection has been aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Abort the owning connection (the kill-connection pattern).
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Spawn a producer task registered against this invocation's
    /// connection: it is dropped as soon as the connection is aborted.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = future => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Clients;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_context() -> HandlerContext {
        HandlerContext::new(
            ConnectionId::from("conn-1"),
            InvocationId::from("inv-1"),
            Clients::new(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_identities() {
        let ctx = test_context();
        assert_eq!(ctx.connection_id().as_str(), "conn-1");
        assert_eq!(ctx.invocation_id().as_str(), "inv-1");
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_abort_cancels_token() {
        let ctx = test_context();
        ctx.abort();
        assert!(ctx.is_cancelled());
        assert!(ctx.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_spawn_runs_to_completion() {
        let ctx = test_context();
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = done.clone();

        ctx.spawn(async move {
            done_clone.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawn_stops_on_abort() {
        let ctx = test_context();
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = done.clone();

        let task = ctx.spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            done_clone.store(true, Ordering::SeqCst);
        });

        ctx.abort();
        task.await.unwrap();
        assert!(!done.load(Ordering::SeqCst));
    }
}
