//! Hub builder and connection lifecycle.
//!
//! The [`HubBuilder`] provides a fluent API for registering handlers; the
//! built [`Hub`] is immutable and can serve many connections. Attaching a
//! transport yields a [`HubConnection`]:
//! 1. Spawn the connection's emitter task
//! 2. Register the emitter under the connection identity for push addressing
//! 3. Feed inbound payloads through [`HubConnection::delegate`], or hand
//!    decoded invocations to [`HubConnection::dispatch`] directly
//! 4. `abort()` (or the transport's close callback, via the delegate)
//!    cancels every in-flight invocation and detaches the connection
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hublink::hub::Hub;
//! use hublink::handler::arg;
//! use hublink::invocation::{Invocation, Value};
//! use hublink::transport::{MemTransport, Transport};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let hub = Hub::builder()
//!     .unary("Echo", 1, |_ctx, args| async move {
//!         let message: String = arg(&args, 0)?;
//!         Ok(Value::String(message))
//!     })
//!     .build();
//!
//! let transport = Arc::new(MemTransport::new());
//! transport.start("mem://demo", "").unwrap();
//! let connection = hub.attach("conn-1".into(), transport);
//! connection
//!     .dispatch(Invocation::new("inv-1", "Echo", vec!["hi".into()]))
//!     .await
//!     .unwrap();
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::channel::StreamReceiver;
use crate::clients::Clients;
use crate::codec::MsgPackCodec;
use crate::dispatch::Dispatcher;
use crate::emit::{spawn_emitter_task, EmitterConfig};
use crate::error::Result;
use crate::handler::{HandlerContext, HandlerRegistry, HandlerShape};
use crate::invocation::{ConnectionId, Invocation, InvocationFrame, Value};
use crate::transport::{Transport, TransportDelegate, TransportError};

/// Builder for configuring a hub.
pub struct HubBuilder {
    registry: HandlerRegistry,
    emitter_config: EmitterConfig,
}

impl HubBuilder {
    /// Create a new hub builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            emitter_config: EmitterConfig::default(),
        }
    }

    /// Register a handler of any shape under `(name, arity)`.
    pub fn method(mut self, name: &str, arity: usize, shape: HandlerShape) -> Self {
        self.registry.register(name, arity, shape);
        self
    }

    /// Register a unary handler: returns exactly one value or fails.
    pub fn unary<F, Fut>(self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.method(name, arity, HandlerShape::unary(f))
    }

    /// Register a push handler: one-way, nothing emitted back.
    pub fn push<F, Fut>(self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.method(name, arity, HandlerShape::push(f))
    }

    /// Register a server-stream handler.
    pub fn server_stream<F>(self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Result<StreamReceiver<Value>> + Send + Sync + 'static,
    {
        self.method(name, arity, HandlerShape::server_stream(f))
    }

    /// Register a client-stream handler.
    pub fn client_stream<F, Fut>(self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.method(name, arity, HandlerShape::client_stream(f))
    }

    /// Register a bidirectional-stream handler.
    pub fn bidi_stream<F>(self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> Result<StreamReceiver<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.method(name, arity, HandlerShape::bidi_stream(f))
    }

    /// Set the emitter queue capacity per connection.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.emitter_config.channel_capacity = capacity;
        self
    }

    /// Build the hub. The registry is immutable from here on.
    pub fn build(self) -> Hub {
        Hub {
            registry: Arc::new(self.registry),
            clients: Clients::new(),
            emitter_config: self.emitter_config,
        }
    }
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable hub serving any number of connections.
pub struct Hub {
    registry: Arc<HandlerRegistry>,
    clients: Clients,
    emitter_config: EmitterConfig,
}

impl Hub {
    /// Create a new hub builder.
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// The push capability over all attached connections.
    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Attach a transport under a connection identity.
    ///
    /// Spawns the connection's emitter task and registers it for push
    /// addressing. The transport must already be open.
    pub fn attach(&self, connection: ConnectionId, transport: Arc<dyn Transport>) -> HubConnection {
        let cancel = CancellationToken::new();
        let (emitter, _emitter_task) = spawn_emitter_task(
            transport.clone(),
            self.emitter_config.clone(),
            cancel.clone(),
        );
        self.clients.register(connection.clone(), emitter.clone());

        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            emitter,
            self.clients.clone(),
            connection.clone(),
            cancel.clone(),
        );

        // Teardown watcher: aborting from anywhere (connection handle,
        // handler context, transport close callback) funnels through the
        // token.
        {
            let token = cancel.clone();
            let transport = transport.clone();
            let clients = self.clients.clone();
            let connection = connection.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                tracing::debug!("connection {} aborted, closing transport", connection);
                transport.close();
                clients.unregister(&connection);
            });
        }

        HubConnection {
            connection,
            dispatcher,
            cancel,
        }
    }
}

/// One live connection: the entry point feeding decoded invocations into
/// the dispatcher, plus teardown.
pub struct HubConnection {
    connection: ConnectionId,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl HubConnection {
    /// Identity of this connection.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection
    }

    /// Dispatch one decoded invocation.
    ///
    /// Called from the transport delegate's data callback after decoding.
    /// Returns the invocation's task handle; the caller need not await it.
    pub fn dispatch(&self, invocation: Invocation) -> tokio::task::JoinHandle<()> {
        self.dispatcher.dispatch(invocation)
    }

    /// Abort the connection: cancel every in-flight invocation's producer,
    /// suppress further emissions, close the transport, and unregister from
    /// push addressing. Idempotent.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Whether the connection has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Build the delegate wiring this connection to its transport's
    /// callbacks: inbound payloads decode into invocations, a close from the
    /// transport side aborts the connection.
    pub fn delegate(&self) -> ConnectionDelegate {
        ConnectionDelegate {
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Adapter feeding a transport's lifecycle callbacks into one connection.
pub struct ConnectionDelegate {
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl TransportDelegate for ConnectionDelegate {
    fn on_open(&self) {
        tracing::debug!("transport open for {}", self.dispatcher.connection_id());
    }

    fn on_data(&self, data: Bytes) {
        match MsgPackCodec::decode::<InvocationFrame>(&data) {
            Ok(frame) => {
                let _ = self.dispatcher.dispatch(frame.into());
            }
            Err(e) => tracing::warn!(
                "dropping undecodable payload on {}: {}",
                self.dispatcher.connection_id(),
                e
            ),
        }
    }

    fn on_close(&self, error: Option<TransportError>) {
        match error {
            Some(e) => tracing::warn!(
                "transport on {} closed with error: {}",
                self.dispatcher.connection_id(),
                e
            ),
            None => tracing::debug!("transport closed for {}", self.dispatcher.connection_id()),
        }
        self.cancel.cancel();
    }
}
