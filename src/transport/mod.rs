//! Transport interface consumed by the hub core.
//!
//! The core does not implement any network transport. It depends on this
//! contract: a transport is started once, carries opaque byte payloads while
//! open, and reports lifecycle changes to a single delegate. Wire framing,
//! handshakes and reconnection all live behind this boundary.

mod mem;

use bytes::Bytes;
use thiserror::Error;

pub use mem::MemTransport;

/// Transport-level failure, not attributable to any handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// `send` was called but the write failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The transport is not open (never started, or already closed).
    #[error("transport closed")]
    Closed,
}

/// A single-connection byte transport.
///
/// `send` is only valid between `start` and `close`; `close` is idempotent.
/// One instance serves exactly one connection.
pub trait Transport: Send + Sync + 'static {
    /// Open the connection to the given endpoint.
    fn start(&self, endpoint: &str, query: &str) -> Result<(), TransportError>;

    /// Send one outbound payload. Fails with [`TransportError`] on failure.
    fn send(&self, data: Bytes) -> Result<(), TransportError>;

    /// Close the connection. Safe to call more than once.
    fn close(&self);
}

/// Delegate notified of transport lifecycle events.
///
/// The `on_data` callback is the sole entry point feeding decoded
/// invocations toward the dispatcher. A transport must not invoke the
/// delegate concurrently for the same connection.
pub trait TransportDelegate: Send + Sync {
    /// The connection transitioned to open.
    fn on_open(&self);

    /// A payload arrived from the remote side.
    fn on_data(&self, data: Bytes);

    /// The connection closed, normally or with an error.
    fn on_close(&self, error: Option<TransportError>);
}
