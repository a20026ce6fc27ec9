//! In-memory transport for tests and in-process wiring.
//!
//! Captures every sent payload and exposes it to the test side through an
//! unbounded channel. Send failures can be injected to exercise the
//! emitter's cancellation path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{Transport, TransportError};

/// A loopback transport that records outbound payloads.
pub struct MemTransport {
    open: AtomicBool,
    fail_sends: AtomicBool,
    sent_tx: mpsc::UnboundedSender<Bytes>,
    sent_rx: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
}

impl MemTransport {
    /// Create a new in-memory transport.
    pub fn new() -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        Self {
            open: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            sent_tx,
            sent_rx: Mutex::new(Some(sent_rx)),
        }
    }

    /// Take the receiver observing sent payloads. Can be taken once.
    pub fn take_sent(&self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.sent_rx.lock().ok()?.take()
    }

    /// Make every subsequent `send` fail with [`TransportError::SendFailed`].
    pub fn inject_send_failure(&self) {
        self.fail_sends.store(true, Ordering::Release);
    }

    /// Whether the transport is currently open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemTransport {
    fn start(&self, _endpoint: &str, _query: &str) -> Result<(), TransportError> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(TransportError::SendFailed("injected failure".into()));
        }
        self.sent_tx
            .send(data)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}
