//! Streaming channel primitive.
//!
//! An unbounded FIFO conduit with a one-time completion signal. The producer
//! side ([`StreamSender`]) is owned by the handler task, the consumer side
//! ([`StreamReceiver`]) by the streaming bridge. Completion is idempotent and
//! may carry a terminal error; items enqueued before the terminal signal are
//! always delivered before it.
//!
//! # Example
//!
//! ```
//! use hublink::channel::{stream_channel, StreamEvent};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let (tx, mut rx) = stream_channel::<i32>();
//! tx.send(1).unwrap();
//! tx.send(2).unwrap();
//! tx.complete();
//!
//! assert!(matches!(rx.recv().await, StreamEvent::Item(1)));
//! assert!(matches!(rx.recv().await, StreamEvent::Item(2)));
//! assert!(matches!(rx.recv().await, StreamEvent::End(None)));
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{HubError, Result};

/// Terminal error carried by a faulted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The producer signalled a fault.
    Faulted(String),
    /// The producer was cancelled (or vanished without completing).
    Cancelled,
}

impl StreamError {
    /// Human-readable message, as sent to the caller.
    pub fn message(&self) -> &str {
        match self {
            StreamError::Faulted(msg) => msg,
            StreamError::Cancelled => "invocation cancelled",
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// An event observed by the channel consumer.
#[derive(Debug, PartialEq)]
pub enum StreamEvent<T> {
    /// A produced item, in FIFO order.
    Item(T),
    /// The terminal signal: delivered exactly once, after all items.
    End(Option<StreamError>),
}

/// Internal wire between sender and receiver.
#[derive(Debug)]
enum Signal<T> {
    Item(T),
    End(Option<StreamError>),
}

/// Producer side of a streaming channel.
///
/// Cheap to clone so a handler can hand it to a spawned producer task, but
/// the completion transition is shared: once any clone completes the channel,
/// all further writes fail.
#[derive(Debug)]
pub struct StreamSender<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
    completed: Arc<AtomicBool>,
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            completed: self.completed.clone(),
        }
    }
}

/// Consumer side of a streaming channel.
#[derive(Debug)]
pub struct StreamReceiver<T> {
    rx: mpsc::UnboundedReceiver<Signal<T>>,
    terminated: bool,
}

/// Create an unbounded streaming channel.
pub fn stream_channel<T>() -> (StreamSender<T>, StreamReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StreamSender {
            tx,
            completed: Arc::new(AtomicBool::new(false)),
        },
        StreamReceiver {
            rx,
            terminated: false,
        },
    )
}

impl<T> StreamSender<T> {
    /// Write an item into the channel.
    ///
    /// Never blocks (the channel is unbounded). Fails with
    /// [`HubError::ChannelCompleted`] if the channel was already completed,
    /// and with [`HubError::Cancelled`] if the consumer is gone.
    pub fn send(&self, item: T) -> Result<()> {
        if self.completed.load(Ordering::Acquire) {
            return Err(HubError::ChannelCompleted);
        }
        self.tx
            .send(Signal::Item(item))
            .map_err(|_| HubError::Cancelled)
    }

    /// Signal normal completion.
    ///
    /// Idempotent: only the first call enqueues the terminal signal; repeats
    /// return `false` and have no effect.
    pub fn complete(&self) -> bool {
        self.terminate(None)
    }

    /// Signal completion with a terminal error.
    ///
    /// Items already enqueued are still delivered before the fault.
    pub fn fault(&self, error: StreamError) -> bool {
        self.terminate(Some(error))
    }

    /// Whether the channel has been completed or faulted.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn terminate(&self, error: Option<StreamError>) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Receiver may already be dropped; the transition still counts.
        let _ = self.tx.send(Signal::End(error));
        true
    }
}

impl<T> StreamReceiver<T> {
    /// Receive the next event, suspending until one is available.
    ///
    /// After the terminal event has been observed (or the producer vanished
    /// without completing, which reads as `End(Some(Cancelled))`), every
    /// subsequent call returns `End(None)`-shaped termination again; callers
    /// are expected to stop at the first `End`.
    pub async fn recv(&mut self) -> StreamEvent<T> {
        if self.terminated {
            return StreamEvent::End(None);
        }
        match self.rx.recv().await {
            Some(Signal::Item(item)) => StreamEvent::Item(item),
            Some(Signal::End(error)) => {
                self.terminated = true;
                StreamEvent::End(error)
            }
            None => {
                self.terminated = true;
                StreamEvent::End(Some(StreamError::Cancelled))
            }
        }
    }

    /// Collect all remaining items, returning them with the terminal error.
    ///
    /// Consumes events until the terminal signal.
    pub async fn collect(mut self) -> (Vec<T>, Option<StreamError>) {
        let mut items = Vec::new();
        loop {
            match self.recv().await {
                StreamEvent::Item(item) => items.push(item),
                StreamEvent::End(error) => return (items, error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = stream_channel();
        for i in 0..5 {
            tx.send(i).unwrap();
        }
        tx.complete();

        for i in 0..5 {
            assert_eq!(rx.recv().await, StreamEvent::Item(i));
        }
        assert_eq!(rx.recv().await, StreamEvent::End(None));
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let (tx, mut rx) = stream_channel::<i32>();
        assert!(tx.complete());
        assert!(!tx.complete());
        assert!(!tx.fault(StreamError::Faulted("late".into())));

        assert_eq!(rx.recv().await, StreamEvent::End(None));
        // No duplicate terminal signal queued behind the first.
        assert_eq!(rx.recv().await, StreamEvent::End(None));
    }

    #[tokio::test]
    async fn test_send_after_complete_fails() {
        let (tx, _rx) = stream_channel();
        tx.complete();
        assert!(matches!(tx.send(1), Err(HubError::ChannelCompleted)));
    }

    #[tokio::test]
    async fn test_items_delivered_before_fault() {
        let (tx, mut rx) = stream_channel();
        tx.send("abc").unwrap();
        tx.fault(StreamError::Faulted("stream error".into()));

        assert_eq!(rx.recv().await, StreamEvent::Item("abc"));
        assert_eq!(
            rx.recv().await,
            StreamEvent::End(Some(StreamError::Faulted("stream error".into())))
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_reads_as_cancelled() {
        let (tx, mut rx) = stream_channel::<i32>();
        tx.send(7).unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, StreamEvent::Item(7));
        assert_eq!(rx.recv().await, StreamEvent::End(Some(StreamError::Cancelled)));
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_fails() {
        let (tx, rx) = stream_channel();
        drop(rx);
        assert!(matches!(tx.send(1), Err(HubError::Cancelled)));
    }

    #[tokio::test]
    async fn test_collect() {
        let (tx, rx) = stream_channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.complete();

        let (items, error) = rx.collect().await;
        assert_eq!(items, vec![1, 2]);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_clone_shares_completion() {
        let (tx, _rx) = stream_channel::<i32>();
        let tx2 = tx.clone();
        assert!(tx.complete());
        assert!(tx2.is_completed());
        assert!(matches!(tx2.send(1), Err(HubError::ChannelCompleted)));
    }
}
