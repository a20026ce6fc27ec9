//! # hublink
//!
//! Real-time invocation hub core: a single persistent connection over which
//! a caller issues remote method invocations and receives results. An
//! invocation may be unary, one-way push, server-streamed, client-streamed,
//! or streamed in both directions concurrently.
//!
//! ## Architecture
//!
//! - **Dispatcher**: routes a decoded invocation to its handler by exact
//!   `(method name, arity)` and runs it under one of five shapes
//! - **Streaming bridge**: drains handler output channels to the emitter in
//!   strict FIFO order; items are never overtaken by the terminal signal
//! - **Result emitter**: one writer task per connection serializes every
//!   outbound message over the shared transport
//!
//! Wire framing, handshakes and concrete network transports live behind the
//! [`transport::Transport`] boundary and are not part of this crate.
//!
//! ## Example
//!
//! ```ignore
//! use hublink::hub::Hub;
//! use hublink::channel::stream_channel;
//! use hublink::invocation::Value;
//!
//! let hub = Hub::builder()
//!     .unary("Echo", 1, |_ctx, args| async move { Ok(args[0].clone()) })
//!     .server_stream("Count", 1, |ctx, args| {
//!         let count: i64 = hublink::handler::arg(&args, 0)?;
//!         let (tx, rx) = stream_channel();
//!         ctx.spawn(async move {
//!             for i in 0..count {
//!                 if tx.send(Value::from(i)).is_err() { return; }
//!             }
//!             tx.complete();
//!         });
//!         Ok(rx)
//!     })
//!     .build();
//! ```

pub mod bridge;
pub mod channel;
pub mod clients;
pub mod codec;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod handler;
pub mod hub;
pub mod invocation;
pub mod transport;

pub use channel::{stream_channel, StreamError, StreamEvent, StreamReceiver, StreamSender};
pub use clients::Clients;
pub use dispatch::Dispatcher;
pub use emit::{EmitterConfig, EmitterHandle, Outcome, OutboundMessage};
pub use error::{HubError, Result};
pub use hub::{ConnectionDelegate, Hub, HubBuilder, HubConnection};
pub use invocation::{ConnectionId, Invocation, InvocationFrame, InvocationId, Value};
