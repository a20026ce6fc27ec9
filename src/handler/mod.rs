//! Handler module - handler shapes, registry, and execution context.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps `(method name, arity)` to a handler shape
//! - [`HandlerShape`] - the five structural patterns a handler can follow
//! - [`HandlerContext`] - connection identity, push capability and
//!   cancellation, passed into every handler body
//!
//! # Example
//!
//! ```
//! use hublink::handler::{HandlerRegistry, HandlerShape, arg};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(
//!     "Echo",
//!     1,
//!     HandlerShape::unary(|_ctx, args| async move {
//!         let message: String = arg(&args, 0)?;
//!         Ok(serde_json::Value::String(message))
//!     }),
//! );
//! ```

mod context;
mod registry;

pub use context::HandlerContext;
pub use registry::{
    arg, BidiStreamFn, BoxFuture, ClientStreamFn, HandlerRegistry, HandlerShape, PushFn,
    ServerStreamFn, UnaryFn,
};
