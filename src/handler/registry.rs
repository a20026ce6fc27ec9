//! Handler registry: `(method name, arity)` resolution.
//!
//! Lookup is by exact name and argument count. There is no overload
//! resolution beyond arity and no default-filling of missing arguments;
//! callers pick the correctly-suffixed name for their argument count. The
//! registry is populated at setup time and immutable once the hub is built.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;

use super::HandlerContext;
use crate::channel::StreamReceiver;
use crate::error::{HubError, Result};
use crate::invocation::Value;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Unary handler: returns exactly one value or fails.
pub type UnaryFn =
    Box<dyn Fn(HandlerContext, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Push handler: one-way, nothing is emitted back to the caller.
pub type PushFn =
    Box<dyn Fn(HandlerContext, Vec<Value>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Server-stream handler: returns the consumer side of a channel its
/// producer task writes to.
pub type ServerStreamFn =
    Box<dyn Fn(HandlerContext, Vec<Value>) -> Result<StreamReceiver<Value>> + Send + Sync>;

/// Client-stream handler: consumes the caller's input stream fully, then
/// returns one value.
pub type ClientStreamFn = Box<
    dyn Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> BoxFuture<'static, Result<Value>>
        + Send
        + Sync,
>;

/// Bidirectional handler: consumes the input stream while concurrently
/// producing an output stream.
pub type BidiStreamFn = Box<
    dyn Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> Result<StreamReceiver<Value>>
        + Send
        + Sync,
>;

/// The five structural patterns a registered handler can follow.
pub enum HandlerShape {
    /// `(args) -> value`
    Unary(UnaryFn),
    /// `(args) -> ()`, one-way notification handling.
    Push(PushFn),
    /// `(args) -> stream of value`
    ServerStream(ServerStreamFn),
    /// `(input stream, args) -> value`
    ClientStream(ClientStreamFn),
    /// `(input stream, args) -> stream of value`
    BidiStream(BidiStreamFn),
}

impl HandlerShape {
    /// Build a unary shape from an async closure.
    pub fn unary<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        HandlerShape::Unary(Box::new(move |ctx, args| Box::pin(f(ctx, args))))
    }

    /// Build a push shape from an async closure.
    pub fn push<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        HandlerShape::Push(Box::new(move |ctx, args| Box::pin(f(ctx, args))))
    }

    /// Build a server-stream shape.
    pub fn server_stream<F>(f: F) -> Self
    where
        F: Fn(HandlerContext, Vec<Value>) -> Result<StreamReceiver<Value>> + Send + Sync + 'static,
    {
        HandlerShape::ServerStream(Box::new(f))
    }

    /// Build a client-stream shape from an async closure.
    pub fn client_stream<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        HandlerShape::ClientStream(Box::new(move |ctx, input, args| {
            Box::pin(f(ctx, input, args))
        }))
    }

    /// Build a bidirectional shape.
    pub fn bidi_stream<F>(f: F) -> Self
    where
        F: Fn(HandlerContext, StreamReceiver<Value>, Vec<Value>) -> Result<StreamReceiver<Value>>
            + Send
            + Sync
            + 'static,
    {
        HandlerShape::BidiStream(Box::new(f))
    }

    /// Whether this shape consumes a caller-supplied input stream.
    pub fn takes_input_stream(&self) -> bool {
        matches!(
            self,
            HandlerShape::ClientStream(_) | HandlerShape::BidiStream(_)
        )
    }
}

impl std::fmt::Debug for HandlerShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandlerShape::Unary(_) => "Unary",
            HandlerShape::Push(_) => "Push",
            HandlerShape::ServerStream(_) => "ServerStream",
            HandlerShape::ClientStream(_) => "ClientStream",
            HandlerShape::BidiStream(_) => "BidiStream",
        };
        f.write_str(name)
    }
}

/// Registry mapping `(method name, arity)` pairs to handler shapes.
#[derive(Default)]
pub struct HandlerRegistry {
    // Name first, then arity: a present name with a missing arity is an
    // arity mismatch, not an unknown method.
    methods: HashMap<String, BTreeMap<usize, HandlerShape>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `(name, arity)`.
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register(&mut self, name: &str, arity: usize, shape: HandlerShape) {
        self.methods
            .entry(name.to_string())
            .or_default()
            .insert(arity, shape);
    }

    /// Resolve a handler for the given name and argument count.
    pub fn resolve(&self, name: &str, argc: usize) -> Result<&HandlerShape> {
        let arities = self
            .methods
            .get(name)
            .ok_or_else(|| HubError::UnknownMethod(name.to_string()))?;
        arities.get(&argc).ok_or_else(|| HubError::ArityMismatch {
            method: name.to_string(),
            argc,
        })
    }

    /// Whether any handler is registered under this name.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Number of registered `(name, arity)` pairs.
    pub fn len(&self) -> usize {
        self.methods.values().map(|a| a.len()).sum()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Decode one positional argument.
///
/// Fails with [`HubError::InvalidArgument`] when the slot is missing or the
/// value cannot be bound to `T`.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T> {
    let value = args
        .get(index)
        .ok_or_else(|| HubError::InvalidArgument(format!("missing argument {}", index)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| HubError::InvalidArgument(format!("argument {}: {}", index, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_unary() -> HandlerShape {
        HandlerShape::unary(|_ctx, _args| async { Ok(Value::Null) })
    }

    #[test]
    fn test_resolve_by_name_and_arity() {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", 1, noop_unary());

        assert!(registry.resolve("Echo", 1).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_method() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.resolve("Missing", 0),
            Err(HubError::UnknownMethod(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", 1, noop_unary());

        assert!(matches!(
            registry.resolve("Echo", 3),
            Err(HubError::ArityMismatch { method, argc }) if method == "Echo" && argc == 3
        ));
    }

    #[test]
    fn test_same_name_distinct_arities() {
        let mut registry = HandlerRegistry::new();
        registry.register("Concat", 1, noop_unary());
        registry.register("Concat", 2, noop_unary());

        assert!(registry.resolve("Concat", 1).is_ok());
        assert!(registry.resolve("Concat", 2).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_shape_takes_input_stream() {
        assert!(!noop_unary().takes_input_stream());
        let shape = HandlerShape::client_stream(|_ctx, _input, _args| async { Ok(Value::Null) });
        assert!(shape.takes_input_stream());
    }

    #[test]
    fn test_arg_decoding() {
        let args = vec![json!("hello"), json!(7)];
        let s: String = arg(&args, 0).unwrap();
        let n: i64 = arg(&args, 1).unwrap();
        assert_eq!(s, "hello");
        assert_eq!(n, 7);

        assert!(matches!(
            arg::<String>(&args, 1),
            Err(HubError::InvalidArgument(_))
        ));
        assert!(matches!(
            arg::<String>(&args, 5),
            Err(HubError::InvalidArgument(_))
        ));
    }
}
