//! Invocation model.
//!
//! An [`Invocation`] is one decoded remote method call: method name, ordered
//! argument list, a unique id, and (for client-stream shapes) the caller's
//! input stream. Decoding raw bytes into an invocation happens outside the
//! core; the dispatcher owns the invocation from hand-off until its terminal
//! message has been emitted.

use serde::{Deserialize, Serialize};

use crate::channel::StreamReceiver;

/// Opaque dynamic value used for arguments, results, and stream items.
pub type Value = serde_json::Value;

/// Unique token identifying one in-flight call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(pub String);

impl InvocationId {
    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InvocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InvocationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one connected caller, used for push addressing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Borrow the raw identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded remote method call.
#[derive(Debug)]
pub struct Invocation {
    /// Unique per in-flight call.
    pub id: InvocationId,
    /// Target method name; resolved together with `arguments.len()`.
    pub method: String,
    /// Ordered positional arguments.
    pub arguments: Vec<Value>,
    /// Caller-supplied input stream for client-stream and bidirectional
    /// shapes. Lazily produced, finite, consumed exactly once.
    pub input: Option<StreamReceiver<Value>>,
}

impl Invocation {
    /// Create an invocation without an input stream.
    pub fn new(id: impl Into<InvocationId>, method: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            arguments,
            input: None,
        }
    }

    /// Attach a caller-supplied input stream.
    pub fn with_input(mut self, input: StreamReceiver<Value>) -> Self {
        self.input = Some(input);
        self
    }
}

/// Wire form of an invocation, as decoded from a transport payload.
///
/// Input streams attach above the wire layer, so a decoded frame always
/// starts without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationFrame {
    pub invocation_id: String,
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl From<InvocationFrame> for Invocation {
    fn from(frame: InvocationFrame) -> Self {
        Invocation::new(frame.invocation_id, frame.target, frame.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::stream_channel;
    use serde_json::json;

    #[test]
    fn test_invocation_creation() {
        let inv = Invocation::new("inv-1", "Echo", vec![json!("hello")]);
        assert_eq!(inv.id.as_str(), "inv-1");
        assert_eq!(inv.method, "Echo");
        assert_eq!(inv.arguments.len(), 1);
        assert!(inv.input.is_none());
    }

    #[test]
    fn test_with_input() {
        let (_tx, rx) = stream_channel();
        let inv = Invocation::new("inv-2", "Sum", vec![]).with_input(rx);
        assert!(inv.input.is_some());
    }

    #[test]
    fn test_frame_decodes_into_invocation() {
        let bytes = crate::codec::MsgPackCodec::encode(&InvocationFrame {
            invocation_id: "inv-3".into(),
            target: "Echo".into(),
            arguments: vec![json!("hi")],
        })
        .unwrap();

        let frame: InvocationFrame = crate::codec::MsgPackCodec::decode(&bytes).unwrap();
        let inv = Invocation::from(frame);
        assert_eq!(inv.id.as_str(), "inv-3");
        assert_eq!(inv.method, "Echo");
        assert_eq!(inv.arguments, vec![json!("hi")]);
        assert!(inv.input.is_none());
    }
}
