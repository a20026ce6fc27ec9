//! Streaming bridge.
//!
//! Adapts a handler's channel-based production to the emitter's uniform
//! outcome contract: every item becomes one stream-item message and the
//! terminal signal becomes exactly one stream-end message, in strict FIFO
//! order. Items enqueued before a fault are flushed before the fault
//! surfaces.
//!
//! Also hosts the generalized cyclic-modifier fold and scale that all
//! fixed-arity client-stream and bidirectional variants delegate to, instead
//! of duplicating the loop per arity.

use tokio_util::sync::CancellationToken;

use crate::channel::{stream_channel, StreamError, StreamEvent, StreamReceiver};
use crate::emit::{EmitterHandle, Outcome};
use crate::error::{HubError, Result};
use crate::handler::HandlerContext;
use crate::invocation::{InvocationId, Value};

/// Drain a handler's output channel into the emitter.
///
/// Runs until the terminal signal has been forwarded, the emitter refuses
/// further messages (transport failure cancelled the invocation), or the
/// connection is aborted. After an abort nothing further is emitted, not
/// even a stream-end.
pub async fn pump_stream(
    id: InvocationId,
    mut rx: StreamReceiver<Value>,
    emitter: EmitterHandle,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = rx.recv() => event,
        };
        match event {
            StreamEvent::Item(item) => {
                if emitter.emit(&id, Outcome::StreamItem(item)).await.is_err() {
                    // Invocation cancelled or connection gone: stop draining.
                    return;
                }
            }
            StreamEvent::End(error) => {
                if let Some(ref e) = error {
                    tracing::debug!("stream {} ended with fault: {}", id, e);
                }
                let _ = emitter.emit(&id, Outcome::StreamEnd(error)).await;
                return;
            }
        }
    }
}

/// Decode a fixed argument list into integer modifiers.
pub fn modifiers_from_args(args: &[Value]) -> Result<Vec<i64>> {
    args.iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value(v.clone())
                .map_err(|e| HubError::InvalidArgument(format!("modifier {}: {}", i, e)))
        })
        .collect()
}

/// Fold a caller-supplied input stream with cyclically applied modifiers.
///
/// The item at position `i` is combined with `modifiers[i % modifiers.len()]`
/// and summed: modifiers `[m0, m1]` over input `[v0, v1, v2]` yield
/// `v0*m0 + v1*m1 + v2*m0`. An empty modifier list fails with
/// [`HubError::InvalidArgument`] before any input is consumed, and so does
/// arithmetic that would overflow `i64`.
pub async fn fold_with_modifiers(
    mut input: StreamReceiver<Value>,
    modifiers: &[i64],
) -> Result<i64> {
    if modifiers.is_empty() {
        return Err(HubError::InvalidArgument("empty modifier list".into()));
    }
    let mut sum = 0i64;
    let mut idx = 0;
    loop {
        match input.recv().await {
            StreamEvent::Item(value) => {
                let n: i64 = serde_json::from_value(value)
                    .map_err(|e| HubError::InvalidArgument(format!("stream item: {}", e)))?;
                sum = n
                    .checked_mul(modifiers[idx])
                    .and_then(|scaled| sum.checked_add(scaled))
                    .ok_or_else(|| {
                        HubError::InvalidArgument("modifier arithmetic overflowed".into())
                    })?;
                idx = (idx + 1) % modifiers.len();
            }
            StreamEvent::End(None) => return Ok(sum),
            StreamEvent::End(Some(error)) => {
                return Err(HubError::StreamFaulted(error.message().to_string()))
            }
        }
    }
}

/// Scale a caller-supplied input stream with cyclically applied modifiers,
/// producing one output item per input item.
///
/// The producer task is registered against the invocation's connection via
/// [`HandlerContext::spawn`]; aborting the connection stops it. An input
/// fault is forwarded as the output channel's terminal error, after any
/// items already produced; arithmetic overflow faults the output the same
/// way.
pub fn scale_with_modifiers(
    ctx: &HandlerContext,
    mut input: StreamReceiver<Value>,
    modifiers: Vec<i64>,
) -> Result<StreamReceiver<Value>> {
    if modifiers.is_empty() {
        return Err(HubError::InvalidArgument("empty modifier list".into()));
    }
    let (tx, rx) = stream_channel();
    ctx.spawn(async move {
        let mut idx = 0;
        loop {
            match input.recv().await {
                StreamEvent::Item(value) => {
                    let n: i64 = match serde_json::from_value(value) {
                        Ok(n) => n,
                        Err(e) => {
                            tx.fault(StreamError::Faulted(format!("stream item: {}", e)));
                            return;
                        }
                    };
                    let Some(scaled) = n.checked_mul(modifiers[idx]) else {
                        tx.fault(StreamError::Faulted(
                            "modifier arithmetic overflowed".into(),
                        ));
                        return;
                    };
                    if tx.send(Value::from(scaled)).is_err() {
                        return;
                    }
                    idx = (idx + 1) % modifiers.len();
                }
                StreamEvent::End(None) => {
                    tx.complete();
                    return;
                }
                StreamEvent::End(Some(error)) => {
                    tx.fault(error);
                    return;
                }
            }
        }
    });
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Clients;
    use crate::codec::MsgPackCodec;
    use crate::emit::{spawn_emitter_task, EmitterConfig, OutboundMessage};
    use crate::transport::{MemTransport, Transport};
    use serde_json::json;
    use std::sync::Arc;

    fn test_emitter() -> (EmitterHandle, Arc<MemTransport>) {
        let transport = Arc::new(MemTransport::new());
        transport.start("mem://test", "").unwrap();
        let (emitter, _task) = spawn_emitter_task(
            transport.clone(),
            EmitterConfig::default(),
            CancellationToken::new(),
        );
        (emitter, transport)
    }

    fn test_context() -> HandlerContext {
        HandlerContext::new(
            "conn-1".into(),
            "inv-1".into(),
            Clients::new(),
            CancellationToken::new(),
        )
    }

    async fn feed(items: Vec<Value>, error: Option<StreamError>) -> StreamReceiver<Value> {
        let (tx, rx) = stream_channel();
        for item in items {
            tx.send(item).unwrap();
        }
        match error {
            Some(e) => tx.fault(e),
            None => tx.complete(),
        };
        rx
    }

    #[tokio::test]
    async fn test_pump_preserves_order() {
        let (emitter, transport) = test_emitter();
        let mut sent = transport.take_sent().unwrap();
        let rx = feed((0..5).map(Value::from).collect(), None).await;

        pump_stream("inv-1".into(), rx, emitter, CancellationToken::new()).await;

        for i in 0..5 {
            let message: OutboundMessage =
                MsgPackCodec::decode(&sent.recv().await.unwrap()).unwrap();
            assert_eq!(
                message,
                OutboundMessage::StreamItem {
                    invocation_id: "inv-1".into(),
                    item: json!(i),
                }
            );
        }
        let message: OutboundMessage = MsgPackCodec::decode(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(
            message,
            OutboundMessage::StreamEnd {
                invocation_id: "inv-1".into(),
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_pump_flushes_items_before_fault() {
        let (emitter, transport) = test_emitter();
        let mut sent = transport.take_sent().unwrap();
        let rx = feed(
            vec![json!("abc"), Value::Null],
            Some(StreamError::Faulted("stream error".into())),
        )
        .await;

        pump_stream("inv-1".into(), rx, emitter, CancellationToken::new()).await;

        let first: OutboundMessage = MsgPackCodec::decode(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(
            first,
            OutboundMessage::StreamItem {
                invocation_id: "inv-1".into(),
                item: json!("abc"),
            }
        );
        let second: OutboundMessage = MsgPackCodec::decode(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(
            second,
            OutboundMessage::StreamItem {
                invocation_id: "inv-1".into(),
                item: Value::Null,
            }
        );
        let last: OutboundMessage = MsgPackCodec::decode(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(
            last,
            OutboundMessage::StreamEnd {
                invocation_id: "inv-1".into(),
                error: Some("stream error".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let (emitter, transport) = test_emitter();
        let mut sent = transport.take_sent().unwrap();
        let (tx, rx) = stream_channel();
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(pump_stream("inv-1".into(), rx, emitter, cancel.clone()));

        cancel.cancel();
        pump.await.unwrap();

        // Late writes must not surface.
        let _ = tx.send(json!(1));
        tx.complete();
        assert!(sent.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fold_cyclic_modifiers() {
        let rx = feed(vec![json!(1), json!(2), json!(3)], None).await;
        // 1*10 + 2*20 + 3*10
        assert_eq!(fold_with_modifiers(rx, &[10, 20]).await.unwrap(), 80);
    }

    #[tokio::test]
    async fn test_fold_empty_input() {
        let rx = feed(vec![], None).await;
        assert_eq!(fold_with_modifiers(rx, &[5]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fold_empty_modifiers_rejected() {
        let rx = feed(vec![json!(1)], None).await;
        assert!(matches!(
            fold_with_modifiers(rx, &[]).await,
            Err(HubError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_fold_overflow_rejected() {
        let rx = feed(vec![json!(1), json!(i64::MAX)], None).await;
        assert!(matches!(
            fold_with_modifiers(rx, &[2]).await,
            Err(HubError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_fold_input_fault_propagates() {
        let rx = feed(
            vec![json!(1)],
            Some(StreamError::Faulted("broken".into())),
        )
        .await;
        assert!(matches!(
            fold_with_modifiers(rx, &[1]).await,
            Err(HubError::StreamFaulted(msg)) if msg == "broken"
        ));
    }

    #[tokio::test]
    async fn test_scale_cyclic_modifiers() {
        let ctx = test_context();
        let input = feed(vec![json!(1), json!(2), json!(3)], None).await;
        let rx = scale_with_modifiers(&ctx, input, vec![2, 3]).unwrap();

        let (items, error) = rx.collect().await;
        assert_eq!(items, vec![json!(2), json!(6), json!(6)]);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_scale_overflow_faults_stream() {
        let ctx = test_context();
        let input = feed(vec![json!(1), json!(i64::MAX)], None).await;
        let rx = scale_with_modifiers(&ctx, input, vec![2]).unwrap();

        let (items, error) = rx.collect().await;
        assert_eq!(items, vec![json!(2)]);
        assert!(matches!(error, Some(StreamError::Faulted(_))));
    }

    #[tokio::test]
    async fn test_scale_forwards_input_fault() {
        let ctx = test_context();
        let input = feed(vec![json!(4)], Some(StreamError::Faulted("oops".into()))).await;
        let rx = scale_with_modifiers(&ctx, input, vec![10]).unwrap();

        let (items, error) = rx.collect().await;
        assert_eq!(items, vec![json!(40)]);
        assert_eq!(error, Some(StreamError::Faulted("oops".into())));
    }

    #[tokio::test]
    async fn test_modifiers_from_args() {
        assert_eq!(
            modifiers_from_args(&[json!(1), json!(-2)]).unwrap(),
            vec![1, -2]
        );
        assert!(matches!(
            modifiers_from_args(&[json!("nope")]),
            Err(HubError::InvalidArgument(_))
        ));
    }
}
