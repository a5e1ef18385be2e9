//! Socket Mode frame decoding and acknowledgment.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use formrelay::slack::socket::{ack_frame, handle_frame, parse_frame, FrameOutcome, SocketFrame};
use formrelay::slack::IncomingEvent;
use futures_util::Sink;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMsg};

/// Sink that keeps every frame written to it.
#[derive(Default)]
struct RecordingSink {
    sent: Vec<WsMsg>,
}

impl RecordingSink {
    fn texts(&self) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|msg| match msg {
                WsMsg::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }
}

impl Sink<WsMsg> for RecordingSink {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMsg) -> Result<(), WsError> {
        self.get_mut().sent.push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }
}

fn envelope(id: &str, kind: &str, event: Value) -> String {
    json!({
        "envelope_id": id,
        "type": kind,
        "accepts_response_payload": false,
        "payload": { "event": event }
    })
    .to_string()
}

fn message(extra: Value) -> Value {
    let mut event = json!({ "type": "message", "channel": "C01IDEA", "ts": "1.000" });
    if let (Some(target), Value::Object(extra)) = (event.as_object_mut(), extra) {
        target.extend(extra);
    }
    event
}

fn ack(id: &str) -> Vec<String> {
    vec![ack_frame(id)]
}

#[test]
fn decodes_hello_and_disconnect() {
    assert!(matches!(
        parse_frame(r#"{"type":"hello","num_connections":1}"#),
        Ok(SocketFrame::Hello)
    ));

    match parse_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#) {
        Ok(SocketFrame::Disconnect { reason }) => assert_eq!(reason, "refresh_requested"),
        other => panic!("expected disconnect, got {other:?}"),
    }
}

#[test]
fn decodes_events_envelope() {
    let frame = r#"{
        "envelope_id": "env-1",
        "type": "events_api",
        "accepts_response_payload": false,
        "payload": { "event": { "type": "message", "channel": "C1", "ts": "1.0" } }
    }"#;

    match parse_frame(frame) {
        Ok(SocketFrame::Envelope(envelope)) => {
            assert_eq!(envelope.envelope_id, "env-1");
            assert_eq!(envelope.kind, "events_api");
            assert_eq!(envelope.payload["event"]["channel"], "C1");
        }
        other => panic!("expected envelope, got {other:?}"),
    }
}

#[test]
fn envelope_without_id_is_rejected() {
    assert!(parse_frame(r#"{"type":"events_api","payload":{}}"#).is_err());
    assert!(parse_frame("not json").is_err());
}

#[test]
fn ack_echoes_envelope_id_only() {
    let ack: serde_json::Value =
        serde_json::from_str(&ack_frame("env-1")).expect("ack should be JSON");
    assert_eq!(ack, serde_json::json!({ "envelope_id": "env-1" }));
}

#[tokio::test]
async fn non_message_event_is_acked_and_not_forwarded() {
    let mut sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::channel(4);
    let frame = envelope(
        "env-reaction",
        "events_api",
        json!({ "type": "reaction_added", "reaction": "eyes" }),
    );

    let outcome = handle_frame(&frame, &mut sink, &tx).await;

    assert!(matches!(outcome, Ok(FrameOutcome::Continue)));
    assert_eq!(sink.texts(), ack("env-reaction"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unsupported_subtype_is_acked_and_not_forwarded() {
    let mut sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::channel(4);
    let frame = envelope(
        "env-edit",
        "events_api",
        message(json!({ "subtype": "message_changed" })),
    );

    let outcome = handle_frame(&frame, &mut sink, &tx).await;

    assert!(matches!(outcome, Ok(FrameOutcome::Continue)));
    assert_eq!(sink.texts(), ack("env-edit"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn message_without_blocks_is_acked_then_forwarded() {
    let mut sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::channel(4);
    let frame = envelope(
        "env-broken",
        "events_api",
        message(json!({ "bot_id": "BFORMS", "subtype": "bot_message", "blocks": [] })),
    );

    let outcome = handle_frame(&frame, &mut sink, &tx).await;

    assert!(matches!(outcome, Ok(FrameOutcome::Continue)));
    assert_eq!(sink.texts(), ack("env-broken"));
    let forwarded: IncomingEvent = match rx.try_recv() {
        Ok(event) => event,
        Err(e) => panic!("message should be forwarded: {e}"),
    };
    assert_eq!(forwarded.channel_id, "C01IDEA");
    assert_eq!(forwarded.payload["event"]["blocks"], json!([]));
}

#[tokio::test]
async fn other_envelope_types_are_acked() {
    let mut sink = RecordingSink::default();
    let (tx, mut rx) = mpsc::channel(4);
    let frame = envelope("env-slash", "slash_commands", json!({}));

    let outcome = handle_frame(&frame, &mut sink, &tx).await;

    assert!(matches!(outcome, Ok(FrameOutcome::Continue)));
    assert_eq!(sink.texts(), ack("env-slash"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn closed_receiver_still_gets_ack() {
    let mut sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel(4);
    drop(rx);
    let frame = envelope("env-late", "events_api", message(json!({ "user": "U1" })));

    let outcome = handle_frame(&frame, &mut sink, &tx).await;

    assert!(matches!(outcome, Ok(FrameOutcome::ReceiverClosed)));
    assert_eq!(sink.texts(), ack("env-late"));
}

#[tokio::test(start_paused = true)]
async fn full_receiver_does_not_delay_ack() {
    let mut sink = RecordingSink::default();
    let (tx, _rx) = mpsc::channel(1);
    let queued = IncomingEvent::from_events_api(json!({ "event": message(json!({})) }));
    match queued {
        Some(event) => tx.try_send(event).expect("first slot should be free"),
        None => panic!("fixture should be a message event"),
    }
    let frame = envelope("env-busy", "events_api", message(json!({ "user": "U1" })));

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        handle_frame(&frame, &mut sink, &tx),
    )
    .await;

    assert!(result.is_err(), "forwarding should wait for queue space");
    assert_eq!(sink.texts(), ack("env-busy"));
}

#[tokio::test]
async fn control_frames_are_not_acked() {
    let mut sink = RecordingSink::default();
    let (tx, _rx) = mpsc::channel(4);

    let hello = handle_frame(r#"{"type":"hello"}"#, &mut sink, &tx).await;
    let garbage = handle_frame("not json", &mut sink, &tx).await;
    let disconnect = handle_frame(
        r#"{"type":"disconnect","reason":"refresh_requested"}"#,
        &mut sink,
        &tx,
    )
    .await;

    assert!(matches!(hello, Ok(FrameOutcome::Continue)));
    assert!(matches!(garbage, Ok(FrameOutcome::Continue)));
    assert!(matches!(disconnect, Ok(FrameOutcome::Reconnect)));
    assert!(sink.sent.is_empty());
}
