//! Engine.IO v4 / Socket.IO v5 text frame codec.
//!
//! Only the subset the dashboard needs is understood: the open handshake,
//! heartbeats, namespace connect/disconnect, and event packets. Captured
//! logs may also hold bare `[name, payload]` arrays or
//! `{"event": name, "data": payload}` objects, which decode as events.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// Socket.IO connect request for the default namespace.
pub const CONNECT_PACKET: &str = "40";
/// Engine.IO heartbeat reply.
pub const PONG_PACKET: &str = "3";

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;
const FRAME_PREVIEW_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open {
        sid: String,
        ping_interval_ms: u64,
        ping_timeout_ms: u64,
    },
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    ConnectError {
        message: String,
    },
    Event {
        name: String,
        payload: Value,
    },
    Noop,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenHandshake {
    #[serde(default)]
    sid: String,
    #[serde(default)]
    ping_interval: Option<u64>,
    #[serde(default)]
    ping_timeout: Option<u64>,
}

fn preview(raw: &str) -> String {
    raw.chars().take(FRAME_PREVIEW_CHARS).collect()
}

fn decode_event_array(raw: &str) -> Result<Frame, ProtocolError> {
    let mut items = serde_json::from_str::<Vec<Value>>(raw)?.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        Some(other) => {
            return Err(ProtocolError::InvalidEvent(format!(
                "event name must be a string, got {other}"
            )))
        }
        None => {
            return Err(ProtocolError::InvalidEvent(
                "event packet has no name".to_string(),
            ))
        }
    };
    Ok(Frame::Event {
        name,
        payload: items.next().unwrap_or(Value::Null),
    })
}

fn decode_event_object(raw: &str) -> Result<Frame, ProtocolError> {
    let mut object = serde_json::from_str::<serde_json::Map<String, Value>>(raw)?;
    let name = match object.remove("event") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => {
            return Err(ProtocolError::InvalidEvent(
                "event object requires a string 'event' field".to_string(),
            ))
        }
    };
    Ok(Frame::Event {
        name,
        payload: object.remove("data").unwrap_or(Value::Null),
    })
}

fn decode_socket_packet(body: &str) -> Result<Frame, ProtocolError> {
    let mut chars = body.chars();
    let Some(packet_type) = chars.next() else {
        return Err(ProtocolError::UnsupportedFrame("4".to_string()));
    };
    let rest = chars.as_str();
    match packet_type {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => {
            let mut rest = rest;
            if rest.starts_with('/') {
                let Some(comma) = rest.find(',') else {
                    return Err(ProtocolError::InvalidEvent(format!(
                        "namespace without payload: {}",
                        preview(rest)
                    )));
                };
                rest = &rest[comma + 1..];
            }
            decode_event_array(rest.trim_start_matches(|c: char| c.is_ascii_digit()))
        }
        '3' => Ok(Frame::Noop),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|value| {
                    value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| rest.to_string());
            Ok(Frame::ConnectError { message })
        }
        _ => Err(ProtocolError::UnsupportedFrame(preview(body))),
    }
}

/// Decodes one websocket text frame.
pub fn decode_frame(raw: &str) -> Result<Frame, ProtocolError> {
    let trimmed = raw.trim();
    let Some(first) = trimmed.chars().next() else {
        return Ok(Frame::Noop);
    };
    let body = &trimmed[first.len_utf8()..];
    match first {
        '[' => decode_event_array(trimmed),
        '{' => decode_event_object(trimmed),
        '0' => {
            let handshake = serde_json::from_str::<OpenHandshake>(body)?;
            Ok(Frame::Open {
                sid: handshake.sid,
                ping_interval_ms: handshake
                    .ping_interval
                    .unwrap_or(DEFAULT_PING_INTERVAL_MS),
                ping_timeout_ms: handshake.ping_timeout.unwrap_or(DEFAULT_PING_TIMEOUT_MS),
            })
        }
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_socket_packet(body),
        '5' | '6' => Ok(Frame::Noop),
        _ => Err(ProtocolError::UnsupportedFrame(preview(trimmed))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_frame, Frame};
    use crate::ProtocolError;

    #[test]
    fn unit_decode_frame_reads_open_handshake() {
        let frame = decode_frame(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#,
        )
        .expect("open frame");
        assert_eq!(
            frame,
            Frame::Open {
                sid: "abc".to_string(),
                ping_interval_ms: 25_000,
                ping_timeout_ms: 5_000,
            }
        );
    }

    #[test]
    fn unit_decode_frame_maps_heartbeats_and_namespace_packets() {
        assert_eq!(decode_frame("2").expect("ping"), Frame::Ping);
        assert_eq!(decode_frame("2probe").expect("probe"), Frame::Ping);
        assert_eq!(decode_frame("3").expect("pong"), Frame::Pong);
        assert_eq!(decode_frame("1").expect("close"), Frame::Close);
        assert_eq!(
            decode_frame(r#"40{"sid":"xyz"}"#).expect("connect"),
            Frame::Connected
        );
        assert_eq!(decode_frame("41").expect("disconnect"), Frame::Disconnected);
        assert_eq!(decode_frame("6").expect("noop"), Frame::Noop);
        assert_eq!(decode_frame("   ").expect("blank"), Frame::Noop);
    }

    #[test]
    fn functional_decode_frame_reads_event_packets_with_namespace_and_ack() {
        let plain = decode_frame(r#"42["test_start",{"index":1,"type":"inquiry"}]"#)
            .expect("event frame");
        assert_eq!(
            plain,
            Frame::Event {
                name: "test_start".to_string(),
                payload: json!({"index": 1, "type": "inquiry"}),
            }
        );

        let namespaced =
            decode_frame(r#"42/dash,7["test_completed",{}]"#).expect("namespaced event");
        assert_eq!(
            namespaced,
            Frame::Event {
                name: "test_completed".to_string(),
                payload: json!({}),
            }
        );

        let bare = decode_frame(r#"42["test_started"]"#).expect("payload-less event");
        assert_eq!(
            bare,
            Frame::Event {
                name: "test_started".to_string(),
                payload: json!(null),
            }
        );
    }

    #[test]
    fn functional_decode_frame_accepts_captured_log_shapes() {
        let array = decode_frame(r#"["status_update", {"message": "hi"}]"#).expect("array");
        let object =
            decode_frame(r#"{"event": "status_update", "data": {"message": "hi"}}"#).expect("obj");
        assert_eq!(array, object);
    }

    #[test]
    fn functional_decode_frame_surfaces_connect_error_message() {
        let frame = decode_frame(r#"44{"message":"not authorized"}"#).expect("connect error");
        assert_eq!(
            frame,
            Frame::ConnectError {
                message: "not authorized".to_string()
            }
        );
    }

    #[test]
    fn regression_decode_frame_rejects_malformed_packets() {
        assert!(matches!(
            decode_frame("42not-json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_frame("42[17, {}]"),
            Err(ProtocolError::InvalidEvent(_))
        ));
        assert!(matches!(
            decode_frame("42[]"),
            Err(ProtocolError::InvalidEvent(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"data": {}}"#),
            Err(ProtocolError::InvalidEvent(_))
        ));
        assert!(matches!(
            decode_frame("45-binary"),
            Err(ProtocolError::UnsupportedFrame(_))
        ));
        assert!(matches!(
            decode_frame("hello"),
            Err(ProtocolError::UnsupportedFrame(_))
        ));
    }
}
