//! Typed notifications decoded from the backend's live event channel.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::rest_types::{RunSummary, StatusSnapshot};
use crate::test_key::{TestKey, TestType};
use crate::wire_values::{non_blank_text, normalize_success_flag, parse_index, parse_timestamp};

pub const EVENT_RUN_STARTED: &str = "test_started";
pub const EVENT_EXECUTION_STARTED: &str = "test_start";
pub const EVENT_EXECUTION_RESULT: &str = "test_result";
pub const EVENT_EXECUTION_DETAIL: &str = "test_detail_update";
pub const EVENT_PROGRESS: &str = "progress_update";
pub const EVENT_RUN_COMPLETED: &str = "test_completed";
pub const EVENT_RUN_ERROR: &str = "test_error";
pub const EVENT_STATUS: &str = "status_update";
pub const EVENT_CONNECTED: &str = "connected";

const UNKNOWN_RUN_ERROR: &str = "unknown error";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStartedPayload {
    pub key: TestKey,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Optional per-stage latencies reported with a result, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionTimings {
    pub stt_ms: Option<f64>,
    pub llm_ms: Option<f64>,
    pub tts_start_ms: Option<f64>,
    pub tts_duration_ms: Option<f64>,
    pub total_response_ms: Option<f64>,
}

impl ExecutionTimings {
    fn from_result(result: &Value) -> Self {
        let read = |field: &str| result.get(field).and_then(Value::as_f64);
        Self {
            stt_ms: read("stt_time"),
            llm_ms: read("llm_time"),
            tts_start_ms: read("tts_start_time"),
            tts_duration_ms: read("tts_duration"),
            total_response_ms: read("total_response_time"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResultPayload {
    pub key: TestKey,
    pub success: bool,
    pub text: Option<String>,
    pub stt_text: Option<String>,
    pub llm_text: Option<String>,
    pub error: Option<String>,
    pub failure_reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub timings: ExecutionTimings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDetailPayload {
    pub key: TestKey,
    pub text: Option<String>,
    pub stt_text: Option<String>,
    /// Cumulative response text so far.
    pub llm_text: Option<String>,
    /// The sentence completed since the previous detail notification.
    pub llm_sentence: Option<String>,
}

impl ExecutionDetailPayload {
    /// True when the notification carries any generated response text.
    pub fn carries_response_text(&self) -> bool {
        self.llm_sentence.is_some() || self.llm_text.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressPayload {
    pub progress: u64,
    pub total: u64,
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RunStarted,
    ExecutionStarted(ExecutionStartedPayload),
    ExecutionResult(ExecutionResultPayload),
    ExecutionDetail(ExecutionDetailPayload),
    ProgressUpdate(ProgressPayload),
    RunCompleted { summary: Option<RunSummary> },
    RunError { error: String },
    StatusMessage { message: String },
    StatusSnapshot(StatusSnapshot),
    Connected { message: Option<String> },
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RunStarted => EVENT_RUN_STARTED,
            Self::ExecutionStarted(_) => EVENT_EXECUTION_STARTED,
            Self::ExecutionResult(_) => EVENT_EXECUTION_RESULT,
            Self::ExecutionDetail(_) => EVENT_EXECUTION_DETAIL,
            Self::ProgressUpdate(_) => EVENT_PROGRESS,
            Self::RunCompleted { .. } => EVENT_RUN_COMPLETED,
            Self::RunError { .. } => EVENT_RUN_ERROR,
            Self::StatusMessage { .. } | Self::StatusSnapshot(_) => EVENT_STATUS,
            Self::Connected { .. } => EVENT_CONNECTED,
        }
    }

    pub fn key(&self) -> Option<TestKey> {
        match self {
            Self::ExecutionStarted(payload) => Some(payload.key),
            Self::ExecutionResult(payload) => Some(payload.key),
            Self::ExecutionDetail(payload) => Some(payload.key),
            _ => None,
        }
    }
}

fn decode_key(object: &Value) -> Option<TestKey> {
    let index = parse_index(object.get("index")?)?;
    let raw_type = object.get("type")?.as_str()?;
    if raw_type.trim().is_empty() {
        return None;
    }
    Some(TestKey::new(index, TestType::from_wire(raw_type)))
}

fn decode_summary(value: Option<&Value>) -> Option<RunSummary> {
    value
        .filter(|value| value.is_object())
        .and_then(|value| serde_json::from_value::<RunSummary>(value.clone()).ok())
}

fn read_counter(value: Option<&Value>) -> u64 {
    value.and_then(parse_index).unwrap_or(0)
}

/// Maps one named event to a notification.
///
/// Returns `None` for unknown events and for known events whose payload lacks
/// the fields needed to act on it; those are dropped rather than guessed at.
pub fn decode_notification(name: &str, payload: &Value) -> Option<Notification> {
    match name {
        EVENT_RUN_STARTED => Some(Notification::RunStarted),
        EVENT_EXECUTION_STARTED => {
            let key = decode_key(payload)?;
            Some(Notification::ExecutionStarted(ExecutionStartedPayload {
                key,
                text: payload
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                timestamp: parse_timestamp(payload.get("timestamp")),
            }))
        }
        EVENT_EXECUTION_RESULT => {
            let result = payload.get("result").filter(|value| value.is_object())?;
            let key = decode_key(result)?;
            Some(Notification::ExecutionResult(ExecutionResultPayload {
                key,
                success: result
                    .get("success")
                    .is_some_and(normalize_success_flag),
                text: non_blank_text(result.get("text")),
                stt_text: non_blank_text(result.get("stt_text")),
                llm_text: non_blank_text(result.get("llm_text")),
                error: non_blank_text(result.get("error")),
                failure_reason: non_blank_text(result.get("failure_reason")),
                timestamp: parse_timestamp(result.get("timestamp")),
                timings: ExecutionTimings::from_result(result),
            }))
        }
        EVENT_EXECUTION_DETAIL => {
            let key = decode_key(payload)?;
            Some(Notification::ExecutionDetail(ExecutionDetailPayload {
                key,
                text: non_blank_text(payload.get("text")),
                stt_text: non_blank_text(payload.get("stt_text")),
                llm_text: non_blank_text(payload.get("llm_text")),
                llm_sentence: non_blank_text(payload.get("llm_sentence")),
            }))
        }
        EVENT_PROGRESS => Some(Notification::ProgressUpdate(ProgressPayload {
            progress: read_counter(payload.get("progress")),
            total: read_counter(payload.get("total")),
            summary: decode_summary(payload.get("summary")),
        })),
        EVENT_RUN_COMPLETED => Some(Notification::RunCompleted {
            summary: decode_summary(payload.get("summary")),
        }),
        EVENT_RUN_ERROR => Some(Notification::RunError {
            error: non_blank_text(payload.get("error"))
                .unwrap_or_else(|| UNKNOWN_RUN_ERROR.to_string()),
        }),
        EVENT_STATUS => {
            if let Some(message) = payload.get("message").and_then(Value::as_str) {
                return Some(Notification::StatusMessage {
                    message: message.to_string(),
                });
            }
            if !payload.is_object() {
                return None;
            }
            serde_json::from_value::<StatusSnapshot>(payload.clone())
                .ok()
                .map(Notification::StatusSnapshot)
        }
        EVENT_CONNECTED => Some(Notification::Connected {
            message: non_blank_text(payload.get("message")),
        }),
        _ => None,
    }
}
