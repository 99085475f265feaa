//! Wire contracts for the stagewatch dashboard.
//!
//! Covers the test key shape shared by every notification, the Socket.IO
//! frame codec used by the backend's live channel, notification decoding,
//! and the request/report types of the backend's REST surface.

pub mod error;
pub mod frame;
pub mod notification;
pub mod report;
pub mod rest_types;
pub mod test_key;
pub mod wire_values;

pub use error::{ProtocolError, RequestValidationError};
pub use frame::{decode_frame, Frame, CONNECT_PACKET, PONG_PACKET};
pub use notification::{
    decode_notification, ExecutionDetailPayload, ExecutionResultPayload, ExecutionStartedPayload,
    ExecutionTimings, Notification, ProgressPayload,
};
pub use report::{
    FailureAnalysis, LatencyStats, ReportSummary, ReportTestInfo, TestReport, TimelineEntry,
};
pub use rest_types::{ResultsSnapshot, RunSummary, StartRunRequest, StatusSnapshot, TestMode};
pub use test_key::{TestKey, TestType};
pub use wire_values::{non_blank_text, normalize_success_flag, parse_index, parse_timestamp};
