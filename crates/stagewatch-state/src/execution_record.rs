use chrono::{DateTime, Utc};
use stagewatch_protocol::{ExecutionTimings, TestKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Pending,
    Responding,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Responding => "responding",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Values applied when a record is created on first observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDefaults {
    pub input_text: String,
    pub timestamp: DateTime<Utc>,
}

impl RecordDefaults {
    pub fn new(input_text: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            input_text: input_text.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Everything the dashboard knows about one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub key: TestKey,
    /// Recognized input once available, else the submitted text.
    pub input_text: String,
    /// Display text built from streamed fragments and snapshots.
    pub stream_buffer: String,
    /// Latest cumulative snapshot, kept apart from `stream_buffer`.
    pub final_text: Option<String>,
    /// Finalized text carried by the result notification.
    pub completed_text: Option<String>,
    pub status: ExecutionStatus,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub failure_reason: Option<String>,
    pub timings: ExecutionTimings,
}

impl ExecutionRecord {
    pub fn new(key: TestKey, defaults: RecordDefaults) -> Self {
        Self {
            key,
            input_text: defaults.input_text,
            stream_buffer: String::new(),
            final_text: None,
            completed_text: None,
            status: ExecutionStatus::Pending,
            timestamp: defaults.timestamp,
            error: None,
            failure_reason: None,
            timings: ExecutionTimings::default(),
        }
    }

    /// Prefers recognized speech over the submitted text.
    pub fn adopt_input_text(&mut self, recognized: Option<&str>, submitted: Option<&str>) {
        if let Some(recognized) = recognized.filter(|text| !text.trim().is_empty()) {
            self.input_text = recognized.to_string();
            return;
        }
        if self.input_text.trim().is_empty() {
            if let Some(submitted) = submitted.filter(|text| !text.trim().is_empty()) {
                self.input_text = submitted.to_string();
            }
        }
    }

    /// Moves a live record to `responding`; terminal records keep their outcome.
    pub fn mark_responding(&mut self) -> bool {
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Responding;
            return true;
        }
        false
    }
}
