use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestValidationError;

pub const MAX_CONCURRENCY: u32 = 100;

/// Aggregate pass/fail counters pushed with progress and completion events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub success_rate: f64,
}

/// Body of `GET /api/status` and of the `status_update` pushed on connect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub progress: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub summary: RunSummary,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Body of `GET /api/results`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    #[default]
    Normal,
    Fast,
}

impl TestMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }
}

/// Body of `POST /api/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub concurrency: u32,
    pub device_sns: Vec<String>,
    #[serde(default)]
    pub test_mode: TestMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub test_count: Option<u32>,
}

impl StartRunRequest {
    /// Applies the same checks the backend performs before accepting a run.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        let devices = self
            .device_sns
            .iter()
            .filter(|sn| !sn.trim().is_empty())
            .count();
        if devices == 0 {
            return Err(RequestValidationError::MissingDeviceSns);
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(RequestValidationError::ConcurrencyOutOfRange(
                self.concurrency,
            ));
        }
        if devices > self.concurrency as usize {
            return Err(RequestValidationError::TooManyDevices {
                devices,
                concurrency: self.concurrency,
            });
        }
        if let Some(url) = self.ws_url.as_deref().map(str::trim) {
            if !url.is_empty() && !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(RequestValidationError::InvalidWsUrl(url.to_string()));
            }
        }
        if self.test_count == Some(0) {
            return Err(RequestValidationError::InvalidTestCount);
        }
        Ok(())
    }

    /// Trims device SNs, drops blanks, and turns a blank websocket url into "backend default".
    pub fn normalized(mut self) -> Self {
        self.device_sns = self
            .device_sns
            .into_iter()
            .map(|sn| sn.trim().to_string())
            .filter(|sn| !sn.is_empty())
            .collect();
        self.ws_url = self
            .ws_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        self
    }
}
