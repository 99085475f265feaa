use thiserror::Error;

/// Failures raised while decoding frames from the live channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
    #[error("invalid event packet: {0}")]
    InvalidEvent(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a run-start request is rejected before it reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("at least one device SN is required")]
    MissingDeviceSns,
    #[error("concurrency must be in range 1..=100 (got {0})")]
    ConcurrencyOutOfRange(u32),
    #[error("device SN count ({devices}) cannot exceed concurrency ({concurrency})")]
    TooManyDevices { devices: usize, concurrency: u32 },
    #[error("websocket url must start with ws:// or wss:// (got '{0}')")]
    InvalidWsUrl(String),
    #[error("test_count must be >= 1")]
    InvalidTestCount,
}
