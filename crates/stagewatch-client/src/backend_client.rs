//! REST client for the test backend's run-control and reporting endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use stagewatch_protocol::{
    RequestValidationError, ResultsSnapshot, StartRunRequest, StatusSnapshot, TestReport,
};
use thiserror::Error;
use tracing::debug;

const ERROR_BODY_PREVIEW_CHARS: usize = 240;
const CLIENT_USER_AGENT: &str = concat!("stagewatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid run request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Acknowledgement returned by the run-start and run-stop endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAck {
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait RunBackend: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusSnapshot, BackendError>;

    async fn fetch_results(&self) -> Result<ResultsSnapshot, BackendError>;

    async fn start_run(&self, request: &StartRunRequest) -> Result<RunAck, BackendError>;

    async fn stop_run(&self) -> Result<RunAck, BackendError>;

    /// The report document exactly as the backend produced it.
    async fn fetch_report_json(&self) -> Result<Value, BackendError>;

    async fn fetch_report(&self) -> Result<TestReport, BackendError> {
        let raw = self.fetch_report_json().await?;
        Ok(serde_json::from_value(raw)?)
    }
}

#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: BackendClientConfig) -> Result<Self, BackendError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::InvalidResponse(
                "backend base url cannot be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        decode_response(path, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        decode_response(path, response).await
    }
}

#[async_trait]
impl RunBackend for BackendClient {
    async fn fetch_status(&self) -> Result<StatusSnapshot, BackendError> {
        self.get_json("/api/status").await
    }

    async fn fetch_results(&self) -> Result<ResultsSnapshot, BackendError> {
        self.get_json("/api/results").await
    }

    async fn start_run(&self, request: &StartRunRequest) -> Result<RunAck, BackendError> {
        let request = request.clone().normalized();
        request.validate()?;
        self.post_json("/api/start", &request).await
    }

    async fn stop_run(&self) -> Result<RunAck, BackendError> {
        self.post_json("/api/stop", &serde_json::json!({})).await
    }

    async fn fetch_report_json(&self) -> Result<Value, BackendError> {
        self.get_json("/api/report").await
    }
}

async fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let raw = response.text().await?;
    debug!(path, status = status.as_u16(), bytes = raw.len(), "backend response");
    if !status.is_success() {
        return Err(BackendError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&raw),
        });
    }
    if raw.trim().is_empty() {
        return Err(BackendError::InvalidResponse(format!(
            "empty response body from {path}"
        )));
    }
    Ok(serde_json::from_str(&raw)?)
}

/// Prefers the backend's `error` field, falling back to a preview of the body.
pub(crate) fn rejection_message(raw: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(raw) {
        if let Some(Value::String(message)) = object.get("error") {
            if !message.trim().is_empty() {
                return message.trim().to_string();
            }
        }
    }
    let trimmed = raw.trim();
    if trimmed.chars().count() <= ERROR_BODY_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let preview = trimmed
        .chars()
        .take(ERROR_BODY_PREVIEW_CHARS)
        .collect::<String>();
    format!("{preview}...")
}
