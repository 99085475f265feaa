//! Run settings loaded from a TOML file and merged with command-line flags.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use stagewatch_protocol::{StartRunRequest, TestMode};

use crate::cli_args::StartArgs;

pub const DEFAULT_CONCURRENCY: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettingsFile {
    #[serde(default)]
    pub concurrency: Option<u32>,
    #[serde(default)]
    pub device_sns: Vec<String>,
    #[serde(default)]
    pub test_mode: Option<TestMode>,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub test_count: Option<u32>,
}

impl RunSettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run settings {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse run settings {}", path.display()))
    }
}

/// Flags win over file values; device SNs from flags replace the file's list.
pub fn build_start_request(args: &StartArgs) -> Result<StartRunRequest> {
    let file = match args.settings.as_deref() {
        Some(path) => RunSettingsFile::load(path)?,
        None => RunSettingsFile::default(),
    };
    let device_sns = if args.device_sns.is_empty() {
        file.device_sns
    } else {
        args.device_sns.clone()
    };
    let request = StartRunRequest {
        concurrency: args
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY),
        device_sns,
        test_mode: args
            .test_mode
            .map(TestMode::from)
            .or(file.test_mode)
            .unwrap_or_default(),
        ws_url: args.ws_url.clone().or(file.ws_url),
        test_count: args.test_count.or(file.test_count),
    }
    .normalized();
    request.validate()?;
    Ok(request)
}
