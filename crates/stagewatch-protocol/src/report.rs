//! Shape of the structured run report served by `GET /api/report`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rest_types::TestMode;
use crate::test_key::TestType;
use crate::wire_values::normalize_success_flag;

fn deserialize_success_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(normalize_success_flag(&raw))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTestInfo {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub concurrency: u32,
    #[serde(default)]
    pub device_count: u32,
    #[serde(default)]
    pub test_mode: TestMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(default)]
    pub total_tests: u64,
    #[serde(default)]
    pub successful_tests: u64,
    #[serde(default)]
    pub failed_tests: u64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub qps: f64,
    #[serde(default)]
    pub inquiry_total: u64,
    #[serde(default)]
    pub inquiry_success: u64,
    #[serde(default)]
    pub inquiry_success_rate: f64,
    #[serde(default)]
    pub compare_total: u64,
    #[serde(default)]
    pub compare_success: u64,
    #[serde(default)]
    pub compare_success_rate: f64,
    #[serde(default)]
    pub order_total: u64,
    #[serde(default)]
    pub order_success: u64,
    #[serde(default)]
    pub order_success_rate: f64,
}

/// Latency distribution of one named metric, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(default)]
    pub avg: f64,
    #[serde(default)]
    pub median: f64,
    #[serde(default)]
    pub p95: Option<f64>,
    #[serde(default)]
    pub p99: Option<f64>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    #[serde(default)]
    pub failure_reasons: BTreeMap<String, u64>,
    #[serde(default)]
    pub failure_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default = "unknown_test_type")]
    pub test_type: TestType,
    #[serde(default, deserialize_with = "deserialize_success_flag")]
    pub success: bool,
    #[serde(default)]
    pub total_response_time: Option<f64>,
}

fn unknown_test_type() -> TestType {
    TestType::Unknown
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub test_info: ReportTestInfo,
    #[serde(default)]
    pub summary: ReportSummary,
    /// Metric name to distribution; `None` when the metric had no samples.
    #[serde(default)]
    pub performance_metrics: BTreeMap<String, Option<LatencyStats>>,
    #[serde(default)]
    pub failure_analysis: FailureAnalysis,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl TestReport {
    /// Failure reasons ordered by count (descending), ties broken by name.
    pub fn top_failure_reasons(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut reasons = self
            .failure_analysis
            .failure_reasons
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
            .collect::<Vec<_>>();
        reasons.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(right.0)));
        reasons.truncate(limit);
        reasons
    }

    pub fn sampled_metrics(&self) -> impl Iterator<Item = (&str, &LatencyStats)> {
        self.performance_metrics
            .iter()
            .filter_map(|(name, stats)| stats.as_ref().map(|stats| (name.as_str(), stats)))
    }
}
