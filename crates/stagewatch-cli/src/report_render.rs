use std::fmt::Write as _;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use stagewatch_protocol::TestReport;

use crate::board_render::format_duration_ms;

const TOP_FAILURE_REASONS: usize = 5;

fn optional_duration(value: Option<f64>) -> String {
    value
        .map(format_duration_ms)
        .unwrap_or_else(|| "n/a".to_string())
}

/// Text digest: run info, per-type success, latency table, top failure reasons.
pub fn render_report_digest(report: &TestReport) -> String {
    let info = &report.test_info;
    let summary = &report.summary;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "run: mode={} concurrency={} devices={} duration={:.1}s",
        info.test_mode.as_str(),
        info.concurrency,
        info.device_count,
        info.duration_seconds
    );
    if let (Some(start), Some(end)) = (info.start_time.as_deref(), info.end_time.as_deref()) {
        let _ = writeln!(out, "window: {start} -> {end}");
    }
    let _ = writeln!(
        out,
        "summary: total={} ok={} failed={} rate={:.2}% qps={:.2}",
        summary.total_tests,
        summary.successful_tests,
        summary.failed_tests,
        summary.success_rate,
        summary.qps
    );
    for (label, total, success, rate) in [
        (
            "inquiry",
            summary.inquiry_total,
            summary.inquiry_success,
            summary.inquiry_success_rate,
        ),
        (
            "compare",
            summary.compare_total,
            summary.compare_success,
            summary.compare_success_rate,
        ),
        (
            "order",
            summary.order_total,
            summary.order_success,
            summary.order_success_rate,
        ),
    ] {
        if total > 0 {
            let _ = writeln!(out, "  {label:<8} {success}/{total} ({rate:.2}%)");
        }
    }

    let metrics = report.sampled_metrics().collect::<Vec<_>>();
    if !metrics.is_empty() {
        let _ = writeln!(out, "latency:");
        let _ = writeln!(
            out,
            "  {:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>6}",
            "metric", "avg", "median", "p95", "p99", "min", "max", "n"
        );
        for (name, stats) in metrics {
            let _ = writeln!(
                out,
                "  {:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>6}",
                name,
                format_duration_ms(stats.avg),
                format_duration_ms(stats.median),
                optional_duration(stats.p95),
                optional_duration(stats.p99),
                format_duration_ms(stats.min),
                format_duration_ms(stats.max),
                stats.count
            );
        }
    }

    let reasons = report.top_failure_reasons(TOP_FAILURE_REASONS);
    if !reasons.is_empty() {
        let _ = writeln!(
            out,
            "failures: rate={:.2}%",
            report.failure_analysis.failure_rate
        );
        for (reason, count) in reasons {
            let _ = writeln!(out, "  {count:>5}  {reason}");
        }
    }
    out
}

/// Writes through a sibling temp file and renames it into place.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let temp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("report"),
        std::process::id(),
        nanos
    );
    let temp_path = parent_dir.join(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename temporary report {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stagewatch_protocol::TestReport;
    use tempfile::tempdir;

    use super::{render_report_digest, write_text_atomic};

    fn sample_report() -> TestReport {
        serde_json::from_value(json!({
            "test_info": {"concurrency": 4, "device_count": 2, "test_mode": "fast", "duration_seconds": 61.5,
                          "start_time": "2025-03-01T10:00:00", "end_time": "2025-03-01T10:01:01"},
            "summary": {"total_tests": 10, "successful_tests": 8, "failed_tests": 2, "success_rate": 80.0, "qps": 0.16,
                        "inquiry_total": 6, "inquiry_success": 5, "inquiry_success_rate": 83.33,
                        "order_total": 4, "order_success": 3, "order_success_rate": 75.0},
            "performance_metrics": {
                "total_response_time": {"avg": 1500.0, "median": 1400.0, "p95": 2900.0, "p99": null, "min": 800.0, "max": 3100.0, "count": 10},
                "tts_time": null
            },
            "failure_analysis": {"failure_reasons": {"timeout": 1, "asr mismatch": 1}, "failure_rate": 20.0}
        }))
        .expect("report decodes")
    }

    #[test]
    fn functional_digest_lists_summary_latency_and_failures() {
        let digest = render_report_digest(&sample_report());
        assert!(digest.contains("run: mode=fast concurrency=4 devices=2"));
        assert!(digest.contains("summary: total=10 ok=8 failed=2 rate=80.00%"));
        assert!(digest.contains("inquiry  5/6"));
        assert!(!digest.contains("compare "));
        assert!(digest.contains("total_response_time"));
        assert!(digest.contains("2.90 s"));
        assert!(!digest.contains("tts_time"));
        let asr = digest.find("asr mismatch").expect("asr reason");
        let timeout = digest.find("timeout").expect("timeout reason");
        assert!(asr < timeout);
    }

    #[test]
    fn functional_atomic_write_replaces_existing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("reports").join("run.json");
        write_text_atomic(&path, "{\"first\":true}").expect("first write");
        write_text_atomic(&path, "{\"second\":true}").expect("second write");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "{\"second\":true}"
        );
        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn regression_atomic_write_rejects_directory_target() {
        let dir = tempdir().expect("tempdir");
        let error = write_text_atomic(dir.path(), "{}").expect_err("directory target");
        assert!(error.to_string().contains("is a directory"));
    }
}
