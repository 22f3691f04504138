//! Run reports: result records, summary and HTML/JSON artifacts.
//!
//! ```text
//! OrchestrationClient::results() ──┐
//!                                  ├──► ReportSynthesizer ──► test_report_<ts>.html
//! EvidenceStore::all() ────────────┘                      └─► test_report_<ts>.json
//! ```
//!
//! The artifact timestamp is fixed when the synthesizer is created, so the
//! HTML and JSON of one run share it.

use crate::evidence::{escape_html, gallery_html, ScreenshotRecord};
use crate::result::{AcceptanceError, AcceptanceResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped
    Skipped,
}

impl TestStatus {
    /// Lowercase name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result reported for a scenario or a verification step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Scenario or step name
    pub name: String,
    /// Outcome
    pub status: TestStatus,
    /// When the result was recorded
    pub timestamp: DateTime<Local>,
    /// Free-form details (`error`, `duration`, ...)
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Screenshot documenting the result
    #[serde(rename = "screenshot", default, skip_serializing_if = "Option::is_none")]
    pub screenshot_ref: Option<String>,
}

impl TestResult {
    /// Create a result stamped now
    #[must_use]
    pub fn new(name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            status,
            timestamp: Local::now(),
            details: Map::new(),
            screenshot_ref: None,
        }
    }

    /// Replace the details
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Add one detail
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attach a screenshot reference
    #[must_use]
    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot_ref = Some(screenshot.into());
        self
    }

    /// `details.error`, if present
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }

    /// `details.duration` in seconds, if present
    #[must_use]
    pub fn duration_secs(&self) -> Option<f64> {
        self.details.get("duration").and_then(Value::as_f64)
    }
}

/// Counts derived from a result sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of results
    pub total: usize,
    /// Passed results
    pub passed: usize,
    /// Failed results
    pub failed: usize,
    /// Skipped results
    pub skipped: usize,
    /// Percentage of passed results, two decimals
    pub pass_rate: f64,
}

impl RunSummary {
    /// Compute the summary of `results`
    #[must_use]
    pub fn from_results(results: &[TestResult]) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        let total = results.len();
        let passed = count(TestStatus::Passed);
        let pass_rate = if total > 0 {
            (passed as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total,
            passed,
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            pass_rate,
        }
    }
}

/// Screenshots drawn by a result in the HTML report.
///
/// A record matches when the result name occurs in its step, or its scenario
/// occurs in the result name, both case-insensitively.
#[must_use]
pub fn evidence_for<'a>(
    result: &TestResult,
    evidence: &'a [ScreenshotRecord],
) -> Vec<&'a ScreenshotRecord> {
    let name = result.name.to_lowercase();
    evidence
        .iter()
        .filter(|record| {
            let scenario = record.scenario.to_lowercase();
            record.step.to_lowercase().contains(&name)
                || (!scenario.is_empty() && name.contains(&scenario))
        })
        .collect()
}

/// Writes the HTML and JSON artifacts of a run
#[derive(Debug, Clone)]
pub struct ReportSynthesizer {
    reports_dir: PathBuf,
    timestamp: String,
}

impl ReportSynthesizer {
    /// Create a synthesizer; the artifact timestamp is fixed here
    #[must_use]
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            timestamp: Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// Artifact timestamp
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Reports directory
    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// HTML artifact path
    #[must_use]
    pub fn html_path(&self) -> PathBuf {
        self.reports_dir
            .join(format!("test_report_{}.html", self.timestamp))
    }

    /// JSON artifact path
    #[must_use]
    pub fn json_path(&self) -> PathBuf {
        self.reports_dir
            .join(format!("test_report_{}.json", self.timestamp))
    }

    /// Summarize a result sequence
    #[must_use]
    pub fn summarize(results: &[TestResult]) -> RunSummary {
        RunSummary::from_results(results)
    }

    /// Render the HTML report
    #[must_use]
    pub fn html_content(
        &self,
        results: &[TestResult],
        title: &str,
        evidence: Option<&[ScreenshotRecord]>,
    ) -> String {
        let summary = Self::summarize(results);
        let mut html = String::new();

        html.push_str(&format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }}
        .summary {{ background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }}
        .progress-bar {{ background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }}
        .progress {{ background: #4caf50; height: 100%; }}
        .test {{ padding: 10px; margin: 5px 0; border-radius: 4px; }}
        .test.passed {{ background: #e8f5e9; border-left: 4px solid #4caf50; }}
        .test.failed {{ background: #ffebee; border-left: 4px solid #f44336; }}
        .test.skipped {{ background: #fff3e0; border-left: 4px solid #ff9800; }}
        .error {{ color: #d32f2f; font-family: monospace; white-space: pre-wrap; }}
        .screenshot-gallery {{ display: flex; flex-wrap: wrap; gap: 10px; margin: 10px 0; }}
        .screenshot-item img {{ max-width: 300px; border: 1px solid #ddd; }}
    </style>
</head>
<body>
"#,
            title = escape_html(title)
        ));

        html.push_str(&format!(
            r#"<div class="summary">
    <h1>{title}</h1>
    <p>Generated: {generated}</p>
    <h2>Results: {passed}/{total} passed ({rate:.2}%)</h2>
    <div class="progress-bar">
        <div class="progress" style="width: {rate:.2}%"></div>
    </div>
    <p>Passed: {passed} &middot; Failed: {failed} &middot; Skipped: {skipped}</p>
</div>
"#,
            title = escape_html(title),
            generated = Local::now().format("%Y-%m-%d %H:%M:%S"),
            passed = summary.passed,
            total = summary.total,
            failed = summary.failed,
            skipped = summary.skipped,
            rate = summary.pass_rate,
        ));

        html.push_str("<h2>Test Results</h2>\n");
        if results.is_empty() {
            html.push_str("<p>No test results recorded.</p>\n");
        }
        for result in results {
            html.push_str(&format!(
                r#"<div class="test {status}">
    <strong>{name}</strong> - {status}
"#,
                status = result.status,
                name = escape_html(&result.name),
            ));
            if let Some(duration) = result.duration_secs() {
                html.push_str(&format!("    <p>Duration: {duration:.2}s</p>\n"));
            }
            if let Some(error) = result.error() {
                html.push_str(&format!(
                    "    <div class=\"error\">{}</div>\n",
                    escape_html(error)
                ));
            }
            if let Some(evidence) = evidence {
                let matched: Vec<ScreenshotRecord> =
                    evidence_for(result, evidence).into_iter().cloned().collect();
                if !matched.is_empty() {
                    html.push_str(&gallery_html(&matched));
                }
            }
            html.push_str("</div>\n");
        }

        html.push_str(
            r#"
<footer>
    <p>Generated by acceptance</p>
</footer>
</body>
</html>
"#,
        );
        html
    }

    /// Build the JSON report document
    #[must_use]
    pub fn json_content(&self, results: &[TestResult]) -> Value {
        json!({
            "timestamp": self.timestamp,
            "generated_at": Local::now().to_rfc3339(),
            "test_results": results,
            "summary": Self::summarize(results),
        })
    }

    /// Write the HTML report and return its path
    pub fn render_html(
        &self,
        results: &[TestResult],
        title: &str,
        evidence: Option<&[ScreenshotRecord]>,
    ) -> AcceptanceResult<PathBuf> {
        let path = self.html_path();
        self.write(&path, &self.html_content(results, title, evidence))?;
        tracing::info!(path = %path.display(), "HTML report written");
        Ok(path)
    }

    /// Write the JSON report and return its path
    pub fn render_json(&self, results: &[TestResult]) -> AcceptanceResult<PathBuf> {
        let path = self.json_path();
        let content = serde_json::to_string_pretty(&self.json_content(results)).map_err(|e| {
            AcceptanceError::ReportWrite {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        self.write(&path, &content)?;
        tracing::info!(path = %path.display(), "JSON report written");
        Ok(path)
    }

    fn write(&self, path: &Path, content: &str) -> AcceptanceResult<()> {
        std::fs::create_dir_all(&self.reports_dir)
            .and_then(|()| std::fs::write(path, content))
            .map_err(|e| AcceptanceError::ReportWrite {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn results(statuses: &[TestStatus]) -> Vec<TestResult> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| TestResult::new(format!("test {i}"), *s))
            .collect()
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_mixed_results() {
            let summary = RunSummary::from_results(&results(&[
                TestStatus::Passed,
                TestStatus::Failed,
                TestStatus::Failed,
                TestStatus::Skipped,
            ]));
            assert_eq!(summary.total, 4);
            assert_eq!(summary.passed, 1);
            assert_eq!(summary.failed, 2);
            assert_eq!(summary.skipped, 1);
            assert!((summary.pass_rate - 25.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_empty_results() {
            let summary = RunSummary::from_results(&[]);
            assert_eq!(summary.total, 0);
            assert!(summary.pass_rate.abs() < f64::EPSILON);
        }

        #[test]
        fn test_pass_rate_rounds_to_two_decimals() {
            let summary = RunSummary::from_results(&results(&[
                TestStatus::Passed,
                TestStatus::Failed,
                TestStatus::Failed,
            ]));
            assert!((summary.pass_rate - 33.33).abs() < 1e-9);
        }

        #[test]
        fn test_duplicates_are_counted() {
            let mut all = results(&[TestStatus::Failed]);
            all.push(TestResult::new("test 0", TestStatus::Passed));
            let summary = ReportSynthesizer::summarize(&all);
            assert_eq!(summary.total, 2);
        }
    }

    mod result_tests {
        use super::*;

        #[test]
        fn test_serialized_shape() {
            let result = TestResult::new("basic search", TestStatus::Failed)
                .with_detail("error", "no results")
                .with_screenshot("reports/screenshot_basic_search.png");
            let value = serde_json::to_value(&result).unwrap();
            assert_eq!(value["status"], "failed");
            assert_eq!(value["details"]["error"], "no results");
            assert_eq!(value["screenshot"], "reports/screenshot_basic_search.png");
            assert_eq!(result.error(), Some("no results"));
        }

        #[test]
        fn test_screenshot_omitted_when_absent() {
            let value = serde_json::to_value(TestResult::new("x", TestStatus::Passed)).unwrap();
            assert!(value.get("screenshot").is_none());
        }

        #[test]
        fn test_roundtrip_keeps_details() {
            let result =
                TestResult::new("basic search", TestStatus::Passed).with_detail("duration", 1.25);
            let json = serde_json::to_string(&result).unwrap();
            let back: TestResult = serde_json::from_str(&json).unwrap();
            assert_eq!(back.duration_secs(), Some(1.25));
        }
    }

    mod evidence_link_tests {
        use super::*;

        fn record(scenario: &str, step: &str) -> ScreenshotRecord {
            ScreenshotRecord {
                step: step.to_string(),
                step_type: "Then".to_string(),
                scenario: scenario.to_string(),
                path: PathBuf::from("a.png"),
                relative_path: "screenshots/a.png".to_string(),
                timestamp: Local::now(),
                status: "passed".to_string(),
            }
        }

        #[test]
        fn test_name_in_step_or_scenario_in_name() {
            let evidence = vec![
                record("Basic Search", "I open the page"),
                record("other", "verify_search_results done"),
                record("unrelated", "nothing"),
            ];
            let scenario = TestResult::new("basic search", TestStatus::Passed);
            assert_eq!(evidence_for(&scenario, &evidence).len(), 1);

            let step = TestResult::new("verify_search_results", TestStatus::Passed);
            assert_eq!(evidence_for(&step, &evidence).len(), 1);

            let none = TestResult::new("checkout", TestStatus::Passed);
            assert!(evidence_for(&none, &evidence).is_empty());
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_artifacts_share_timestamp() {
            let dir = TempDir::new().unwrap();
            let synth = ReportSynthesizer::new(dir.path());
            let all = results(&[TestStatus::Passed]);
            let html = synth.render_html(&all, "Run", None).unwrap();
            let json = synth.render_json(&all).unwrap();
            let stamp = synth.timestamp();
            assert!(html.ends_with(format!("test_report_{stamp}.html")));
            assert!(json.ends_with(format!("test_report_{stamp}.json")));
        }

        #[test]
        fn test_json_schema() {
            let dir = TempDir::new().unwrap();
            let synth = ReportSynthesizer::new(dir.path());
            let path = synth
                .render_json(&results(&[TestStatus::Passed, TestStatus::Failed]))
                .unwrap();
            let value: Value =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(value["timestamp"], synth.timestamp());
            assert!(value["generated_at"].is_string());
            assert_eq!(value["test_results"].as_array().unwrap().len(), 2);
            assert_eq!(value["summary"]["total"], 2);
            assert_eq!(value["summary"]["pass_rate"], 50.0);
        }

        #[test]
        fn test_html_contains_results_and_escapes() {
            let synth = ReportSynthesizer::new("reports");
            let all = vec![TestResult::new("a <b>", TestStatus::Failed)
                .with_detail("error", "boom & bust")
                .with_detail("duration", 2.5)];
            let html = synth.html_content(&all, "My Run", Some(&[][..]));
            assert!(html.contains("<title>My Run</title>"));
            assert!(html.contains("a &lt;b&gt;"));
            assert!(html.contains("boom &amp; bust"));
            assert!(html.contains("Duration: 2.50s"));
            assert!(html.contains("Results: 0/1 passed"));
        }

        #[test]
        fn test_empty_run_still_renders() {
            let dir = TempDir::new().unwrap();
            let synth = ReportSynthesizer::new(dir.path().join("nested"));
            let path = synth.render_html(&[], "Empty", None).unwrap();
            let html = std::fs::read_to_string(path).unwrap();
            assert!(html.contains("No test results recorded."));
        }

        #[test]
        fn test_unwritable_dir_is_report_write_error() {
            let dir = TempDir::new().unwrap();
            let blocker = dir.path().join("file");
            std::fs::write(&blocker, "x").unwrap();
            let synth = ReportSynthesizer::new(&blocker);
            let err = synth.render_json(&[]).unwrap_err();
            assert!(matches!(err, AcceptanceError::ReportWrite { .. }));
        }
    }

    fn status_strategy() -> impl Strategy<Value = TestStatus> {
        prop_oneof![
            Just(TestStatus::Passed),
            Just(TestStatus::Failed),
            Just(TestStatus::Skipped),
        ]
    }

    proptest! {
        #[test]
        fn prop_summary_counts_add_up(statuses in prop::collection::vec(status_strategy(), 0..64)) {
            let summary = RunSummary::from_results(&results(&statuses));
            prop_assert_eq!(summary.total, statuses.len());
            prop_assert_eq!(summary.passed + summary.failed + summary.skipped, summary.total);
        }

        #[test]
        fn prop_pass_rate_bounded(statuses in prop::collection::vec(status_strategy(), 0..64)) {
            let summary = RunSummary::from_results(&results(&statuses));
            prop_assert!((0.0..=100.0).contains(&summary.pass_rate));
            if statuses.is_empty() {
                prop_assert!(summary.pass_rate.abs() < f64::EPSILON);
            }
        }
    }
}
