//! Screenshot evidence captured during a run.
//!
//! Capture is best-effort: a missing page or a failing screenshot yields no
//! record and is logged, never raised. Records captured during a scenario
//! stay in a scenario-scoped list until [`EvidenceStore::merge_scenario`]
//! moves them into the run-level sequence.

use crate::driver::Page;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directory under the reports dir holding step screenshots
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Step name recorded for failure screenshots
pub const FAILURE_STEP: &str = "scenario failure";

/// One captured screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    /// Step text
    pub step: String,
    /// Step kind (Given, When, Then, ...)
    pub step_type: String,
    /// Scenario name
    pub scenario: String,
    /// File path
    pub path: PathBuf,
    /// Path relative to the reports directory
    pub relative_path: String,
    /// Capture time
    pub timestamp: DateTime<Local>,
    /// Step status at capture time
    pub status: String,
}

/// Labels attached to a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTag {
    /// Scenario name
    pub scenario: String,
    /// Step text
    pub step: String,
    /// Step kind
    pub step_type: String,
    /// Step status
    pub status: String,
}

impl CaptureTag {
    /// Tag for a passed step of unspecified kind
    #[must_use]
    pub fn new(scenario: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            step: step.into(),
            step_type: "step".to_string(),
            status: "passed".to_string(),
        }
    }

    /// Set the step kind
    #[must_use]
    pub fn with_step_type(mut self, step_type: impl Into<String>) -> Self {
        self.step_type = step_type.into();
        self
    }

    /// Set the status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Query over captured evidence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceFilter {
    /// Exact scenario name
    pub scenario: Option<String>,
    /// Substring of the step text
    pub step: Option<String>,
}

impl EvidenceFilter {
    /// Match everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match records of one scenario
    #[must_use]
    pub fn for_scenario(scenario: impl Into<String>) -> Self {
        Self {
            scenario: Some(scenario.into()),
            step: None,
        }
    }

    /// Additionally require the step text to contain `step`
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Whether `record` satisfies the filter
    #[must_use]
    pub fn matches(&self, record: &ScreenshotRecord) -> bool {
        self.scenario
            .as_ref()
            .map_or(true, |scenario| &record.scenario == scenario)
            && self
                .step
                .as_ref()
                .map_or(true, |step| record.step.contains(step.as_str()))
    }
}

/// In-memory evidence index for one run
#[derive(Debug)]
pub struct EvidenceStore {
    reports_dir: PathBuf,
    records: Vec<ScreenshotRecord>,
    scenario_records: Vec<ScreenshotRecord>,
    sequence: u64,
}

impl EvidenceStore {
    /// Create a store writing under `reports_dir`
    #[must_use]
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            records: Vec::new(),
            scenario_records: Vec::new(),
            sequence: 0,
        }
    }

    /// Reports directory
    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Directory holding step screenshots
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.reports_dir.join(SCREENSHOTS_DIR)
    }

    /// Create the reports and screenshots directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.screenshots_dir())
    }

    /// Reset the scenario-scoped list
    pub fn begin_scenario(&mut self, scenario: &str) {
        if !self.scenario_records.is_empty() {
            tracing::warn!(
                scenario,
                dropped = self.scenario_records.len(),
                "unmerged evidence from previous scenario discarded"
            );
        }
        self.scenario_records.clear();
    }

    /// Move the scenario-scoped records into the run-level sequence
    pub fn merge_scenario(&mut self) -> usize {
        let merged = self.scenario_records.len();
        self.records.append(&mut self.scenario_records);
        merged
    }

    /// Path for the next step screenshot; a per-store sequence number keeps
    /// captures within the same millisecond apart
    pub fn screenshot_path(&mut self, tag: &CaptureTag) -> PathBuf {
        self.sequence += 1;
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.screenshots_dir().join(format!(
            "screenshot_{}_{}_{stamp}_{:04}.png",
            sanitize(&tag.scenario),
            sanitize(&tag.step),
            self.sequence
        ))
    }

    /// Path for a scenario failure screenshot
    #[must_use]
    pub fn failure_path(&self, scenario: &str) -> PathBuf {
        self.reports_dir
            .join(format!("screenshot_{}.png", sanitize(scenario)))
    }

    /// Capture a step screenshot and index it.
    ///
    /// Returns `None` when there is no page or the capture fails.
    pub async fn capture(
        &mut self,
        page: Option<&mut (dyn Page + 'static)>,
        tag: &CaptureTag,
    ) -> Option<ScreenshotRecord> {
        let path = self.screenshot_path(tag);
        self.capture_to(page, tag, path).await
    }

    /// Capture the failure screenshot of a scenario and index it
    pub async fn capture_failure(
        &mut self,
        page: Option<&mut (dyn Page + 'static)>,
        scenario: &str,
    ) -> Option<ScreenshotRecord> {
        let tag = CaptureTag::new(scenario, FAILURE_STEP)
            .with_step_type("failure")
            .with_status("failed");
        let path = self.failure_path(scenario);
        self.capture_to(page, &tag, path).await
    }

    async fn capture_to(
        &mut self,
        page: Option<&mut (dyn Page + 'static)>,
        tag: &CaptureTag,
        path: PathBuf,
    ) -> Option<ScreenshotRecord> {
        let Some(page) = page else {
            tracing::debug!(scenario = %tag.scenario, step = %tag.step, "no page, screenshot skipped");
            return None;
        };
        if let Err(e) = page.screenshot(&path, true).await {
            tracing::warn!(
                scenario = %tag.scenario,
                step = %tag.step,
                error = %e,
                "screenshot capture failed"
            );
            return None;
        }
        let relative_path = path
            .strip_prefix(&self.reports_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let record = ScreenshotRecord {
            step: tag.step.clone(),
            step_type: tag.step_type.clone(),
            scenario: tag.scenario.clone(),
            path,
            relative_path,
            timestamp: Local::now(),
            status: tag.status.clone(),
        };
        tracing::debug!(path = %record.path.display(), "screenshot captured");
        self.scenario_records.push(record.clone());
        Some(record)
    }

    /// Records matching `filter`, in capture order.
    ///
    /// Merged records come first, then those of the scenario in flight.
    #[must_use]
    pub fn query(&self, filter: &EvidenceFilter) -> Vec<ScreenshotRecord> {
        self.records
            .iter()
            .chain(&self.scenario_records)
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    /// Every record, in capture order
    #[must_use]
    pub fn all(&self) -> Vec<ScreenshotRecord> {
        self.query(&EvidenceFilter::all())
    }

    /// Records of the scenario in flight
    #[must_use]
    pub fn scenario_records(&self) -> &[ScreenshotRecord] {
        &self.scenario_records
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len() + self.scenario_records.len()
    }

    /// Whether nothing has been captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replace every run of characters outside `[A-Za-z0-9_-]` with `_`
#[must_use]
pub fn sanitize(name: &str) -> String {
    static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();
    let name = name.trim();
    match UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").ok()) {
        Some(re) => re.replace_all(name, "_").into_owned(),
        None => name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect(),
    }
}

/// Render an HTML gallery of screenshots
#[must_use]
pub fn gallery_html(records: &[ScreenshotRecord]) -> String {
    if records.is_empty() {
        return "<p>No screenshots available.</p>\n".to_string();
    }
    let mut html = String::from("<div class=\"screenshot-gallery\">\n");
    for record in records {
        html.push_str(&format!(
            r#"  <div class="screenshot-item {status}">
    <img src="{src}" alt="{step}" loading="lazy">
    <div class="screenshot-caption">
      <strong>{step_type}</strong> {step}<br>
      <small>{scenario} &middot; {time}</small>
    </div>
  </div>
"#,
            status = escape_html(&record.status),
            src = escape_html(&record.relative_path),
            step = escape_html(&record.step),
            step_type = escape_html(&record.step_type),
            scenario = escape_html(&record.scenario),
            time = record.timestamp.format("%H:%M:%S"),
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Escape text for HTML content and attributes
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, Viewport};
    use crate::driver::{Driver, LaunchOptions, MockDriver, MockOp};
    use tempfile::TempDir;

    async fn mock_page(driver: &mut MockDriver) -> Box<dyn Page> {
        let mut browser = driver
            .launch(&LaunchOptions::from_config(&RunConfig::default()))
            .await
            .unwrap();
        let mut context = browser.new_context(Viewport::default(), "ua").await.unwrap();
        context.new_page().await.unwrap()
    }

    mod sanitize_tests {
        use super::*;

        #[test]
        fn test_spaces_and_symbols() {
            assert_eq!(sanitize("basic search"), "basic_search");
            assert_eq!(sanitize("I search for \"AI\"!"), "I_search_for_AI_");
            assert_eq!(sanitize("a/b\\c"), "a_b_c");
            assert_eq!(sanitize("keep-this_one"), "keep-this_one");
        }
    }

    mod filter_tests {
        use super::*;

        fn record(scenario: &str, step: &str) -> ScreenshotRecord {
            ScreenshotRecord {
                step: step.to_string(),
                step_type: "When".to_string(),
                scenario: scenario.to_string(),
                path: PathBuf::from("x.png"),
                relative_path: "x.png".to_string(),
                timestamp: Local::now(),
                status: "passed".to_string(),
            }
        }

        #[test]
        fn test_scenario_equality_step_substring() {
            let r = record("basic search", "I search for AI");
            assert!(EvidenceFilter::all().matches(&r));
            assert!(EvidenceFilter::for_scenario("basic search").matches(&r));
            assert!(!EvidenceFilter::for_scenario("basic").matches(&r));
            assert!(EvidenceFilter::for_scenario("basic search")
                .with_step("search for")
                .matches(&r));
            assert!(!EvidenceFilter::all().with_step("navigate").matches(&r));
        }
    }

    mod store_tests {
        use super::*;

        #[tokio::test]
        async fn test_back_to_back_captures_keep_separate_files() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new();
            let mut page = mock_page(&mut driver).await;

            store.begin_scenario("basic search");
            let tag = CaptureTag::new("basic search", "I search");
            let first = store.capture(Some(page.as_mut()), &tag).await.unwrap();
            let second = store.capture(Some(page.as_mut()), &tag).await.unwrap();
            assert_ne!(first.path, second.path);
            assert!(first.path.exists());
            assert!(second.path.exists());
            assert_eq!(store.len(), 2);
        }

        #[tokio::test]
        async fn test_capture_indexes_record() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new();
            let mut page = mock_page(&mut driver).await;

            store.begin_scenario("basic search");
            let tag = CaptureTag::new("basic search", "I navigate").with_step_type("Given");
            let record = store.capture(Some(page.as_mut()), &tag).await.unwrap();

            assert!(record.path.exists());
            assert!(record.relative_path.starts_with("screenshots/screenshot_basic_search_I_navigate_"));
            assert_eq!(record.step_type, "Given");
            assert_eq!(store.scenario_records().len(), 1);
            assert_eq!(store.len(), 1);
        }

        #[tokio::test]
        async fn test_capture_without_page_is_none() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let tag = CaptureTag::new("s", "step");
            assert!(store.capture(None, &tag).await.is_none());
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn test_capture_failure_is_swallowed() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new().failing_on(MockOp::Screenshot);
            let mut page = mock_page(&mut driver).await;
            let tag = CaptureTag::new("s", "step");
            assert!(store.capture(Some(page.as_mut()), &tag).await.is_none());
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn test_failure_screenshot_path() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new();
            let mut page = mock_page(&mut driver).await;
            let record = store
                .capture_failure(Some(page.as_mut()), "basic search")
                .await
                .unwrap();
            assert_eq!(record.path, dir.path().join("screenshot_basic_search.png"));
            assert_eq!(record.step, FAILURE_STEP);
            assert_eq!(record.status, "failed");
        }

        #[tokio::test]
        async fn test_query_order_and_merge() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new();
            let mut page = mock_page(&mut driver).await;

            store.begin_scenario("first");
            store
                .capture(Some(page.as_mut()), &CaptureTag::new("first", "one"))
                .await;
            store
                .capture(Some(page.as_mut()), &CaptureTag::new("first", "two"))
                .await;
            assert_eq!(store.merge_scenario(), 2);

            store.begin_scenario("second");
            store
                .capture(Some(page.as_mut()), &CaptureTag::new("second", "three"))
                .await;

            let steps: Vec<String> = store.all().into_iter().map(|r| r.step).collect();
            assert_eq!(steps, vec!["one", "two", "three"]);
            assert_eq!(store.query(&EvidenceFilter::for_scenario("first")).len(), 2);
            assert_eq!(
                store
                    .query(&EvidenceFilter::for_scenario("second").with_step("thr"))
                    .len(),
                1
            );
        }

        #[tokio::test]
        async fn test_begin_scenario_resets_unmerged() {
            let dir = TempDir::new().unwrap();
            let mut store = EvidenceStore::new(dir.path());
            let mut driver = MockDriver::new();
            let mut page = mock_page(&mut driver).await;
            store.begin_scenario("a");
            store
                .capture(Some(page.as_mut()), &CaptureTag::new("a", "x"))
                .await;
            store.begin_scenario("b");
            assert!(store.is_empty());
        }
    }

    mod gallery_tests {
        use super::*;

        #[test]
        fn test_empty_gallery() {
            assert!(gallery_html(&[]).contains("No screenshots available."));
        }

        #[test]
        fn test_gallery_escapes() {
            let record = ScreenshotRecord {
                step: "<script>".to_string(),
                step_type: "Then".to_string(),
                scenario: "s".to_string(),
                path: PathBuf::from("a.png"),
                relative_path: "screenshots/a.png".to_string(),
                timestamp: Local::now(),
                status: "passed".to_string(),
            };
            let html = gallery_html(&[record]);
            assert!(html.contains("&lt;script&gt;"));
            assert!(html.contains("screenshots/a.png"));
        }
    }
}
