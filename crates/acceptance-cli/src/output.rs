//! Output formatting and progress reporting

use acceptance::{AcceptanceError, RunListener, RunReport, ScenarioStep, TestStatus};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for a run; clones share the progress bar
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message("Done");
        }
    }

    fn line(&self, message: &str) {
        match self.progress_bar {
            Some(ref pb) if !pb.is_finished() => pb.println(message),
            _ => {
                let _ = self.term.write_line(message);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, color: Style, message: &str) {
        let prefix = if self.use_color {
            color.bold().apply_to(symbol).to_string()
        } else {
            plain.to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.prefixed("✓", "PASS", Style::new().green(), message);
        }
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        self.prefixed("✗", "FAIL", Style::new().red(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.prefixed("⚠", "WARN", Style::new().yellow(), message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.prefixed("ℹ", "INFO", Style::new().blue(), message);
        }
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Print the run summary and the artifacts written
    pub fn summary(&self, report: &RunReport, duration: Duration) {
        let summary = &report.summary;
        if self.quiet && report.is_success() {
            return;
        }

        self.line("");
        let duration_secs = duration.as_secs_f64();
        let status = if summary.failed > 0 || report.aborted.is_some() {
            "FAILED"
        } else {
            "PASSED"
        };

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();
            let status = if status == "FAILED" {
                failed_style.apply_to(status)
            } else {
                passed_style.apply_to(status)
            };
            self.line(&format!(
                "{} {} results in {:.2}s ({} passed, {} failed, {} skipped, {:.2}% pass rate)",
                status,
                summary.total,
                duration_secs,
                passed_style.apply_to(summary.passed),
                if summary.failed > 0 {
                    failed_style.apply_to(summary.failed).to_string()
                } else {
                    summary.failed.to_string()
                },
                skipped_style.apply_to(summary.skipped),
                summary.pass_rate
            ));
        } else {
            self.line(&format!(
                "{status} {} results in {duration_secs:.2}s ({} passed, {} failed, {} skipped, {:.2}% pass rate)",
                summary.total, summary.passed, summary.failed, summary.skipped, summary.pass_rate
            ));
        }

        if let Some(ref reason) = report.aborted {
            self.failure(&format!("run aborted: {reason}"));
        }
        for artifact in &report.artifacts {
            self.info(&format!("report written: {}", artifact.display()));
        }
        for error in &report.report_errors {
            self.failure(error);
        }
    }
}

impl RunListener for ProgressReporter {
    fn scenario_started(&mut self, name: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(name.to_string());
        }
        self.header(&format!("Scenario: {name}"));
    }

    fn step_finished(&mut self, step: &ScenarioStep, error: Option<&AcceptanceError>) {
        let text = format!("{} {}", step.kind, step.text);
        match error {
            None => self.success(&text),
            Some(e) => self.failure(&format!("{text}: {e}")),
        }
    }

    fn scenario_finished(&mut self, name: &str, status: TestStatus) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
        match status {
            TestStatus::Passed => self.success(&format!("scenario '{name}' passed")),
            TestStatus::Failed => self.failure(&format!("scenario '{name}' failed")),
            TestStatus::Skipped => self.warning(&format!("scenario '{name}' skipped")),
        }
    }
}
