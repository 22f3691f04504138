//! HookScheduler - the suite / scenario / step lifecycle.
//!
//! ```text
//!            suite_start            scenario_start           run_step
//!   Idle ───────────────► SuiteActive ─────────────► ScenarioActive ─────► StepExecuting
//!     ▲                      │   ▲                      │     ▲                  │
//!     └──────────────────────┘   └──────────────────────┘     └──────────────────┘
//!            suite_end               scenario_end              (step returns)
//! ```
//!
//! Hooks are synchronous; every browser or orchestration call goes through
//! the [`AsyncBridge`](crate::bridge::AsyncBridge) owned by the session
//! manager. A failing step fails its scenario, never the suite.

use crate::config::{ConfigLoader, RunConfig};
use crate::driver::Driver;
use crate::evidence::{CaptureTag, ScreenshotRecord};
use crate::harness::{ScenarioStep, StepContext};
use crate::orchestration::{OrchestrationClient, ReportOutcome};
use crate::reporter::{ReportSynthesizer, RunSummary, TestResult, TestStatus};
use crate::result::{AcceptanceError, AcceptanceResult};
use crate::session::{Session, SessionManager};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Span};
use uuid::Uuid;

/// Default HTML report title
pub const DEFAULT_TITLE: &str = "Acceptance Test Report";

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// No suite running
    Idle,
    /// Suite started, no scenario running
    SuiteActive,
    /// Scenario running between steps
    ScenarioActive,
    /// A step is executing
    StepExecuting,
}

/// What `suite_end` produced
#[derive(Debug)]
pub struct SuiteOutcome {
    /// Summary of every reported result
    pub summary: RunSummary,
    /// Report files written
    pub artifacts: Vec<PathBuf>,
    /// Report files that could not be written
    pub report_errors: Vec<AcceptanceError>,
}

#[derive(Debug)]
struct ActiveScenario {
    name: String,
    started: Instant,
    span: Span,
    vars: HashMap<String, String>,
}

/// Explicit owner of the hook lifecycle
pub struct HookScheduler {
    phase: HookPhase,
    run_id: Uuid,
    run_span: Span,
    loader: ConfigLoader,
    environment: Option<String>,
    headless: Option<bool>,
    preset_config: Option<RunConfig>,
    reports_dir: PathBuf,
    title: String,
    driver: Option<Box<dyn Driver>>,
    orchestration: Option<OrchestrationClient>,
    manager: Option<SessionManager>,
    session: Option<Session>,
    scenario: Option<ActiveScenario>,
    scenario_failures: usize,
}

impl fmt::Debug for HookScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookScheduler")
            .field("phase", &self.phase)
            .field("run_id", &self.run_id)
            .field("reports_dir", &self.reports_dir)
            .field("manager", &self.manager)
            .field("scenario_failures", &self.scenario_failures)
            .finish_non_exhaustive()
    }
}

impl HookScheduler {
    /// Create a scheduler that will drive `driver`
    #[must_use]
    pub fn new(driver: Box<dyn Driver>) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            phase: HookPhase::Idle,
            run_id,
            run_span: info_span!("run", run_id = %run_id),
            loader: ConfigLoader::new("."),
            environment: None,
            headless: None,
            preset_config: None,
            reports_dir: PathBuf::from("reports"),
            title: DEFAULT_TITLE.to_string(),
            driver: Some(driver),
            orchestration: None,
            manager: None,
            session: None,
            scenario: None,
            scenario_failures: 0,
        }
    }

    /// Load configuration through `loader`
    #[must_use]
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Select the environment explicitly
    #[must_use]
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    /// Override headless mode after loading
    #[must_use]
    pub const fn with_headless(mut self, headless: Option<bool>) -> Self {
        self.headless = headless;
        self
    }

    /// Use `config` instead of loading one
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.preset_config = Some(config);
        self
    }

    /// Write artifacts under `dir`
    #[must_use]
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    /// HTML report title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Use `client` instead of one built from the configuration
    #[must_use]
    pub fn with_orchestration(mut self, client: OrchestrationClient) -> Self {
        self.orchestration = Some(client);
        self
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Reports directory
    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Session manager, once the suite started
    #[must_use]
    pub const fn manager(&self) -> Option<&SessionManager> {
        self.manager.as_ref()
    }

    /// Configuration in effect, once the suite started
    #[must_use]
    pub fn config(&self) -> Option<&RunConfig> {
        self.manager.as_ref().map(SessionManager::config)
    }

    /// Results reported so far
    #[must_use]
    pub fn results(&self) -> &[TestResult] {
        self.manager
            .as_ref()
            .map_or(&[], |m| m.orchestration().results())
    }

    /// Scenarios that ended failed
    #[must_use]
    pub const fn scenario_failures(&self) -> usize {
        self.scenario_failures
    }

    /// Load configuration, build the session manager and create the
    /// artifact directories. Calling it again while the suite is active
    /// does nothing.
    pub fn suite_start(&mut self) -> AcceptanceResult<()> {
        let _run = self.run_span.clone().entered();
        if self.phase != HookPhase::Idle {
            debug!(phase = ?self.phase, "suite already started");
            return Ok(());
        }
        let driver = self
            .driver
            .take()
            .ok_or_else(|| AcceptanceError::invalid_state("suite already ran with this scheduler"))?;

        let mut config = match self.preset_config.take() {
            Some(config) => config,
            None => self.loader.load(self.environment.as_deref()),
        };
        if let Some(headless) = self.headless {
            config = config.with_headless(headless);
        }
        let orchestration = self
            .orchestration
            .take()
            .unwrap_or_else(|| OrchestrationClient::from_config(&config));

        info!(
            environment = %config.environment,
            base_url = %config.base_url,
            browser = %config.browser_kind,
            headless = config.headless,
            "starting test suite"
        );
        let manager = SessionManager::new(config, driver, orchestration, &self.reports_dir);
        if let Err(e) = manager.evidence().ensure_dirs() {
            error!(path = %self.reports_dir.display(), error = %e, "cannot create report directories");
        }
        self.manager = Some(manager);
        self.phase = HookPhase::SuiteActive;
        Ok(())
    }

    /// Acquire a fresh session, start orchestration and reset the
    /// scenario-scoped evidence.
    ///
    /// Acquisition is attempted `1 + retry_count` times; the last
    /// [`AcceptanceError::SessionInit`] is returned if all fail.
    pub fn scenario_start(&mut self, name: &str) -> AcceptanceResult<()> {
        let _run = self.run_span.clone().entered();
        self.expect_phase(HookPhase::SuiteActive, "scenario_start")?;
        let manager = self
            .manager
            .as_mut()
            .ok_or_else(|| AcceptanceError::invalid_state("no session manager"))?;

        if let Some(stale) = self.session.take() {
            warn!(scenario = name, "releasing session left over from previous scenario");
            manager.release(stale);
        }

        let attempts = manager.config().retry_count.saturating_add(1);
        let mut last_error = None;
        let mut session = None;
        for attempt in 1..=attempts {
            match manager.acquire() {
                Ok(acquired) => {
                    session = Some(acquired);
                    break;
                }
                Err(e) => {
                    warn!(scenario = name, attempt, attempts, error = %e, "session acquisition failed");
                    last_error = Some(e);
                }
            }
        }
        let Some(session) = session else {
            return Err(last_error
                .unwrap_or_else(|| AcceptanceError::session_init("no acquisition attempted")));
        };

        let parts = manager.parts();
        let orchestration = parts.orchestration;
        match parts
            .bridge
            .run(async { Ok(orchestration.start_orchestration(name).await) })
        {
            Ok(status) => debug!(scenario = name, ?status, "orchestration start"),
            Err(e) => warn!(scenario = name, error = %e, "orchestration start did not complete"),
        }
        parts.evidence.begin_scenario(name);

        let span = info_span!(parent: &self.run_span, "scenario", scenario = %name);
        span.in_scope(|| info!("scenario started"));
        self.scenario = Some(ActiveScenario {
            name: name.to_string(),
            started: Instant::now(),
            span,
            vars: HashMap::new(),
        });
        self.session = Some(session);
        self.phase = HookPhase::ScenarioActive;
        Ok(())
    }

    /// Execute a step against the live session under the step timeout.
    ///
    /// Errors come back as [`AcceptanceError::StepExecution`].
    pub fn run_step(&mut self, step: &ScenarioStep) -> AcceptanceResult<()> {
        self.expect_phase(HookPhase::ScenarioActive, "run_step")?;
        let (Some(scenario), Some(manager), Some(session)) = (
            self.scenario.as_mut(),
            self.manager.as_mut(),
            self.session.as_mut(),
        ) else {
            return Err(AcceptanceError::invalid_state("no live session"));
        };
        let _span = scenario.span.clone().entered();

        self.phase = HookPhase::StepExecuting;
        let parts = manager.parts();
        let timeout = parts.config.step_timeout();
        let result = match session.page_mut() {
            Some(page) => {
                let mut ctx = StepContext {
                    page,
                    config: parts.config,
                    orchestration: parts.orchestration,
                    vars: &mut scenario.vars,
                    scenario: &scenario.name,
                };
                parts.bridge.run_for(timeout, step.action.run(&mut ctx))
            }
            None => Err(AcceptanceError::page("session has no page")),
        };
        self.phase = HookPhase::ScenarioActive;

        match result {
            Ok(()) => {
                info!(step = %step.text, kind = %step.kind, "step passed");
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    AcceptanceError::StepExecution { .. } => e,
                    other => AcceptanceError::step(&step.text, other.to_string()),
                };
                error!(step = %step.text, kind = %step.kind, error = %e, "step failed");
                Err(e)
            }
        }
    }

    /// Capture a screenshot documenting the step just finished.
    ///
    /// Capture failures are logged and yield `None`.
    pub fn step_end(
        &mut self,
        step: &ScenarioStep,
        status: TestStatus,
    ) -> AcceptanceResult<Option<ScreenshotRecord>> {
        self.expect_phase(HookPhase::ScenarioActive, "step_end")?;
        let (Some(scenario), Some(manager)) = (self.scenario.as_ref(), self.manager.as_mut()) else {
            return Err(AcceptanceError::invalid_state("no active scenario"));
        };
        let _span = scenario.span.clone().entered();

        let tag = CaptureTag::new(&scenario.name, &step.text)
            .with_step_type(step.kind.as_str())
            .with_status(status.as_str());
        let parts = manager.parts();
        let evidence = parts.evidence;
        let page = self.session.as_mut().and_then(Session::page_mut);
        let record = parts
            .bridge
            .run(async { Ok(evidence.capture(page, &tag).await) })
            .unwrap_or_else(|e| {
                warn!(step = %step.text, error = %e, "step screenshot did not complete");
                None
            });
        Ok(record)
    }

    /// Report the scenario outcome, stop orchestration, merge evidence and
    /// release the session. The session is released whatever reporting does.
    pub fn scenario_end(&mut self, failure: Option<&str>) -> AcceptanceResult<TestStatus> {
        self.expect_phase(HookPhase::ScenarioActive, "scenario_end")?;
        let scenario = self
            .scenario
            .take()
            .ok_or_else(|| AcceptanceError::invalid_state("no active scenario"))?;
        let _span = scenario.span.clone().entered();
        let status = if failure.is_some() {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        };

        if let Some(manager) = self.manager.as_mut() {
            let parts = manager.parts();
            let (bridge, evidence, orchestration) =
                (parts.bridge, parts.evidence, parts.orchestration);

            let result = match failure {
                Some(error) => {
                    let page = self.session.as_mut().and_then(Session::page_mut);
                    let shot = bridge
                        .run(async { Ok(evidence.capture_failure(page, &scenario.name).await) })
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "failure screenshot did not complete");
                            None
                        });
                    let result = TestResult::new(&scenario.name, TestStatus::Failed)
                        .with_detail("error", error);
                    match shot {
                        Some(record) => {
                            info!(path = %record.path.display(), "failure screenshot saved");
                            result.with_screenshot(record.path.to_string_lossy())
                        }
                        None => result,
                    }
                }
                None => TestResult::new(&scenario.name, TestStatus::Passed)
                    .with_detail("duration", scenario.started.elapsed().as_secs_f64()),
            };
            match bridge.run(async { Ok(orchestration.record(result).await) }) {
                Ok(ReportOutcome::Error) => warn!("scenario result kept locally only"),
                Ok(outcome) => debug!(?outcome, "scenario result reported"),
                Err(e) => error!(error = %e, "scenario result could not be reported"),
            }

            match bridge.run(async { Ok(orchestration.stop_orchestration(&scenario.name).await) }) {
                Ok(status) => debug!(?status, "orchestration stop"),
                Err(e) => warn!(error = %e, "orchestration stop did not complete"),
            }
            let merged = evidence.merge_scenario();
            debug!(merged, "scenario evidence merged");

            if let Some(session) = self.session.take() {
                manager.release(session);
            }
        }

        if status.is_failed() {
            self.scenario_failures += 1;
        }
        info!(%status, "scenario finished");
        self.phase = HookPhase::SuiteActive;
        Ok(status)
    }

    /// Record a scenario that could not start
    pub fn scenario_aborted(&mut self, name: &str, error: &AcceptanceError) -> AcceptanceResult<()> {
        self.expect_phase(HookPhase::SuiteActive, "scenario_aborted")?;
        self.scenario_failures += 1;
        self.record_unstarted(
            TestResult::new(name, TestStatus::Failed).with_detail("error", error.to_string()),
        );
        Ok(())
    }

    /// Record a scenario that was not run
    pub fn scenario_skipped(&mut self, name: &str, reason: &str) -> AcceptanceResult<()> {
        self.expect_phase(HookPhase::SuiteActive, "scenario_skipped")?;
        self.record_unstarted(
            TestResult::new(name, TestStatus::Skipped).with_detail("reason", reason),
        );
        Ok(())
    }

    fn record_unstarted(&mut self, result: TestResult) {
        let _run = self.run_span.clone().entered();
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        let name = result.name.clone();
        let status = result.status;
        let parts = manager.parts();
        let orchestration = parts.orchestration;
        if let Err(e) = parts
            .bridge
            .run(async { Ok(orchestration.record(result).await) })
        {
            error!(scenario = %name, error = %e, "result could not be recorded");
        }
        info!(scenario = %name, %status, "scenario not run");
    }

    /// Write the HTML and JSON reports and return to `Idle`.
    ///
    /// A scenario still open is ended as failed first. Report write errors
    /// are returned in the outcome, not raised.
    pub fn suite_end(&mut self) -> AcceptanceResult<SuiteOutcome> {
        let _run = self.run_span.clone().entered();
        if self.phase == HookPhase::Idle {
            return Err(AcceptanceError::invalid_state("suite_end without suite_start"));
        }
        if self.scenario.is_some() {
            warn!("scenario still open at suite end");
            self.phase = HookPhase::ScenarioActive;
            self.scenario_end(Some("scenario did not finish before suite end"))?;
        }
        let manager = self
            .manager
            .as_ref()
            .ok_or_else(|| AcceptanceError::invalid_state("no session manager"))?;

        let results = manager.orchestration().results();
        let evidence = manager.evidence().all();
        let synthesizer = ReportSynthesizer::new(&self.reports_dir);
        let summary = ReportSynthesizer::summarize(results);

        let mut artifacts = Vec::new();
        let mut report_errors = Vec::new();
        for written in [
            synthesizer.render_html(results, &self.title, Some(evidence.as_slice())),
            synthesizer.render_json(results),
        ] {
            match written {
                Ok(path) => artifacts.push(path),
                Err(e) => {
                    error!(error = %e, "report not written");
                    report_errors.push(e);
                }
            }
        }

        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            pass_rate = summary.pass_rate,
            "test suite completed"
        );
        self.phase = HookPhase::Idle;
        Ok(SuiteOutcome {
            summary,
            artifacts,
            report_errors,
        })
    }

    fn expect_phase(&self, expected: HookPhase, hook: &str) -> AcceptanceResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AcceptanceError::invalid_state(format!(
                "{hook} called in phase {:?}, expected {expected:?}",
                self.phase
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockOp};
    use crate::evidence::EvidenceFilter;
    use crate::harness::{StepAction, StepKind};
    use crate::orchestration::LoopbackTransport;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Navigate;

    #[async_trait]
    impl StepAction for Navigate {
        async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
            let url = ctx.config.base_url.clone();
            ctx.page
                .goto(&url, crate::driver::WaitPolicy::Load, ctx.config.timeout())
                .await?;
            ctx.vars.insert("visited".to_string(), url);
            Ok(())
        }
    }

    struct Sleep;

    #[async_trait]
    impl StepAction for Sleep {
        async fn run(&self, _ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            Ok(())
        }
    }

    fn scheduler(driver: &MockDriver, dir: &TempDir) -> HookScheduler {
        let mut config = RunConfig::default();
        config.step_timeout_ms = 50;
        HookScheduler::new(Box::new(driver.clone()))
            .with_config(config)
            .with_orchestration(OrchestrationClient::new(
                Box::new(LoopbackTransport::new()),
                true,
            ))
            .with_reports_dir(dir.path().join("reports"))
    }

    mod phase_tests {
        use super::*;

        #[test]
        fn test_suite_start_is_idempotent() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            let config = hooks.config().cloned();
            hooks.suite_start().unwrap();
            assert_eq!(hooks.phase(), HookPhase::SuiteActive);
            assert_eq!(hooks.config().cloned(), config);
            assert!(dir.path().join("reports").join("screenshots").is_dir());
        }

        #[test]
        fn test_wrong_phase_is_invalid_state() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            assert!(matches!(
                hooks.scenario_start("x"),
                Err(AcceptanceError::InvalidState { .. })
            ));
            assert!(matches!(
                hooks.suite_end(),
                Err(AcceptanceError::InvalidState { .. })
            ));
            hooks.suite_start().unwrap();
            assert!(matches!(
                hooks.scenario_end(None),
                Err(AcceptanceError::InvalidState { .. })
            ));
        }

        #[test]
        fn test_full_cycle_phases() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("basic search").unwrap();
            assert_eq!(hooks.phase(), HookPhase::ScenarioActive);
            let step = ScenarioStep::new(StepKind::Given, "navigate", Navigate);
            hooks.run_step(&step).unwrap();
            assert_eq!(hooks.phase(), HookPhase::ScenarioActive);
            hooks.step_end(&step, TestStatus::Passed).unwrap();
            assert_eq!(hooks.scenario_end(None).unwrap(), TestStatus::Passed);
            assert_eq!(hooks.phase(), HookPhase::SuiteActive);
            hooks.suite_end().unwrap();
            assert_eq!(hooks.phase(), HookPhase::Idle);
        }
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn test_passed_scenario_reports_duration() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("basic search").unwrap();
            hooks.scenario_end(None).unwrap();
            let results = hooks.results();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].status, TestStatus::Passed);
            assert!(results[0].duration_secs().is_some());
        }

        #[test]
        fn test_orchestration_started_and_stopped() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let transport = LoopbackTransport::new();
            let mut hooks = scheduler(&driver, &dir)
                .with_orchestration(OrchestrationClient::new(Box::new(transport.clone()), true));
            hooks.suite_start().unwrap();
            hooks.scenario_start("s").unwrap();
            hooks.scenario_end(None).unwrap();
            let calls = transport.calls();
            assert_eq!(calls.first().map(String::as_str), Some("start_test_orchestration"));
            assert!(calls.contains(&"stop_test_orchestration".to_string()));
        }

        #[test]
        fn test_step_end_captures_after_step() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("s").unwrap();
            let step = ScenarioStep::new(StepKind::Given, "navigate", Navigate);
            hooks.run_step(&step).unwrap();
            let record = hooks.step_end(&step, TestStatus::Passed).unwrap().unwrap();
            assert_eq!(record.step_type, "Given");

            let calls = driver.calls();
            let goto = calls.iter().position(|c| c.starts_with("goto:")).unwrap();
            let shot = calls.iter().position(|c| c.starts_with("screenshot:")).unwrap();
            assert!(goto < shot);
            hooks.scenario_end(None).unwrap();
        }

        #[test]
        fn test_screenshot_failure_does_not_fail_scenario() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new().failing_on(MockOp::Screenshot);
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("s").unwrap();
            let step = ScenarioStep::new(StepKind::Given, "navigate", Navigate);
            hooks.run_step(&step).unwrap();
            assert!(hooks.step_end(&step, TestStatus::Passed).unwrap().is_none());
            assert_eq!(hooks.scenario_end(None).unwrap(), TestStatus::Passed);
        }

        #[test]
        fn test_failed_scenario_reported_even_without_screenshot() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new().failing_on(MockOp::Screenshot);
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("s").unwrap();
            hooks.scenario_end(Some("boom")).unwrap();
            let results = hooks.results();
            assert_eq!(results[0].status, TestStatus::Failed);
            assert_eq!(results[0].error(), Some("boom"));
            assert!(results[0].screenshot_ref.is_none());
            assert_eq!(driver.live_handles(), (0, 0, 0));
            assert_eq!(hooks.scenario_failures(), 1);
        }

        #[test]
        fn test_failed_scenario_has_failure_evidence() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("basic search").unwrap();
            hooks.scenario_end(Some("verify results failed")).unwrap();
            let evidence = hooks
                .manager()
                .unwrap()
                .evidence()
                .query(&EvidenceFilter::for_scenario("basic search"));
            assert_eq!(evidence.len(), 1);
            assert!(dir
                .path()
                .join("reports")
                .join("screenshot_basic_search.png")
                .exists());
        }

        #[test]
        fn test_step_timeout_fails_step() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("s").unwrap();
            let step = ScenarioStep::new(StepKind::When, "waits forever", Sleep);
            let err = hooks.run_step(&step).unwrap_err();
            assert!(matches!(err, AcceptanceError::StepExecution { .. }));
            assert!(err.to_string().contains("timed out"));
            assert_eq!(hooks.phase(), HookPhase::ScenarioActive);
            hooks.scenario_end(Some(&err.to_string())).unwrap();
        }

        #[test]
        fn test_retry_then_success() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new().failing_on(MockOp::NewContext);
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            let err = hooks.scenario_start("s").unwrap_err();
            assert!(err.is_fatal_to_run());
            assert_eq!(driver.live_handles(), (0, 0, 0));

            driver.recover(MockOp::NewContext);
            hooks.scenario_start("s").unwrap();
            hooks.scenario_end(None).unwrap();
        }

        #[test]
        fn test_suite_end_closes_open_scenario() {
            let dir = TempDir::new().unwrap();
            let driver = MockDriver::new();
            let mut hooks = scheduler(&driver, &dir);
            hooks.suite_start().unwrap();
            hooks.scenario_start("left open").unwrap();
            let outcome = hooks.suite_end().unwrap();
            assert_eq!(outcome.summary.failed, 1);
            assert_eq!(driver.live_handles(), (0, 0, 0));
        }
    }
}
