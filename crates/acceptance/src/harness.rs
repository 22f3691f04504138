//! Scenario model and the runner that drives it through the hooks.

use crate::config::RunConfig;
use crate::driver::Page;
use crate::hooks::HookScheduler;
use crate::orchestration::OrchestrationClient;
use crate::reporter::{RunSummary, TestStatus};
use crate::result::{AcceptanceError, AcceptanceResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Gherkin keyword of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Precondition
    Given,
    /// Action
    When,
    /// Expected outcome
    Then,
    /// Continues the previous kind
    And,
    /// Negative continuation
    But,
}

impl StepKind {
    /// Keyword as written in feature files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
            Self::But => "But",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step sees while it runs
pub struct StepContext<'a> {
    /// Page of the live session
    pub page: &'a mut (dyn Page + 'static),
    /// Run configuration
    pub config: &'a RunConfig,
    /// Orchestration client
    pub orchestration: &'a mut OrchestrationClient,
    /// Variables shared by the steps of one scenario
    pub vars: &'a mut HashMap<String, String>,
    /// Scenario name
    pub scenario: &'a str,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("scenario", &self.scenario)
            .field("vars", &self.vars)
            .finish_non_exhaustive()
    }
}

/// Behavior behind a step
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Run the step; any error fails the scenario
    async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()>;
}

/// One step of a scenario
#[derive(Clone)]
pub struct ScenarioStep {
    /// Keyword
    pub kind: StepKind,
    /// Step text
    pub text: String,
    /// Behavior
    pub action: Arc<dyn StepAction>,
}

impl fmt::Debug for ScenarioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScenarioStep({} {})", self.kind, self.text)
    }
}

impl ScenarioStep {
    /// Create a step
    #[must_use]
    pub fn new(kind: StepKind, text: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self {
            kind,
            text: text.into(),
            action: Arc::new(action),
        }
    }
}

/// One end-to-end test case
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Ordered steps
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(
        mut self,
        kind: StepKind,
        text: impl Into<String>,
        action: impl StepAction + 'static,
    ) -> Self {
        self.steps.push(ScenarioStep::new(kind, text, action));
        self
    }
}

/// A named group of scenarios
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature name
    pub name: String,
    /// Scenarios, run in order
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    /// Create an empty feature
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario
    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Number of scenarios
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.scenarios.len()
    }
}

/// Progress callbacks; every method defaults to doing nothing
pub trait RunListener {
    /// A scenario is about to start
    fn scenario_started(&mut self, _name: &str) {}

    /// A step finished; `error` is set when it failed
    fn step_finished(&mut self, _step: &ScenarioStep, _error: Option<&AcceptanceError>) {}

    /// A scenario finished
    fn scenario_finished(&mut self, _name: &str, _status: TestStatus) {}
}

/// Listener that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentListener;

impl RunListener for SilentListener {}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Summary over every reported result
    pub summary: RunSummary,
    /// Report files written
    pub artifacts: Vec<PathBuf>,
    /// Names of scenarios that ended failed
    pub failed_scenarios: Vec<String>,
    /// Report writing errors
    pub report_errors: Vec<String>,
    /// Why the run stopped early, if it did
    pub aborted: Option<String>,
}

impl RunReport {
    /// Whether every scenario passed or was skipped and reports were written
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Process exit code: 1 when a scenario failed, 2 when only report
    /// writing failed, 0 otherwise
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if !self.failed_scenarios.is_empty() || self.aborted.is_some() {
            1
        } else if !self.report_errors.is_empty() {
            2
        } else {
            0
        }
    }
}

/// Drives a [`HookScheduler`] through a feature
pub struct FeatureRunner {
    hooks: HookScheduler,
    listener: Box<dyn RunListener>,
}

impl fmt::Debug for FeatureRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureRunner")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl FeatureRunner {
    /// Create a runner
    #[must_use]
    pub fn new(hooks: HookScheduler) -> Self {
        Self {
            hooks,
            listener: Box::new(SilentListener),
        }
    }

    /// Receive progress callbacks
    #[must_use]
    pub fn with_listener(mut self, listener: impl RunListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Hook scheduler
    #[must_use]
    pub const fn hooks(&self) -> &HookScheduler {
        &self.hooks
    }

    /// Run every scenario of `feature`.
    ///
    /// A failing step fails its scenario and skips the remaining steps. A
    /// browser that cannot be started fails the scenario and skips the
    /// rest. Reports are written in every case.
    pub fn run(&mut self, feature: &Feature) -> AcceptanceResult<RunReport> {
        tracing::info!(feature = %feature.name, scenarios = feature.scenario_count(), "running feature");
        self.hooks.suite_start()?;

        let mut failed_scenarios = Vec::new();
        let mut aborted: Option<String> = None;

        for scenario in &feature.scenarios {
            if let Some(reason) = &aborted {
                self.hooks.scenario_skipped(&scenario.name, reason)?;
                self.listener
                    .scenario_finished(&scenario.name, TestStatus::Skipped);
                continue;
            }

            self.listener.scenario_started(&scenario.name);
            if let Err(e) = self.hooks.scenario_start(&scenario.name) {
                if !e.is_fatal_to_run() {
                    return Err(e);
                }
                tracing::error!(scenario = %scenario.name, error = %e, "run aborted");
                self.hooks.scenario_aborted(&scenario.name, &e)?;
                failed_scenarios.push(scenario.name.clone());
                self.listener
                    .scenario_finished(&scenario.name, TestStatus::Failed);
                aborted = Some(e.to_string());
                continue;
            }

            let mut failure = None;
            for step in &scenario.steps {
                let outcome = self.hooks.run_step(step);
                let status = if outcome.is_ok() {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                };
                self.hooks.step_end(step, status)?;
                self.listener.step_finished(step, outcome.as_ref().err());
                if let Err(e) = outcome {
                    failure = Some(e.to_string());
                    break;
                }
            }

            let status = self.hooks.scenario_end(failure.as_deref())?;
            if status.is_failed() {
                failed_scenarios.push(scenario.name.clone());
            }
            self.listener.scenario_finished(&scenario.name, status);
        }

        let outcome = self.hooks.suite_end()?;
        Ok(RunReport {
            summary: outcome.summary,
            artifacts: outcome.artifacts,
            failed_scenarios,
            report_errors: outcome.report_errors.iter().map(ToString::to_string).collect(),
            aborted,
        })
    }
}
