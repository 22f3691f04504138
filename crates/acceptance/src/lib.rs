//! Acceptance: browser acceptance-test harness.
//!
//! Drives scenarios against a browser backend, records screenshot evidence
//! for every step and writes HTML and JSON run reports. A remote
//! orchestration collaborator may supply test data and receive results;
//! when it is unreachable the run continues on local defaults.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌────────────────┐   ┌──────────┐
//! │ FeatureRunner│──►│ HookScheduler │──►│ SessionManager │──►│  Driver  │
//! │ (scenarios)  │   │ (lifecycle)   │   │ (handles)      │   │ (mock/cdp)│
//! └──────────────┘   └───────┬───────┘   └───────┬────────┘   └──────────┘
//!                            │                   │
//!                  ┌─────────▼──────┐   ┌────────▼────────────┐
//!                  │ EvidenceStore  │   │ OrchestrationClient │
//!                  └─────────┬──────┘   └────────┬────────────┘
//!                            └────────┬──────────┘
//!                            ┌────────▼──────────┐
//!                            │ ReportSynthesizer │
//!                            └───────────────────┘
//! ```
//!
//! Hooks are synchronous; browser and orchestration calls cross into async
//! code through [`AsyncBridge`].

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod bridge;
#[cfg(feature = "browser")]
mod cdp;
mod config;
mod driver;
mod evidence;
mod harness;
mod hooks;
#[allow(clippy::missing_errors_doc)]
mod orchestration;
mod page_object;
mod reporter;
mod result;
#[allow(clippy::missing_errors_doc)]
mod session;
#[allow(clippy::missing_errors_doc)]
mod steps;

pub use bridge::AsyncBridge;
#[cfg(feature = "browser")]
pub use cdp::CdpDriver;
pub use config::{
    resolve_environment, BrowserKind, ConfigLoader, OrchestrationSettings, RunConfig, TestData,
    Viewport, DEFAULT_ENVIRONMENT, DEFAULT_USER_AGENT, ENVIRONMENT_VAR,
};
pub use driver::{
    Browser, BrowserContext, Driver, LaunchOptions, MockDriver, MockOp, Page, WaitPolicy,
};
pub use evidence::{
    escape_html, gallery_html, sanitize, CaptureTag, EvidenceFilter, EvidenceStore,
    ScreenshotRecord, FAILURE_STEP, SCREENSHOTS_DIR,
};
pub use harness::{
    Feature, FeatureRunner, RunListener, RunReport, Scenario, ScenarioStep, SilentListener,
    StepAction, StepContext, StepKind,
};
pub use hooks::{HookPhase, HookScheduler, SuiteOutcome, DEFAULT_TITLE};
#[cfg(feature = "remote")]
pub use orchestration::HttpTransport;
pub use orchestration::{
    default_data, LoopbackTransport, OfflineTransport, OrchestrationClient,
    OrchestrationStatus, OrchestrationTransport, ReportOutcome, TOOL_DYNAMIC_DATA, TOOL_REPORT,
    TOOL_START, TOOL_STOP,
};
pub use page_object::{is_search_url, PageObject, SearchPage};
pub use reporter::{evidence_for, ReportSynthesizer, RunSummary, TestResult, TestStatus};
pub use result::{AcceptanceError, AcceptanceResult};
pub use session::{Session, SessionManager, SessionParts};
pub use steps::{
    orchestrated_search_feature, search_feature, title_contains, NavigateStep, SearchStep, TitleContainsStep,
    VerifyResultsStep, BASIC_SEARCH, VERIFY_RESULTS, VERIFY_TITLE,
};
