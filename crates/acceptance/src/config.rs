//! Run configuration and test data loading.
//!
//! Configuration is read once per run from
//! `<root>/test_data/environments/<environment>.json`. A missing or invalid
//! file never fails the run: the documented defaults are used instead and a
//! warning is logged.

use crate::result::{AcceptanceError, AcceptanceResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment used when neither an argument nor `TEST_ENV` selects one
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Environment variable consulted when no environment is given explicitly
pub const ENVIRONMENT_VAR: &str = "TEST_ENV";

/// Desktop user agent applied to new browser contexts
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Browser engine to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Chromium-like engine
    #[default]
    Chromium,
    /// Firefox-like engine
    Firefox,
    /// WebKit-like engine
    Webkit,
}

impl BrowserKind {
    /// Parse a browser name, falling back to Chromium for unknown names
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Self::Chromium,
            "firefox" => Self::Firefox,
            "webkit" => Self::Webkit,
            other => {
                warn!(browser = other, "unknown browser kind, using chromium");
                Self::Chromium
            }
        }
    }

    /// Lowercase engine name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BrowserKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Orchestration collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationSettings {
    /// Whether the run should try to reach the collaborator at all
    pub enabled: bool,
    /// Base URL of a remote collaborator; `None` uses the in-process loopback
    pub endpoint: Option<String>,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
        }
    }
}

/// Configuration for one run. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Environment name the config was loaded for
    pub environment: String,
    /// Site under test
    pub base_url: String,
    /// Timeout for individual driver operations, in milliseconds
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Extra attempts at session acquisition
    pub retry_count: u32,
    /// Run the browser without a window
    pub headless: bool,
    /// Browser engine
    #[serde(rename = "browser")]
    pub browser_kind: BrowserKind,
    /// Viewport for new contexts
    pub viewport: Viewport,
    /// Orchestration collaborator settings (`mcp` accepted as an alias)
    #[serde(alias = "mcp")]
    pub orchestration: OrchestrationSettings,
    /// Upper bound for one bridged step, in milliseconds
    #[serde(rename = "step_timeout")]
    pub step_timeout_ms: u64,
    /// User agent for new contexts
    pub user_agent: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            base_url: "https://www.google.com".to_string(),
            timeout_ms: 30_000,
            retry_count: 2,
            headless: true,
            browser_kind: BrowserKind::Chromium,
            viewport: Viewport::default(),
            orchestration: OrchestrationSettings::default(),
            step_timeout_ms: 60_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RunConfig {
    /// Override headless mode (CLI headed/headless switch)
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Override the orchestration switch
    #[must_use]
    pub const fn with_orchestration(mut self, enabled: bool) -> Self {
        self.orchestration.enabled = enabled;
        self
    }

    /// Override the site under test
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Whether the orchestration collaborator should be contacted
    #[must_use]
    pub const fn orchestration_enabled(&self) -> bool {
        self.orchestration.enabled
    }

    /// Driver operation timeout
    #[must_use]
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Step timeout
    #[must_use]
    pub const fn step_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.step_timeout_ms)
    }

    /// Check the numeric invariants of a loaded configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.step_timeout_ms == 0 {
            return Err("step_timeout must be greater than zero".to_string());
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            ));
        }
        Ok(())
    }
}

/// Pick the environment: explicit argument, then `TEST_ENV`, then `dev`
#[must_use]
pub fn resolve_environment(explicit: Option<&str>) -> String {
    resolve_environment_from(explicit, std::env::var(ENVIRONMENT_VAR).ok())
}

fn resolve_environment_from(explicit: Option<&str>, from_env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(from_env)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Loads [`RunConfig`] and [`TestData`] from a project root
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at the project directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the per-environment JSON files
    #[must_use]
    pub fn environments_dir(&self) -> PathBuf {
        self.root.join("test_data").join("environments")
    }

    /// Path of the configuration file for an environment
    #[must_use]
    pub fn environment_file(&self, environment: &str) -> PathBuf {
        self.environments_dir().join(format!("{environment}.json"))
    }

    /// Load the configuration for an environment, falling back to defaults
    #[must_use]
    pub fn load(&self, environment: Option<&str>) -> RunConfig {
        let environment = resolve_environment(environment);
        let mut config = match self.try_load(&environment) {
            Ok(Some(config)) => {
                info!(environment = %environment, "loaded configuration");
                config
            }
            Ok(None) => {
                warn!(
                    path = %self.environment_file(&environment).display(),
                    "config file not found, using defaults"
                );
                RunConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "using default configuration");
                RunConfig::default()
            }
        };
        config.environment = environment;
        config
    }

    /// Read and validate the configuration file; `Ok(None)` when absent
    pub fn try_load(&self, environment: &str) -> AcceptanceResult<Option<RunConfig>> {
        let path = self.environment_file(environment);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| AcceptanceError::ConfigLoad {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config: RunConfig =
            serde_json::from_str(&raw).map_err(|e| AcceptanceError::ConfigLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
        config
            .validate()
            .map_err(|message| AcceptanceError::ConfigLoad { path, message })?;
        Ok(Some(config))
    }

    /// Load the shared test data file
    #[must_use]
    pub fn load_test_data(&self) -> TestData {
        TestData::load(&self.root.join("test_data").join("test_data.json"))
    }
}

/// Free-form test data with dot-notation lookup
#[derive(Debug, Clone, Default)]
pub struct TestData {
    data: Value,
}

impl TestData {
    /// Wrap an already parsed JSON document
    #[must_use]
    pub const fn from_value(data: Value) -> Self {
        Self { data }
    }

    /// Load a JSON file; missing or invalid files yield empty data
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                warn!(path = %path.display(), "test data file not found");
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(data) => {
                info!("test data loaded");
                Self { data }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid test data file");
                Self::default()
            }
        }
    }

    /// Look up a value by dotted key, e.g. `search_keywords.ai`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.data, |node, part| node.as_object()?.get(part))
            .filter(|v| !v.is_null())
    }

    /// Search keyword by name, or the name itself
    #[must_use]
    pub fn search_keyword(&self, name: &str) -> String {
        self.get(&format!("search_keywords.{name}"))
            .and_then(Value::as_str)
            .map_or_else(|| name.to_string(), str::to_string)
    }

    /// Validation criteria block
    #[must_use]
    pub fn validation_criteria(&self) -> Map<String, Value> {
        self.get("validation_criteria")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Named URL
    #[must_use]
    pub fn url(&self, name: &str) -> Option<String> {
        self.get(&format!("urls.{name}"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Named timeout in milliseconds (default 30000)
    #[must_use]
    pub fn timeout(&self, kind: &str) -> u64 {
        self.get(&format!("timeouts.{kind}"))
            .and_then(Value::as_u64)
            .unwrap_or(30_000)
    }
}
