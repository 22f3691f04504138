//! OrchestrationClient - optional remote test-orchestration collaborator.
//!
//! The collaborator can coordinate runs and supply dynamic test data, but a
//! run never depends on it. Every operation has a local fallback:
//!
//! | Operation              | Connected                 | Degraded                  |
//! |------------------------|---------------------------|---------------------------|
//! | `start_orchestration`  | remote call → `started`   | `skipped`                 |
//! | `stop_orchestration`   | remote call → `stopped`   | `skipped`                 |
//! | `fetch_dynamic_data`   | remote data               | local default             |
//! | `report_result`        | append + remote delivery  | append (`logged_locally`) |
//!
//! The result sequence kept here is the single source for the run report.

use crate::config::RunConfig;
use crate::reporter::{TestResult, TestStatus};
use crate::result::{AcceptanceError, AcceptanceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Tool started at scenario start
pub const TOOL_START: &str = "start_test_orchestration";
/// Tool stopped at scenario end
pub const TOOL_STOP: &str = "stop_test_orchestration";
/// Tool returning dynamic test data
pub const TOOL_DYNAMIC_DATA: &str = "get_dynamic_test_data";
/// Tool receiving test results
pub const TOOL_REPORT: &str = "report_test_result";

/// Outcome of starting or stopping orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    /// Orchestration started
    Started,
    /// Orchestration stopped
    Stopped,
    /// Not connected, nothing done
    Skipped,
    /// Remote call failed
    Error,
}

/// Outcome of reporting a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Delivered to the collaborator
    Reported,
    /// Kept locally only
    LoggedLocally,
    /// Kept locally, remote delivery failed
    Error,
}

/// Wire transport to the collaborator
#[async_trait]
pub trait OrchestrationTransport: Send {
    /// Open the connection
    async fn connect(&mut self) -> AcceptanceResult<()>;

    /// Close the connection
    async fn disconnect(&mut self) -> AcceptanceResult<()>;

    /// Invoke a tool and return its JSON response
    async fn call_tool(&mut self, name: &str, args: Value) -> AcceptanceResult<Value>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// Local default for a dynamic-data kind
#[must_use]
pub fn default_data(kind: &str) -> Map<String, Value> {
    let mut data = Map::new();
    if kind == "search_keyword" {
        data.insert("keyword".to_string(), json!("AI"));
        data.insert("source".to_string(), json!("default"));
    }
    data
}

// ============================================================================
// Transports
// ============================================================================

/// In-process collaborator answering with fixed data.
///
/// Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    calls: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl LoopbackTransport {
    /// Create a loopback transport
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect normally but fail every tool call
    #[must_use]
    pub const fn failing_calls(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Tool names called so far
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OrchestrationTransport for LoopbackTransport {
    async fn connect(&mut self) -> AcceptanceResult<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> AcceptanceResult<()> {
        Ok(())
    }

    async fn call_tool(&mut self, name: &str, args: Value) -> AcceptanceResult<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        if self.failing {
            return Err(AcceptanceError::unavailable(format!("{name}: loopback failure")));
        }
        let response = match name {
            TOOL_START => json!({ "status": "started", "test_name": args["test_name"] }),
            TOOL_STOP => json!({ "status": "stopped", "test_name": args["test_name"] }),
            TOOL_REPORT => json!({ "status": "received" }),
            TOOL_DYNAMIC_DATA => match args["data_type"].as_str() {
                Some("search_keyword") => json!({ "keyword": "AI", "source": "orchestrator" }),
                Some("validation_criteria") => json!({
                    "min_results": 5,
                    "title_contains": "AI",
                    "source": "orchestrator",
                }),
                _ => json!({}),
            },
            other => {
                return Err(AcceptanceError::unavailable(format!("unknown tool: {other}")));
            }
        };
        Ok(response)
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

/// Transport for a collaborator that is never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl OrchestrationTransport for OfflineTransport {
    async fn connect(&mut self) -> AcceptanceResult<()> {
        Err(AcceptanceError::unavailable("no orchestration collaborator configured"))
    }

    async fn disconnect(&mut self) -> AcceptanceResult<()> {
        Ok(())
    }

    async fn call_tool(&mut self, name: &str, _args: Value) -> AcceptanceResult<Value> {
        Err(AcceptanceError::unavailable(format!("{name}: offline")))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// HTTP transport: `GET <endpoint>/health`, `POST <endpoint>/tools/<name>`
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "remote")]
impl HttpTransport {
    /// Create a transport for `endpoint`
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl OrchestrationTransport for HttpTransport {
    async fn connect(&mut self) -> AcceptanceResult<()> {
        self.client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AcceptanceError::unavailable(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&mut self) -> AcceptanceResult<()> {
        Ok(())
    }

    async fn call_tool(&mut self, name: &str, args: Value) -> AcceptanceResult<Value> {
        let response = self
            .client
            .post(format!("{}/tools/{name}", self.endpoint))
            .json(&args)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AcceptanceError::unavailable(e.to_string()))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| AcceptanceError::unavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the orchestration collaborator
pub struct OrchestrationClient {
    transport: Box<dyn OrchestrationTransport>,
    enabled: bool,
    connected: bool,
    results: Vec<TestResult>,
}

impl fmt::Debug for OrchestrationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationClient")
            .field("transport", &self.transport.name())
            .field("enabled", &self.enabled)
            .field("connected", &self.connected)
            .field("results", &self.results.len())
            .finish()
    }
}

impl OrchestrationClient {
    /// Create a client over `transport`
    #[must_use]
    pub fn new(transport: Box<dyn OrchestrationTransport>, enabled: bool) -> Self {
        Self {
            transport,
            enabled,
            connected: false,
            results: Vec::new(),
        }
    }

    /// Pick the transport the configuration asks for.
    ///
    /// An endpoint selects the HTTP transport, otherwise the loopback
    /// collaborator is used.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        let transport: Box<dyn OrchestrationTransport> = match &config.orchestration.endpoint {
            #[cfg(feature = "remote")]
            Some(endpoint) => Box::new(HttpTransport::new(endpoint.clone())),
            #[cfg(not(feature = "remote"))]
            Some(endpoint) => {
                tracing::warn!(%endpoint, "remote transport not compiled in, collaborator offline");
                Box::new(OfflineTransport)
            }
            None => Box::new(LoopbackTransport::new()),
        };
        Self::new(transport, config.orchestration_enabled())
    }

    /// Client that never connects
    #[must_use]
    pub fn offline() -> Self {
        Self::new(Box::new(OfflineTransport), false)
    }

    /// Connect; returns whether the client is connected.
    ///
    /// Never fails: an unreachable collaborator puts the client in
    /// degraded mode.
    pub async fn connect(&mut self) -> bool {
        if !self.enabled {
            tracing::info!("orchestration disabled, running in local mode");
            self.connected = false;
            return false;
        }
        match self.transport.connect().await {
            Ok(()) => {
                tracing::info!(transport = self.transport.name(), "orchestration client connected");
                self.connected = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "orchestration connect failed, degraded mode");
                self.connected = false;
            }
        }
        self.connected
    }

    /// Disconnect; errors are logged
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(error = %e, "error disconnecting orchestration client");
        }
        self.connected = false;
        tracing::info!("orchestration client disconnected");
    }

    /// Whether the collaborator is reachable
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether orchestration is enabled in the configuration
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start orchestration for a scenario
    pub async fn start_orchestration(&mut self, name: &str) -> OrchestrationStatus {
        self.lifecycle_call(TOOL_START, name, OrchestrationStatus::Started)
            .await
    }

    /// Stop orchestration for a scenario
    pub async fn stop_orchestration(&mut self, name: &str) -> OrchestrationStatus {
        self.lifecycle_call(TOOL_STOP, name, OrchestrationStatus::Stopped)
            .await
    }

    async fn lifecycle_call(
        &mut self,
        tool: &str,
        name: &str,
        success: OrchestrationStatus,
    ) -> OrchestrationStatus {
        if !self.connected {
            tracing::debug!(tool, test_name = name, "not connected, orchestration skipped");
            return OrchestrationStatus::Skipped;
        }
        match self
            .transport
            .call_tool(tool, json!({ "test_name": name }))
            .await
        {
            Ok(_) => {
                tracing::info!(tool, test_name = name, "orchestration call succeeded");
                success
            }
            Err(e) => {
                tracing::error!(tool, test_name = name, error = %e, "orchestration call failed");
                OrchestrationStatus::Error
            }
        }
    }

    /// Fetch dynamic test data; local default when degraded or on failure
    pub async fn fetch_dynamic_data(&mut self, kind: &str) -> Map<String, Value> {
        if !self.connected {
            tracing::debug!(kind, "not connected, using default data");
            return default_data(kind);
        }
        match self
            .transport
            .call_tool(TOOL_DYNAMIC_DATA, json!({ "data_type": kind }))
            .await
        {
            Ok(Value::Object(data)) => {
                tracing::info!(kind, "dynamic data fetched");
                data
            }
            Ok(other) => {
                tracing::warn!(kind, response = %other, "unexpected dynamic data, using default");
                default_data(kind)
            }
            Err(e) => {
                tracing::error!(kind, error = %e, "dynamic data fetch failed, using default");
                default_data(kind)
            }
        }
    }

    /// Record a result and deliver it when connected.
    ///
    /// The result is appended locally whatever happens; duplicates for the
    /// same name are kept.
    pub async fn report_result(
        &mut self,
        name: &str,
        status: TestStatus,
        details: Map<String, Value>,
        screenshot_ref: Option<String>,
    ) -> ReportOutcome {
        let mut result = TestResult::new(name, status).with_details(details);
        result.screenshot_ref = screenshot_ref;
        self.record(result).await
    }

    /// Record a prepared result; see [`OrchestrationClient::report_result`]
    pub async fn record(&mut self, result: TestResult) -> ReportOutcome {
        let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
        let name = result.name.clone();
        let status = result.status;
        self.results.push(result);

        if !self.connected {
            tracing::info!(test_name = %name, %status, "test result logged locally");
            return ReportOutcome::LoggedLocally;
        }
        match self.transport.call_tool(TOOL_REPORT, payload).await {
            Ok(_) => {
                tracing::info!(test_name = %name, %status, "test result reported");
                ReportOutcome::Reported
            }
            Err(e) => {
                tracing::error!(test_name = %name, error = %e, "error reporting test result");
                ReportOutcome::Error
            }
        }
    }

    /// All results, in report order
    #[must_use]
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }
}
