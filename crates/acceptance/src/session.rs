//! SessionManager - scoped ownership of browser handles for one run.
//!
//! ```text
//! acquire():  driver.start → launch → new_context → new_page → orchestration.connect
//! release():  page.close   → context.close → browser.close → driver.stop → orchestration.disconnect
//! ```
//!
//! Every teardown step runs whatever happened to the previous one. A failing
//! step is logged and swallowed; `release` never fails. Partially built
//! sessions are rolled back inside `acquire`.

use crate::bridge::AsyncBridge;
use crate::config::RunConfig;
use crate::driver::{Browser, BrowserContext, Driver, LaunchOptions, Page};
use crate::evidence::EvidenceStore;
use crate::orchestration::OrchestrationClient;
use crate::result::{AcceptanceError, AcceptanceResult};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Live browser session
pub struct Session {
    id: Uuid,
    config: Arc<RunConfig>,
    browser: Option<Box<dyn Browser>>,
    context: Option<Box<dyn BrowserContext>>,
    page: Option<Box<dyn Page>>,
    orchestration_attached: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("has_browser", &self.browser.is_some())
            .field("has_context", &self.context.is_some())
            .field("has_page", &self.page.is_some())
            .field("orchestration_attached", &self.orchestration_attached)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Page handle, if the session still holds one
    pub fn page_mut(&mut self) -> Option<&mut (dyn Page + 'static)> {
        self.page.as_deref_mut()
    }

    /// Whether the session holds a page
    #[must_use]
    pub fn has_page(&self) -> bool {
        self.page.is_some()
    }

    /// Whether the orchestration client connected for this session
    #[must_use]
    pub const fn orchestration_attached(&self) -> bool {
        self.orchestration_attached
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.page.is_some() || self.context.is_some() || self.browser.is_some() {
            tracing::error!(session = %self.id, "session dropped without release, browser handles leaked");
        }
    }
}

/// Borrowed view of the manager's collaborators for step execution
#[derive(Debug)]
pub struct SessionParts<'a> {
    /// Run configuration
    pub config: &'a RunConfig,
    /// Orchestration client
    pub orchestration: &'a mut OrchestrationClient,
    /// Evidence store
    pub evidence: &'a mut EvidenceStore,
    /// Async bridge
    pub bridge: &'a AsyncBridge,
}

/// Owns configuration, driver, orchestration client and evidence for a run
pub struct SessionManager {
    config: Arc<RunConfig>,
    driver: Box<dyn Driver>,
    orchestration: OrchestrationClient,
    evidence: EvidenceStore,
    bridge: AsyncBridge,
    live: usize,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("driver", &self.driver.name())
            .field("orchestration", &self.orchestration)
            .field("evidence", &self.evidence.len())
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager; nothing is started until [`SessionManager::acquire`]
    #[must_use]
    pub fn new(
        config: RunConfig,
        driver: Box<dyn Driver>,
        orchestration: OrchestrationClient,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        let bridge = AsyncBridge::new(config.timeout());
        Self {
            config: Arc::new(config),
            driver,
            orchestration,
            evidence: EvidenceStore::new(reports_dir),
            bridge,
            live: 0,
        }
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Orchestration client
    #[must_use]
    pub const fn orchestration(&self) -> &OrchestrationClient {
        &self.orchestration
    }

    /// Evidence store
    #[must_use]
    pub const fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    /// Async bridge
    #[must_use]
    pub const fn bridge(&self) -> &AsyncBridge {
        &self.bridge
    }

    /// Number of sessions acquired and not yet released
    #[must_use]
    pub const fn live_sessions(&self) -> usize {
        self.live
    }

    /// Split borrow of the collaborators
    pub fn parts(&mut self) -> SessionParts<'_> {
        SessionParts {
            config: &self.config,
            orchestration: &mut self.orchestration,
            evidence: &mut self.evidence,
            bridge: &self.bridge,
        }
    }

    /// Start the driver and open a browser, context and page.
    ///
    /// Fails with [`AcceptanceError::SessionInit`] when the browser cannot be
    /// started. Not retried here. Connecting the orchestration client is
    /// best-effort.
    pub fn acquire(&mut self) -> AcceptanceResult<Session> {
        if self.live > 0 {
            return Err(AcceptanceError::invalid_state(
                "a session is already live; release it before acquiring another",
            ));
        }
        let options = LaunchOptions::from_config(&self.config);
        let (browser, context, page) = self
            .bridge
            .run(open_handles(self.driver.as_mut(), &options, &self.config))
            .map_err(|e| match e {
                AcceptanceError::SessionInit { .. } => e,
                other => AcceptanceError::session_init(other.to_string()),
            })?;
        self.live += 1;

        let orchestration = &mut self.orchestration;
        let orchestration_attached = self
            .bridge
            .run(async { Ok(orchestration.connect().await) })
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "orchestration connect did not complete");
                false
            });

        let session = Session {
            id: Uuid::new_v4(),
            config: Arc::clone(&self.config),
            browser: Some(browser),
            context: Some(context),
            page: Some(page),
            orchestration_attached,
        };
        tracing::info!(
            session = %session.id,
            driver = self.driver.name(),
            browser = %options.kind,
            headless = options.headless,
            "session acquired"
        );
        Ok(session)
    }

    /// Tear a session down. Never fails.
    pub fn release(&mut self, mut session: Session) {
        let id = session.id;
        if let Some(mut page) = session.page.take() {
            teardown(&self.bridge, id, "close page", page.close());
        }
        if let Some(mut context) = session.context.take() {
            teardown(&self.bridge, id, "close context", context.close());
        }
        if let Some(mut browser) = session.browser.take() {
            teardown(&self.bridge, id, "close browser", browser.close());
        }
        teardown(&self.bridge, id, "stop driver", self.driver.stop());
        if session.orchestration_attached || self.orchestration.is_connected() {
            let orchestration = &mut self.orchestration;
            if let Err(e) = self.bridge.run(async {
                orchestration.disconnect().await;
                Ok(())
            }) {
                tracing::warn!(session = %id, error = %e, "orchestration disconnect failed");
            }
        }
        self.live = self.live.saturating_sub(1);
        tracing::info!(session = %id, "session released");
    }
}

/// Run one teardown step; failures are logged
fn teardown<F>(bridge: &AsyncBridge, id: Uuid, step: &str, op: F)
where
    F: std::future::Future<Output = AcceptanceResult<()>>,
{
    if let Err(e) = bridge.run(op) {
        tracing::warn!(session = %id, step, error = %e, "teardown step failed");
    }
}

type Handles = (Box<dyn Browser>, Box<dyn BrowserContext>, Box<dyn Page>);

/// Open browser, context and page, closing what was opened on failure
async fn open_handles(
    driver: &mut dyn Driver,
    options: &LaunchOptions,
    config: &RunConfig,
) -> AcceptanceResult<Handles> {
    driver
        .start()
        .await
        .map_err(|e| AcceptanceError::session_init(format!("driver start: {e}")))?;

    let mut browser = match driver.launch(options).await {
        Ok(browser) => browser,
        Err(e) => {
            rollback("stop driver", driver.stop().await);
            return Err(e);
        }
    };
    let mut context = match browser.new_context(config.viewport, &config.user_agent).await {
        Ok(context) => context,
        Err(e) => {
            rollback("close browser", browser.close().await);
            rollback("stop driver", driver.stop().await);
            return Err(e);
        }
    };
    match context.new_page().await {
        Ok(page) => Ok((browser, context, page)),
        Err(e) => {
            rollback("close context", context.close().await);
            rollback("close browser", browser.close().await);
            rollback("stop driver", driver.stop().await);
            Err(e)
        }
    }
}

fn rollback(step: &str, result: AcceptanceResult<()>) {
    if let Err(e) = result {
        tracing::warn!(step, error = %e, "rollback step failed");
    }
}
