//! Browser driver contract.
//!
//! The harness never talks to a browser directly. It goes through the
//! [`Driver`] → [`Browser`] → [`BrowserContext`] → [`Page`] chain so the
//! backend can be swapped: the CDP driver in [`crate::cdp`] for real runs,
//! [`MockDriver`] for unit tests and dry runs.
//!
//! Every method takes `&mut self`: a page supports one in-flight operation
//! at a time and the type system enforces it.

use crate::config::{BrowserKind, RunConfig, Viewport};
use crate::result::{AcceptanceError, AcceptanceResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// The `load` event fired
    Load,
    /// The `DOMContentLoaded` event fired
    DomContentLoaded,
    /// No network activity for a short period
    #[default]
    NetworkIdle,
}

/// Options passed to [`Driver::launch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Browser engine
    pub kind: BrowserKind,
    /// Run without a window
    pub headless: bool,
    /// Extra command-line arguments
    pub args: Vec<String>,
    /// Initial window size
    pub viewport: Viewport,
}

impl LaunchOptions {
    /// Derive launch options from the run configuration.
    ///
    /// Headless launches add the flags needed inside containers.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        let args = if config.headless {
            vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ]
        } else {
            Vec::new()
        };
        Self {
            kind: config.browser_kind,
            headless: config.headless,
            args,
            viewport: config.viewport,
        }
    }
}

/// Entry point of a browser automation backend
#[async_trait]
pub trait Driver: Send {
    /// Start the backend (spawn the driver process, open the transport)
    async fn start(&mut self) -> AcceptanceResult<()>;

    /// Launch a browser
    async fn launch(&mut self, options: &LaunchOptions) -> AcceptanceResult<Box<dyn Browser>>;

    /// Stop the backend
    async fn stop(&mut self) -> AcceptanceResult<()>;

    /// Backend name for logs
    fn name(&self) -> &str {
        "driver"
    }
}

/// A launched browser
#[async_trait]
pub trait Browser: Send {
    /// Open an isolated context
    async fn new_context(
        &mut self,
        viewport: Viewport,
        user_agent: &str,
    ) -> AcceptanceResult<Box<dyn BrowserContext>>;

    /// Close the browser
    async fn close(&mut self) -> AcceptanceResult<()>;
}

/// An isolated browsing context (cookies, storage)
#[async_trait]
pub trait BrowserContext: Send {
    /// Open a page in this context
    async fn new_page(&mut self) -> AcceptanceResult<Box<dyn Page>>;

    /// Close the context
    async fn close(&mut self) -> AcceptanceResult<()>;
}

/// A single page
#[async_trait]
pub trait Page: Send {
    /// Navigate to a URL
    async fn goto(&mut self, url: &str, wait: WaitPolicy, timeout: Duration)
        -> AcceptanceResult<()>;

    /// Write a PNG screenshot to `path`
    async fn screenshot(&mut self, path: &Path, full_page: bool) -> AcceptanceResult<()>;

    /// Document title
    async fn title(&mut self) -> AcceptanceResult<String>;

    /// Current URL
    async fn url(&mut self) -> AcceptanceResult<String>;

    /// Replace the value of the first element matching `selector`
    async fn fill(&mut self, selector: &str, text: &str) -> AcceptanceResult<()>;

    /// Press a key on the first element matching `selector`
    async fn press(&mut self, selector: &str, key: &str) -> AcceptanceResult<()>;

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> AcceptanceResult<()>;

    /// Number of elements matching `selector`
    async fn count(&mut self, selector: &str) -> AcceptanceResult<usize>;

    /// Text content of the first element matching `selector`
    async fn text_content(&mut self, selector: &str) -> AcceptanceResult<Option<String>>;

    /// Wait until `selector` matches at least one element
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
        -> AcceptanceResult<()>;

    /// Close the page
    async fn close(&mut self) -> AcceptanceResult<()>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// Operations of [`MockDriver`] that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `Driver::start`
    Start,
    /// `Driver::launch`
    Launch,
    /// `Driver::stop`
    Stop,
    /// `Browser::new_context`
    NewContext,
    /// `Browser::close`
    CloseBrowser,
    /// `BrowserContext::new_page`
    NewPage,
    /// `BrowserContext::close`
    CloseContext,
    /// `Page::goto`
    Goto,
    /// `Page::screenshot`
    Screenshot,
    /// `Page::fill`
    Fill,
    /// `Page::close`
    ClosePage,
}

/// Minimal PNG signature written by mock screenshots
const MOCK_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    failures: HashSet<MockOp>,
    running: bool,
    live_browsers: usize,
    live_contexts: usize,
    live_pages: usize,
    result_count: usize,
    page_title: String,
}

/// In-memory driver that records every call.
///
/// Clones share state, so a test can keep one clone for inspection after
/// handing another to the session manager.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create a mock driver whose searches yield three results
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                result_count: 3,
                page_title: "Mock Page".to_string(),
                ..MockState::default()
            })),
        }
    }

    /// Make an operation fail until [`MockDriver::recover`] is called
    #[must_use]
    pub fn failing_on(self, op: MockOp) -> Self {
        self.lock().failures.insert(op);
        self
    }

    /// Stop failing an operation
    pub fn recover(&self, op: MockOp) {
        self.lock().failures.remove(&op);
    }

    /// Number of results reported after a search
    #[must_use]
    pub fn with_result_count(self, count: usize) -> Self {
        self.lock().result_count = count;
        self
    }

    /// Title reported before any search
    #[must_use]
    pub fn with_page_title(self, title: impl Into<String>) -> Self {
        self.lock().page_title = title.into();
        self
    }

    /// Recorded calls, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether any recorded call starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Whether the driver is started
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Open browsers, contexts and pages
    #[must_use]
    pub fn live_handles(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (state.live_browsers, state.live_contexts, state.live_pages)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record a call and fail it if injected
fn record(state: &Mutex<MockState>, op: Option<MockOp>, call: String) -> AcceptanceResult<()> {
    let mut state = lock(state);
    let failing = op.is_some_and(|op| state.failures.contains(&op));
    state.calls.push(call.clone());
    if failing {
        return Err(AcceptanceError::page(format!("injected failure: {call}")));
    }
    Ok(())
}

#[async_trait]
impl Driver for MockDriver {
    async fn start(&mut self) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::Start), "start".to_string())?;
        self.lock().running = true;
        Ok(())
    }

    async fn launch(&mut self, options: &LaunchOptions) -> AcceptanceResult<Box<dyn Browser>> {
        record(
            &self.state,
            Some(MockOp::Launch),
            format!("launch:{}:headless={}", options.kind, options.headless),
        )
        .map_err(|e| AcceptanceError::session_init(e.to_string()))?;
        self.lock().live_browsers += 1;
        Ok(Box::new(MockBrowser {
            state: Arc::clone(&self.state),
        }))
    }

    async fn stop(&mut self) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::Stop), "stop".to_string())?;
        self.lock().running = false;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug)]
struct MockBrowser {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_context(
        &mut self,
        viewport: Viewport,
        _user_agent: &str,
    ) -> AcceptanceResult<Box<dyn BrowserContext>> {
        record(
            &self.state,
            Some(MockOp::NewContext),
            format!("new_context:{}x{}", viewport.width, viewport.height),
        )?;
        lock(&self.state).live_contexts += 1;
        Ok(Box::new(MockContext {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::CloseBrowser), "close_browser".to_string())?;
        let mut state = lock(&self.state);
        state.live_browsers = state.live_browsers.saturating_sub(1);
        Ok(())
    }
}

#[derive(Debug)]
struct MockContext {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl BrowserContext for MockContext {
    async fn new_page(&mut self) -> AcceptanceResult<Box<dyn Page>> {
        record(&self.state, Some(MockOp::NewPage), "new_page".to_string())?;
        lock(&self.state).live_pages += 1;
        Ok(Box::new(MockPage {
            state: Arc::clone(&self.state),
            url: "about:blank".to_string(),
            typed: String::new(),
            searched: None,
        }))
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::CloseContext), "close_context".to_string())?;
        let mut state = lock(&self.state);
        state.live_contexts = state.live_contexts.saturating_sub(1);
        Ok(())
    }
}

/// Page that simulates a search site: typing then pressing Enter
/// navigates to `<url>/search?q=<text>`.
#[derive(Debug)]
struct MockPage {
    state: Arc<Mutex<MockState>>,
    url: String,
    typed: String,
    searched: Option<String>,
}

#[async_trait]
impl Page for MockPage {
    async fn goto(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: Duration,
    ) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::Goto), format!("goto:{url}")).map_err(|e| {
            AcceptanceError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;
        self.url = url.to_string();
        self.searched = None;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> AcceptanceResult<()> {
        record(
            &self.state,
            Some(MockOp::Screenshot),
            format!("screenshot:{}", path.display()),
        )?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, MOCK_PNG)?;
        Ok(())
    }

    async fn title(&mut self) -> AcceptanceResult<String> {
        record(&self.state, None, "title".to_string())?;
        Ok(match &self.searched {
            Some(query) => format!("{query} - Mock Search"),
            None => lock(&self.state).page_title.clone(),
        })
    }

    async fn url(&mut self) -> AcceptanceResult<String> {
        Ok(self.url.clone())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::Fill), format!("fill:{selector}:{text}"))?;
        self.typed = text.to_string();
        Ok(())
    }

    async fn press(&mut self, selector: &str, key: &str) -> AcceptanceResult<()> {
        record(&self.state, None, format!("press:{selector}:{key}"))?;
        if key == "Enter" && !self.typed.is_empty() {
            let query = std::mem::take(&mut self.typed);
            self.url = format!(
                "{}/search?q={}",
                self.url.trim_end_matches('/'),
                query.replace(' ', "+")
            );
            self.searched = Some(query);
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> AcceptanceResult<()> {
        record(&self.state, None, format!("click:{selector}"))
    }

    async fn count(&mut self, selector: &str) -> AcceptanceResult<usize> {
        record(&self.state, None, format!("count:{selector}"))?;
        if self.searched.is_some() {
            Ok(lock(&self.state).result_count)
        } else {
            Ok(0)
        }
    }

    async fn text_content(&mut self, selector: &str) -> AcceptanceResult<Option<String>> {
        record(&self.state, None, format!("text_content:{selector}"))?;
        Ok(self.searched.clone())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> AcceptanceResult<()> {
        record(&self.state, None, format!("wait_for_selector:{selector}"))?;
        if selector.contains("#search") && self.searched.is_none() {
            return Err(AcceptanceError::Timeout {
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        record(&self.state, Some(MockOp::ClosePage), "close_page".to_string())?;
        let mut state = lock(&self.state);
        state.live_pages = state.live_pages.saturating_sub(1);
        Ok(())
    }
}
