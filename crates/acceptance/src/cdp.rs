//! Chrome DevTools Protocol driver backed by chromiumoxide.
//!
//! Only Chromium can be driven over CDP; other engine kinds launch Chromium
//! with a warning. The CDP event handler runs as a task on the bridge
//! runtime and is polled whenever the bridge blocks on a call.

#![allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]

use crate::config::{BrowserKind, Viewport};
use crate::driver::{Browser, BrowserContext, Driver, LaunchOptions, Page, WaitPolicy};
use crate::result::{AcceptanceError, AcceptanceResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Quiet period that approximates network idle after a load
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

/// Selector polling interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Driver launching a local Chromium over CDP
#[derive(Debug, Default)]
pub struct CdpDriver {
    executable: Option<String>,
    started: bool,
}

impl CdpDriver {
    /// Create a driver using the Chromium found on the system
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Chromium executable
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn start(&mut self) -> AcceptanceResult<()> {
        self.started = true;
        Ok(())
    }

    async fn launch(&mut self, options: &LaunchOptions) -> AcceptanceResult<Box<dyn Browser>> {
        if !self.started {
            return Err(AcceptanceError::session_init("driver not started"));
        }
        if options.kind != BrowserKind::Chromium {
            tracing::warn!(browser = %options.kind, "only chromium is driven over CDP, launching chromium");
        }

        let mut builder =
            CdpConfig::builder().window_size(options.viewport.width, options.viewport.height);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.executable {
            builder = builder.chrome_executable(path);
        }
        builder = builder.args(options.args.clone());
        let config = builder.build().map_err(AcceptanceError::session_init)?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| AcceptanceError::session_init(e.to_string()))?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        tracing::info!(headless = options.headless, "chromium launched");

        Ok(Box::new(ChromiumBrowser {
            inner: Arc::new(Mutex::new(browser)),
            handle: Some(handle),
        }))
    }

    async fn stop(&mut self) -> AcceptanceResult<()> {
        self.started = false;
        Ok(())
    }

    fn name(&self) -> &str {
        "cdp"
    }
}

struct ChromiumBrowser {
    inner: Arc<Mutex<CdpBrowser>>,
    handle: Option<JoinHandle<()>>,
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_context(
        &mut self,
        viewport: Viewport,
        user_agent: &str,
    ) -> AcceptanceResult<Box<dyn BrowserContext>> {
        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.inner),
            viewport,
            user_agent: user_agent.to_string(),
        }))
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        let result = {
            let mut browser = self.inner.lock().await;
            match browser.close().await {
                Ok(_) => browser.wait().await.map(|_| ()).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            }
        };
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        result.map_err(AcceptanceError::page)
    }
}

/// Pages share the browser's default context; the context only carries the
/// viewport and user agent applied to each new page.
struct ChromiumContext {
    browser: Arc<Mutex<CdpBrowser>>,
    viewport: Viewport,
    user_agent: String,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn new_page(&mut self) -> AcceptanceResult<Box<dyn Page>> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await.map_err(page_error)?
        };
        page.set_user_agent(user_agent_override(&self.user_agent))
            .await
            .map_err(page_error)?;
        page.execute(device_metrics(self.viewport)?)
            .await
            .map_err(page_error)?;
        Ok(Box::new(ChromiumPage { inner: Some(page) }))
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        Ok(())
    }
}

struct ChromiumPage {
    inner: Option<CdpPage>,
}

impl ChromiumPage {
    fn page(&self) -> AcceptanceResult<&CdpPage> {
        self.inner
            .as_ref()
            .ok_or_else(|| AcceptanceError::page("page already closed"))
    }
}

fn page_error(e: impl std::fmt::Display) -> AcceptanceError {
    AcceptanceError::page(e.to_string())
}

fn user_agent_override(user_agent: &str) -> SetUserAgentOverrideParams {
    SetUserAgentOverrideParams::new(user_agent)
}

/// Emulated screen metrics for a desktop viewport
fn device_metrics(viewport: Viewport) -> AcceptanceResult<SetDeviceMetricsOverrideParams> {
    SetDeviceMetricsOverrideParams::builder()
        .width(i64::from(viewport.width))
        .height(i64::from(viewport.height))
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(page_error)
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> AcceptanceResult<()> {
        let page = self.page()?;
        let navigation = async {
            page.goto(url).await?;
            if wait != WaitPolicy::DomContentLoaded {
                page.wait_for_navigation().await?;
            }
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(AcceptanceError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(AcceptanceError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
        }
        if wait == WaitPolicy::NetworkIdle {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> AcceptanceResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let params = ScreenshotParams::builder().full_page(full_page).build();
        self.page()?
            .save_screenshot(params, path)
            .await
            .map_err(|e| AcceptanceError::EvidenceCapture {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn title(&mut self) -> AcceptanceResult<String> {
        Ok(self
            .page()?
            .get_title()
            .await
            .map_err(page_error)?
            .unwrap_or_default())
    }

    async fn url(&mut self) -> AcceptanceResult<String> {
        Ok(self
            .page()?
            .url()
            .await
            .map_err(page_error)?
            .unwrap_or_default())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> AcceptanceResult<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(page_error)?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(page_error)?;
        element.click().await.map_err(page_error)?;
        element.type_str(text).await.map_err(page_error)?;
        Ok(())
    }

    async fn press(&mut self, selector: &str, key: &str) -> AcceptanceResult<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(page_error)?;
        element.press_key(key).await.map_err(page_error)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> AcceptanceResult<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(page_error)?;
        element.click().await.map_err(page_error)?;
        Ok(())
    }

    async fn count(&mut self, selector: &str) -> AcceptanceResult<usize> {
        match self.page()?.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            Err(e) => {
                tracing::trace!(selector, error = %e, "no elements");
                Ok(0)
            }
        }
    }

    async fn text_content(&mut self, selector: &str) -> AcceptanceResult<Option<String>> {
        let page = self.page()?;
        let Ok(element) = page.find_element(selector).await else {
            return Ok(None);
        };
        element.inner_text().await.map_err(page_error)
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> AcceptanceResult<()> {
        let page = self.page()?;
        let poll = async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| AcceptanceError::Timeout {
                ms: timeout.as_millis() as u64,
            })
    }

    async fn close(&mut self) -> AcceptanceResult<()> {
        match self.inner.take() {
            Some(page) => page.close().await.map_err(page_error),
            None => Ok(()),
        }
    }
}
