//! Page objects over the [`Page`] contract.
//!
//! A page object owns the selectors of one page and exposes the actions a
//! step needs. Steps never touch selectors directly.

use crate::driver::{Page, WaitPolicy};
use crate::result::AcceptanceResult;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A page or component of the application under test
pub trait PageObject {
    /// URL fragment identifying the page
    fn url_pattern(&self) -> &str;

    /// Name used in logs
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// How long to wait for the page to load
    fn load_timeout(&self) -> Duration {
        Duration::from_millis(30_000)
    }

    /// Whether `url` belongs to this page
    fn matches_url(&self, url: &str) -> bool {
        url.to_lowercase()
            .starts_with(&self.url_pattern().to_lowercase())
    }
}

/// Search box of the search page
pub const SEARCH_BOX: &str = "textarea[name=\"q\"], input[name=\"q\"]";

/// Cookie-consent buttons, tried in order
pub const COOKIE_CONSENT: &[&str] = &[
    "#L2AGLb",
    "button[aria-label='Accept all']",
    "button[id*='accept']",
];

/// Result selectors, tried in order until one matches
pub const RESULT_SELECTORS: &[&str] = &[
    "div#search div[data-sokoban-container] > div",
    "div#search div.g",
    "div#search div[data-ved]",
    "div#search h3",
    "div#rso > div",
    "div[data-async-context]",
    "div#main > div",
];

/// Containers checked when no result selector matches
pub const RESULT_CONTAINER: &str = "div#search, div#rso, div#main";

/// Minimum container text length that counts as results
pub const MIN_CONTAINER_TEXT: usize = 100;

const SEARCH_BOX_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Search engine landing and results page
pub struct SearchPage<'a> {
    page: &'a mut (dyn Page + 'static),
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for SearchPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPage")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PageObject for SearchPage<'_> {
    fn url_pattern(&self) -> &str {
        &self.base_url
    }

    fn page_name(&self) -> &str {
        "search page"
    }

    fn load_timeout(&self) -> Duration {
        self.timeout
    }
}

impl<'a> SearchPage<'a> {
    /// Wrap `page`; `timeout` bounds navigation and result waits
    pub fn new(
        page: &'a mut (dyn Page + 'static),
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Open the landing page and dismiss a cookie banner if one shows up
    pub async fn navigate(&mut self) -> AcceptanceResult<()> {
        let timeout = self.load_timeout();
        self.page
            .goto(&self.base_url, WaitPolicy::NetworkIdle, timeout)
            .await?;
        let landed = self.page.url().await?;
        if self.matches_url(&landed) {
            info!(page = self.page_name(), url = %landed, "navigated");
        } else {
            warn!(page = self.page_name(), expected = %self.base_url, url = %landed, "redirected away");
        }
        self.dismiss_consent().await;
        Ok(())
    }

    async fn dismiss_consent(&mut self) {
        for selector in COOKIE_CONSENT {
            match self.page.count(selector).await {
                Ok(0) => {}
                Ok(_) => {
                    match self.page.click(selector).await {
                        Ok(()) => info!(selector, "cookie consent accepted"),
                        Err(e) => debug!(selector, error = %e, "cookie consent click failed"),
                    }
                    return;
                }
                Err(e) => debug!(selector, error = %e, "cookie consent probe failed"),
            }
        }
    }

    /// Type `keyword` into the search box and submit
    pub async fn search(&mut self, keyword: &str) -> AcceptanceResult<()> {
        self.page
            .wait_for_selector(SEARCH_BOX, SEARCH_BOX_TIMEOUT)
            .await?;
        self.page.fill(SEARCH_BOX, keyword).await?;
        info!(keyword, "search keyword entered");
        self.page.press(SEARCH_BOX, "Enter").await?;
        if let Err(e) = self
            .page
            .wait_for_selector(RESULT_CONTAINER, self.timeout)
            .await
        {
            warn!(error = %e, "results container did not appear");
        }
        Ok(())
    }

    /// Whether a results page is showing.
    ///
    /// Probes [`RESULT_SELECTORS`], then the text of [`RESULT_CONTAINER`],
    /// then accepts a search URL carrying a `q=` parameter.
    pub async fn results_displayed(&mut self) -> AcceptanceResult<bool> {
        for selector in RESULT_SELECTORS {
            match self.page.count(selector).await {
                Ok(0) => {}
                Ok(count) => {
                    info!(selector, count, "search results found");
                    return Ok(true);
                }
                Err(e) => debug!(selector, error = %e, "result probe failed"),
            }
        }

        if let Ok(Some(text)) = self.page.text_content(RESULT_CONTAINER).await {
            if text.trim().len() > MIN_CONTAINER_TEXT {
                info!("search results found by content");
                return Ok(true);
            }
        }

        let url = self.page.url().await?;
        if is_search_url(&url) {
            info!(%url, "search URL detected, considering search successful");
            return Ok(true);
        }
        warn!("no search results found");
        Ok(false)
    }

    /// Current page title
    pub async fn title(&mut self) -> AcceptanceResult<String> {
        let title = self.page.title().await?;
        debug!(%title, "page title");
        Ok(title)
    }
}

/// Whether `url` looks like a results URL
#[must_use]
pub fn is_search_url(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("search") && url.contains("q=")
}
