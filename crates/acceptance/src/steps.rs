//! Built-in step actions and the search feature.

use crate::harness::{Feature, Scenario, StepAction, StepContext, StepKind};
use crate::page_object::SearchPage;
use crate::reporter::TestStatus;
use crate::result::{AcceptanceError, AcceptanceResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

/// Scenario name of the built-in feature
pub const BASIC_SEARCH: &str = "basic search";

/// Result name reported by [`VerifyResultsStep`]
pub const VERIFY_RESULTS: &str = "verify_search_results";

/// Result name reported by [`TitleContainsStep`]
pub const VERIFY_TITLE: &str = "verify_page_title";

/// Scenario variable holding the keyword actually searched
pub const KEYWORD_VAR: &str = "search_keyword";

fn search_page<'c>(ctx: &'c mut StepContext<'_>) -> SearchPage<'c> {
    SearchPage::new(&mut *ctx.page, ctx.config.base_url.clone(), ctx.config.timeout())
}

/// Open the configured base URL
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateStep;

#[async_trait]
impl StepAction for NavigateStep {
    async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
        search_page(ctx).navigate().await
    }
}

/// Search for a keyword
#[derive(Debug, Clone)]
pub struct SearchStep {
    keyword: String,
    overridable: bool,
}

impl SearchStep {
    /// Search for exactly `keyword`
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            overridable: false,
        }
    }

    /// Search for `keyword` unless a connected collaborator supplies one
    #[must_use]
    pub fn overridable(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            overridable: true,
        }
    }
}

#[async_trait]
impl StepAction for SearchStep {
    async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
        let mut keyword = self.keyword.clone();
        if self.overridable && ctx.orchestration.is_connected() {
            let data = ctx.orchestration.fetch_dynamic_data("search_keyword").await;
            if let Some(dynamic) = non_empty(&data, "keyword") {
                info!(keyword = dynamic, "using keyword from orchestration");
                keyword = dynamic.to_string();
            }
        }
        search_page(ctx).search(&keyword).await?;
        ctx.vars.insert(KEYWORD_VAR.to_string(), keyword);
        Ok(())
    }
}

/// Check that results are showing and report the check
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyResultsStep;

#[async_trait]
impl StepAction for VerifyResultsStep {
    async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
        let displayed = search_page(ctx).results_displayed().await?;
        let keyword = ctx
            .vars
            .get(KEYWORD_VAR)
            .map_or("unknown", String::as_str)
            .to_string();

        let mut details = Map::new();
        details.insert("results_displayed".to_string(), json!(displayed));
        details.insert("keyword".to_string(), json!(keyword));
        ctx.orchestration
            .report_result(VERIFY_RESULTS, status_of(displayed), details, None)
            .await;

        if displayed {
            Ok(())
        } else {
            Err(AcceptanceError::step(
                "verify results",
                "Search results are not displayed",
            ))
        }
    }
}

/// Check that the page title contains a text, case-insensitively
#[derive(Debug, Clone)]
pub struct TitleContainsStep {
    expected: String,
    overridable: bool,
}

impl TitleContainsStep {
    /// Expect exactly `expected` in the title
    #[must_use]
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            overridable: false,
        }
    }

    /// Expect `expected` unless a connected collaborator supplies criteria
    #[must_use]
    pub fn overridable(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            overridable: true,
        }
    }
}

#[async_trait]
impl StepAction for TitleContainsStep {
    async fn run(&self, ctx: &mut StepContext<'_>) -> AcceptanceResult<()> {
        let title = search_page(ctx).title().await?;
        let mut expected = self.expected.clone();
        if self.overridable && ctx.orchestration.is_connected() {
            let data = ctx
                .orchestration
                .fetch_dynamic_data("validation_criteria")
                .await;
            if let Some(dynamic) = non_empty(&data, "title_contains") {
                info!(expected = dynamic, "using validation criteria from orchestration");
                expected = dynamic.to_string();
            }
        }
        let contains = title_contains(&title, &expected);

        let mut details = Map::new();
        details.insert("page_title".to_string(), json!(title));
        details.insert("expected_text".to_string(), json!(expected));
        details.insert("contains".to_string(), json!(contains));
        ctx.orchestration
            .report_result(VERIFY_TITLE, status_of(contains), details, None)
            .await;

        if contains {
            Ok(())
        } else {
            Err(AcceptanceError::step(
                "verify title",
                format!("Page title '{title}' does not contain '{expected}'"),
            ))
        }
    }
}

/// Case-insensitive containment
#[must_use]
pub fn title_contains(title: &str, expected: &str) -> bool {
    title.to_lowercase().contains(&expected.to_lowercase())
}

const fn status_of(ok: bool) -> TestStatus {
    if ok {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    }
}

fn non_empty<'m>(data: &'m Map<String, Value>, key: &str) -> Option<&'m str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// The built-in search feature: navigate, search for `keyword`, expect
/// results and a title mentioning `keyword`
#[must_use]
pub fn search_feature(keyword: &str) -> Feature {
    Feature::new("Search").scenario(
        Scenario::new(BASIC_SEARCH)
            .step(StepKind::Given, "I navigate to the search page", NavigateStep)
            .step(
                StepKind::When,
                format!("I search for \"{keyword}\""),
                SearchStep::new(keyword),
            )
            .step(
                StepKind::Then,
                "I should see search results displayed",
                VerifyResultsStep,
            )
            .step(
                StepKind::And,
                format!("the page title should contain \"{keyword}\""),
                TitleContainsStep::new(keyword),
            ),
    )
}

/// The search feature with keyword and title criteria taken from the
/// orchestration collaborator when connected, `default_keyword` otherwise
#[must_use]
pub fn orchestrated_search_feature(default_keyword: &str) -> Feature {
    Feature::new("Search").scenario(
        Scenario::new(BASIC_SEARCH)
            .step(StepKind::Given, "I navigate to the search page", NavigateStep)
            .step(
                StepKind::When,
                "I search for the test keyword",
                SearchStep::overridable(default_keyword),
            )
            .step(
                StepKind::Then,
                "I should see search results displayed",
                VerifyResultsStep,
            )
            .step(
                StepKind::And,
                "the page title should contain the keyword",
                TitleContainsStep::overridable(default_keyword),
            ),
    )
}
