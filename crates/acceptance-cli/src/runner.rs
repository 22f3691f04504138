//! Command handlers

use crate::commands::{ColorArg, ConfigArgs, DriverArg, RunArgs};
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use acceptance::{
    orchestrated_search_feature, search_feature, ConfigLoader, Driver, Feature, FeatureRunner,
    HookScheduler, MockDriver, RunConfig,
};
use std::time::Instant;

/// Keyword used when neither the command line nor test data names one
pub const DEFAULT_KEYWORD: &str = "AI";

/// Run the search feature; returns the process exit code
pub fn run(args: &RunArgs, color: ColorArg, quiet: bool) -> CliResult<u8> {
    let loader = ConfigLoader::new(&args.root);
    let mut config = loader.load(args.env.as_deref());
    if let Some(headless) = args.headless_override() {
        config = config.with_headless(headless);
    }
    config.validate().map_err(CliError::config)?;

    // An explicit keyword is searched as given; otherwise the collaborator
    // may supply one, falling back to test data.
    let feature = match args.keyword.as_deref() {
        Some(keyword) => search_feature(keyword),
        None => orchestrated_search_feature(
            &loader.load_test_data().search_keyword(DEFAULT_KEYWORD),
        ),
    };
    let reporter = ProgressReporter::new(color.should_color(), quiet);

    if args.dry_run {
        print_plan(&reporter, &config, &feature);
        return Ok(0);
    }

    let driver = select_driver(args.driver)?;
    reporter.info(&format!(
        "running {} against {} ({}, {})",
        feature.name,
        config.base_url,
        config.browser_kind,
        if config.headless { "headless" } else { "headed" }
    ));

    let hooks = HookScheduler::new(driver)
        .with_config(config)
        .with_reports_dir(&args.reports)
        .with_title(&args.title);
    let mut listener = reporter.clone();
    listener.start_progress(feature.scenario_count() as u64, "starting");

    let started = Instant::now();
    let mut runner = FeatureRunner::new(hooks).with_listener(listener.clone());
    let report = runner.run(&feature)?;
    listener.finish();

    reporter.summary(&report, started.elapsed());
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}

fn print_plan(reporter: &ProgressReporter, config: &RunConfig, feature: &Feature) {
    reporter.header(&format!("Feature: {}", feature.name));
    reporter.info(&format!(
        "environment {} at {}",
        config.environment, config.base_url
    ));
    for scenario in &feature.scenarios {
        reporter.info(&format!("Scenario: {}", scenario.name));
        for step in &scenario.steps {
            reporter.info(&format!("  {} {}", step.kind, step.text));
        }
    }
}

fn select_driver(choice: DriverArg) -> CliResult<Box<dyn Driver>> {
    match choice {
        DriverArg::Mock => Ok(Box::new(MockDriver::new())),
        #[cfg(feature = "browser")]
        DriverArg::Auto | DriverArg::Cdp => Ok(Box::new(acceptance::CdpDriver::new())),
        #[cfg(not(feature = "browser"))]
        DriverArg::Auto => {
            tracing::warn!("built without the browser feature, using the mock driver");
            Ok(Box::new(MockDriver::new()))
        }
        #[cfg(not(feature = "browser"))]
        DriverArg::Cdp => Err(CliError::invalid_argument(
            "cdp driver not available; rebuild with --features browser",
        )),
    }
}

/// Print the resolved configuration
pub fn show_config(args: &ConfigArgs) -> CliResult<()> {
    let config = ConfigLoader::new(&args.root).load(args.env.as_deref());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    println!("Acceptance configuration:");
    println!("  Environment:   {}", config.environment);
    println!("  Base URL:      {}", config.base_url);
    println!("  Browser:       {}", config.browser_kind);
    println!("  Headless:      {}", config.headless);
    println!(
        "  Viewport:      {}x{}",
        config.viewport.width, config.viewport.height
    );
    println!("  Timeout:       {}ms", config.timeout_ms);
    println!("  Step timeout:  {}ms", config.step_timeout_ms);
    println!("  Retries:       {}", config.retry_count);
    println!(
        "  Orchestration: {}",
        match (&config.orchestration.enabled, &config.orchestration.endpoint) {
            (false, _) => "disabled".to_string(),
            (true, Some(endpoint)) => endpoint.clone(),
            (true, None) => "loopback".to_string(),
        }
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(dir: &TempDir) -> RunArgs {
        RunArgs {
            env: None,
            headed: false,
            headless: false,
            root: dir.path().to_path_buf(),
            reports: dir.path().join("reports"),
            keyword: None,
            dry_run: false,
            title: acceptance::DEFAULT_TITLE.to_string(),
            driver: DriverArg::Mock,
        }
    }

    #[test]
    fn test_mock_run_writes_reports() {
        let dir = TempDir::new().unwrap();
        let code = run(&args(&dir), ColorArg::Never, true).unwrap();
        assert_eq!(code, 0);
        let written: Vec<PathBuf> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert!(written
            .iter()
            .any(|p| p.extension().is_some_and(|e| e == "html")));
        assert!(written
            .iter()
            .any(|p| p.extension().is_some_and(|e| e == "json")));
    }

    #[test]
    fn test_explicit_keyword_is_searched_with_default_config() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir);
        args.keyword = Some("rust".to_string());
        assert_eq!(run(&args, ColorArg::Never, true).unwrap(), 0);

        let json = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.extension().is_some_and(|e| e == "json"))
            .unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        let verify = report["test_results"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == acceptance::VERIFY_RESULTS)
            .unwrap();
        assert_eq!(verify["details"]["keyword"], "rust");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir);
        args.dry_run = true;
        assert_eq!(run(&args, ColorArg::Never, true).unwrap(), 0);
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_mock_driver_selected() {
        let driver = select_driver(DriverArg::Mock).unwrap();
        assert_eq!(driver.name(), "mock");
    }
}
