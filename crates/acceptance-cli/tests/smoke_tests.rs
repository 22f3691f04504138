//! Smoke tests for the accept CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn accept() -> Command {
    Command::cargo_bin("accept").expect("accept binary should exist")
}

fn write_env(dir: &TempDir, env: &str, body: &str) {
    let envs = dir.path().join("test_data").join("environments");
    fs::create_dir_all(&envs).unwrap();
    fs::write(envs.join(format!("{env}.json")), body).unwrap();
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    accept()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    accept()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    accept().assert().failure();
}

#[test]
fn test_run_help() {
    accept()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--headed"))
        .stdout(predicate::str::contains("--dry-run"));
}

// ============================================================================
// Config Command
// ============================================================================

#[test]
fn test_config_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    accept()
        .env_remove("TEST_ENV")
        .args(["config", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment:   dev"))
        .stdout(predicate::str::contains("https://www.google.com"));
}

#[test]
fn test_config_json_reads_environment_file() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        "staging",
        r#"{"base_url": "https://staging.example.com", "timeout": 5000, "mcp": {"enabled": false}}"#,
    );
    let output = accept()
        .args(["config", "--json", "--env", "staging", "--root"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["environment"], "staging");
    assert_eq!(value["base_url"], "https://staging.example.com");
    assert_eq!(value["timeout"], 5000);
    assert_eq!(value["orchestration"]["enabled"], false);
}

#[test]
fn test_config_env_var_selects_environment() {
    let dir = TempDir::new().unwrap();
    write_env(&dir, "prod", r#"{"base_url": "https://prod.example.com"}"#);
    accept()
        .env("TEST_ENV", "prod")
        .args(["config", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("https://prod.example.com"));
}

// ============================================================================
// Run Command
// ============================================================================

#[test]
fn test_dry_run_prints_plan() {
    let dir = TempDir::new().unwrap();
    accept()
        .args(["run", "--dry-run", "--keyword", "rust", "--color", "never", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("basic search"))
        .stderr(predicate::str::contains("I search for \"rust\""));
    assert!(!dir.path().join("reports").exists());
}

#[test]
fn test_mock_run_succeeds_and_writes_reports() {
    let dir = TempDir::new().unwrap();
    let reports = dir.path().join("reports");
    accept()
        .args(["run", "--driver", "mock", "--color", "never", "--root"])
        .arg(dir.path())
        .arg("--reports")
        .arg(&reports)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("PASSED"));

    let names: Vec<String> = fs::read_dir(&reports)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("test_report_") && n.ends_with(".html")));
    assert!(names.iter().any(|n| n.starts_with("test_report_") && n.ends_with(".json")));
    assert!(reports.join("screenshots").is_dir());
}

#[test]
fn test_unwritable_reports_exit_two() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("reports");
    fs::write(&blocker, "not a directory").unwrap();
    accept()
        .args(["run", "--driver", "mock", "-q", "--root"])
        .arg(dir.path())
        .arg("--reports")
        .arg(&blocker)
        .assert()
        .code(2);
}

#[test]
fn test_invalid_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    write_env(&dir, "dev", "{ not json");
    accept()
        .env_remove("TEST_ENV")
        .args(["run", "--driver", "mock", "-q", "--env", "dev", "--root"])
        .arg(dir.path())
        .arg("--reports")
        .arg(dir.path().join("reports"))
        .assert()
        .code(0);
}
