//! CLI tests for the loadsync binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config and data directories
fn loadsync(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("loadsync").expect("binary should build");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

fn write_config(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("loadsync.yml");
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

#[test]
fn test_no_command_prints_hint() {
    let home = TempDir::new().unwrap();
    loadsync(home.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("loadsync demo"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "affinity:\n  thread-name: ui-main\n");

    loadsync(home.path())
        .args(["config", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("thread-name: ui-main"))
        .stdout(predicate::str::contains("items-per-loader: 20"));
}

#[test]
fn test_invalid_config_fails() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "demo:\n  failure-rate: 2.0\n");

    loadsync(home.path())
        .args(["config", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_demo_json_output() {
    let home = TempDir::new().unwrap();
    let config = write_config(
        home.path(),
        "demo:\n  items-per-loader: 3\n  item-delay-ms: 0\n  failure-rate: 0.0\n  interrupt-rate: 0.0\n",
    );

    let output = loadsync(home.path())
        .args(["demo", "-n", "3", "--format", "json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 3);
    for record in records {
        assert_eq!(record["outcome"]["status"], "success");
        assert_eq!(record["on_affinity_thread"], true);
        assert_eq!(record["hook_ran"], true);
    }
}

#[test]
fn test_demo_text_summary() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "demo:\n  item-delay-ms: 0\n");

    loadsync(home.path())
        .args(["demo", "-n", "2", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 loaders:"));
}

#[test]
fn test_stress_is_clean() {
    let home = TempDir::new().unwrap();
    loadsync(home.path())
        .args(["stress", "--tasks", "16", "--rounds", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tasks:            32"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_writes_log_file() {
    let home = TempDir::new().unwrap();
    loadsync(home.path()).args(["-l", "debug", "stress", "-t", "1", "-r", "1"]).assert().success();

    let log = home.path().join("data").join("loadsync").join("logs").join("loadsync.log");
    let content = fs::read_to_string(log).unwrap();
    assert!(content.contains("Logging initialized"));
}
