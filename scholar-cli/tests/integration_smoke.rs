//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

/// `acm` with its home directory and config isolated in `home`
fn acm(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.current_dir(home)
        .env("ACM_HOME", home)
        .env("ACM_CONFIG_PATH", home.join("config.toml"))
        .env("ACM_QUIET", "1");
    cmd
}

// === Help ===

#[test]
fn test_top_level_help_lists_commands() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("search-acm"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn test_search_help() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.arg("search").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Minimum citation count"));
}

#[test]
fn test_download_from_search_help() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.arg("download").arg("from-search").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--no-index"));
}

#[test]
fn test_chat_summarize_help() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.arg("chat").arg("summarize").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("short, medium or long"));
}

#[test]
fn test_library_clean_help() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.arg("library").arg("clean").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--older-than"));
}

// === Config ===

#[test]
fn test_config_path_honours_env() {
    let home = tempfile::tempdir().unwrap();
    acm(home.path())
        .arg("config")
        .arg("path")
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    acm(home.path())
        .args(["config", "set", "openalex.email", "ada@example.org"])
        .assert()
        .success();

    acm(home.path())
        .env_remove("OPENALEX_EMAIL")
        .args(["config", "get", "openalex.email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ada@example.org"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    acm(home.path())
        .args(["config", "set", "nope.key", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

// === Offline commands ===

#[test]
fn test_last_without_history_fails() {
    let home = tempfile::tempdir().unwrap();
    acm(home.path())
        .arg("last")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No previous search results"));
}

#[test]
fn test_data_stats_on_empty_home() {
    let home = tempfile::tempdir().unwrap();
    acm(home.path())
        .args(["data", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total data points: 0"));
}

#[test]
fn test_deploy_env_backend_template() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.args(["deploy", "env", "backend"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SURREAL_URL"))
        .stdout(predicate::str::contains("CORS_ORIGINS"));
}

#[test]
fn test_completions_bash() {
    let mut cmd = Command::cargo_bin("acm").unwrap();
    cmd.args(["completions", "bash"]);

    cmd.assert().success().stdout(predicate::str::contains("acm"));
}
