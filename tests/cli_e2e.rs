//! End-to-end CLI tests for the refcrawler binary.
//!
//! None of these reach the network: each one stops at argument parsing or
//! configuration validation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config file and log settings.
fn refcrawler(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("refcrawler").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("citation graph"))
        .stdout(predicate::str::contains("--doi"))
        .stdout(predicate::str::contains("--mirrors"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("refcrawler"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_out_of_range_workers() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .args(["--doi", "10.1000/x", "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_binary_fails_when_no_doi_is_valid() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    refcrawler(&home)
        .args(["--doi", "not-a-doi, also bad", "-o"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no valid DOI"));
}

#[test]
fn test_binary_rejects_invalid_mirror() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .args(["--doi", "10.1000/x", "--mirrors", "ftp://mirror.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mirror URL"));
}

#[test]
fn test_binary_reports_missing_config_file() {
    let home = TempDir::new().unwrap();
    refcrawler(&home)
        .args(["--doi", "10.1000/x", "--config"])
        .arg(home.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_binary_rejects_invalid_default_config() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("refcrawler");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "workers = 500\n").unwrap();

    refcrawler(&home)
        .args(["--doi", "10.1000/x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}
