//! End-to-end CLI tests for the mediacrawl binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CATALOG: &str = r#"[
    {
        "name": "Tube",
        "base_urls": ["https://tube.example/"],
        "search_template": "{base_url}search?q={query}&page={page}",
        "link_selector": "a.video"
    },
    {
        "name": "Magnets",
        "base_urls": ["https://magnets.example/"],
        "index_template": "{base_url}browse/{page}",
        "link_selector": "a[href^='magnet:']",
        "delivery": "record"
    }
]"#;

fn mediacrawl() -> Command {
    let mut cmd = Command::cargo_bin("mediacrawl").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    mediacrawl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--list-sites"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    mediacrawl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediacrawl"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    mediacrawl()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_list_sites_prints_catalog_names() {
    let dir = TempDir::new().unwrap();
    let sites = dir.path().join("sites.json");
    let config = dir.path().join("config.toml");
    fs::write(&sites, CATALOG).unwrap();
    fs::write(&config, "# empty\n").unwrap();

    mediacrawl()
        .arg("--config")
        .arg(&config)
        .arg("--sites-file")
        .arg(&sites)
        .arg("--list-sites")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tube"))
        .stdout(predicate::str::contains("Magnets"));
}

#[test]
fn test_list_sites_reads_catalog_path_from_config() {
    let dir = TempDir::new().unwrap();
    let sites = dir.path().join("catalog.json");
    let config = dir.path().join("config.toml");
    fs::write(&sites, CATALOG).unwrap();
    fs::write(
        &config,
        format!("sites_file = \"{}\"\nverbosity = \"quiet\"\n", sites.display()),
    )
    .unwrap();

    mediacrawl()
        .arg("--config")
        .arg(&config)
        .arg("--list-sites")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tube"));
}

#[test]
fn test_invalid_config_line_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "max_pages = 3\nthis line has no equals sign\n").unwrap();

    mediacrawl()
        .arg("--config")
        .arg(&config)
        .arg("--list-sites")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_unknown_site_fails() {
    let dir = TempDir::new().unwrap();
    let sites = dir.path().join("sites.json");
    let config = dir.path().join("config.toml");
    fs::write(&sites, CATALOG).unwrap();
    fs::write(&config, "").unwrap();

    mediacrawl()
        .arg("--config")
        .arg(&config)
        .arg("--sites-file")
        .arg(&sites)
        .arg("--site")
        .arg("Nowhere")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nowhere"));
}
