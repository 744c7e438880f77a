//! Integration tests for codejudge
//!
//! These tests need a reachable Docker daemon and the language images from
//! the default configuration.
//! Run with: cargo test -p codejudge --features integration-tests
//!
//! Tests that start containers are marked `#[ignore]`. To include them:
//!    cargo test -p codejudge --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;

use codejudge::{Config, Judge};
use tempfile::TempDir;

mod cleanup;
mod config_loading;
mod execution;
mod limits;
mod submissions;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// A Docker-backed judge whose workspaces live under a private root
pub(crate) fn test_judge() -> (Judge, TempDir) {
    let root = tempfile::tempdir().expect("Failed to create workspace root");
    let mut config = Config::default();
    config.workspace_root = Some(root.path().to_path_buf());
    config.docker.pull_missing_images = true;
    let judge = Judge::connect(config).expect("Failed to connect to docker");
    (judge, root)
}
