use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{CompileConfig, DriverKind, Language, RunConfig};
use crate::types::ResourceLimits;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../codejudge.example.toml");

/// Prefix for environment variable overrides (`CODEJUDGE__SERVER__BIND=...`)
pub const ENV_PREFIX: &str = "CODEJUDGE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for codejudge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Container runtime settings
    #[serde(default)]
    pub docker: DockerConfig,

    /// Host directory for per-execution workspaces (system temp dir if unset)
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Output comparison and aggregation settings
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Default resource limits applied to all executions.
    /// This will be overridden by language limits and then by the request
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Path of the daemon's unix socket; local defaults when unset
    #[serde(default)]
    pub socket: Option<String>,

    /// Prefix of every container name the engine creates
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,

    /// Pull a language image on first use if the daemon lacks it
    #[serde(default)]
    pub pull_missing_images: bool,

    /// Run containers as the uid:gid owning the workspace directory
    #[serde(default = "default_true")]
    pub run_as_workspace_owner: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            container_prefix: default_container_prefix(),
            pull_missing_images: false,
            run_as_workspace_owner: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum accepted request body in kilobytes
    #[serde(default = "default_max_body_kb")]
    pub max_body_kb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_kb: default_max_body_kb(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Absolute/relative tolerance when comparing floating point output
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,

    /// Skip remaining hidden cases after the first failure
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            float_tolerance: default_float_tolerance(),
            stop_on_failure: false,
        }
    }
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            docker: DockerConfig::default(),
            workspace_root: None,
            server: ServerConfig::default(),
            harness: HarnessConfig::default(),
            default_limits: ResourceLimits::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Directory under which workspaces are created
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Merge resource limits with defaults
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }

    /// Language IDs in a stable order
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_container_prefix() -> String {
    "codejudge".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_max_body_kb() -> usize {
    512
}

fn default_float_tolerance() -> f64 {
    1e-6
}
