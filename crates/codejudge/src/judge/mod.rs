//! Judge engine
//!
//! [`Judge`] ties the pieces together: it synthesizes a driver, stages it in
//! a fresh workspace, runs it under supervision in one or two containers and
//! classifies what came back. [`Judge::judge`] repeats that per test case and
//! folds the results into a submission verdict.

use std::sync::Arc;

use thiserror::Error;

pub use crate::judge::compare::{outputs_match, values_match};
pub use crate::judge::harness::aggregate;

mod compare;
mod execute;
mod harness;

use crate::config::{Config, Language};
use crate::sandbox::{ContainerRuntime, DockerRuntime, SandboxError};
use crate::workspace::WorkspaceError;

/// Errors that prevent a verdict from being produced
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The caller asked for something unsupported or malformed
    #[error("{0}")]
    Request(String),

    /// The host failed: container runtime, filesystem
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("execution task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<SandboxError> for JudgeError {
    fn from(err: SandboxError) -> Self {
        Self::Host(err.into())
    }
}

impl From<WorkspaceError> for JudgeError {
    fn from(err: WorkspaceError) -> Self {
        Self::Host(err.into())
    }
}

/// Cheap to clone; every clone shares the config and the runtime
#[derive(Clone)]
pub struct Judge {
    config: Arc<Config>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Judge {
    pub fn new(config: Config, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
        }
    }

    /// Build a judge backed by the Docker daemon named in `config`
    pub fn connect(config: Config) -> Result<Self, SandboxError> {
        let runtime = DockerRuntime::connect(&config.docker)?;
        Ok(Self::new(config, Arc::new(runtime)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check the container runtime is reachable
    pub async fn health(&self) -> Result<(), SandboxError> {
        self.runtime.ping().await
    }

    fn language(&self, id: &str) -> Result<&Language, JudgeError> {
        self.config
            .get_language(id)
            .map_err(|err| JudgeError::Request(err.to_string()))
    }
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge")
            .field("languages", &self.config.language_ids())
            .finish_non_exhaustive()
    }
}
