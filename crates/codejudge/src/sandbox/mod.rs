//! Sandboxed execution in disposable containers
//!
//! [`ContainerRuntime`] is the typed seam between the engine and the
//! container daemon. Limits travel as structured fields on
//! [`ContainerSpec`]; nothing is ever interpolated into a shell string.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::ResourceLimits;

mod docker;
pub mod supervisor;
#[cfg(test)]
pub(crate) mod testing;

pub use docker::DockerRuntime;
pub use supervisor::{Exit, RunOutcome, run_supervised};

/// Where the workspace appears inside every container
pub const WORKSPACE_TARGET: &str = "/workspace";

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("image '{image}' is not available: {message}")]
    Image { image: String, message: String },

    #[error("container did not start within {} ms", .0.as_millis())]
    StartTimeout(Duration),

    #[error("workspace path is not valid UTF-8: {0}")]
    InvalidMount(PathBuf),

    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

/// Unique container name: `<prefix>-<pid>-<uuid>`
///
/// The pid makes names derivable per engine process; the uuid keeps
/// concurrent executions apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn generate(prefix: &str) -> Self {
        Self(format!(
            "{prefix}-{}-{}",
            std::process::id(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A created container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: ContainerName,
}

/// Host directory bind-mounted read-write into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceMount {
    pub host: PathBuf,
    pub target: String,
}

impl WorkspaceMount {
    pub fn new(host: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            target: WORKSPACE_TARGET.to_owned(),
        }
    }
}

/// Everything needed to create one sandbox container
///
/// Backends always drop every capability and set `no-new-privileges`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: ContainerName,
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// `uid:gid` to run as; the image default when `None`
    pub user: Option<String>,
    pub mount: WorkspaceMount,
    /// Hard memory ceiling; swap is capped to the same value
    pub memory_bytes: Option<i64>,
    pub nano_cpus: Option<i64>,
    pub pids_limit: Option<i64>,
    pub network_disabled: bool,
    pub read_only_root: bool,
}

impl ContainerSpec {
    pub fn new(
        name: ContainerName,
        image: impl Into<String>,
        command: Vec<String>,
        mount: WorkspaceMount,
    ) -> Self {
        Self {
            name,
            image: image.into(),
            command,
            env: BTreeMap::new(),
            user: None,
            mount,
            memory_bytes: None,
            nano_cpus: None,
            pids_limit: None,
            network_disabled: true,
            read_only_root: true,
        }
    }

    pub fn with_limits(mut self, limits: &ResourceLimits) -> Self {
        self.memory_bytes = limits.memory_bytes();
        self.nano_cpus = limits.nano_cpus();
        self.pids_limit = limits.max_processes.map(i64::from);
        self
    }

    pub fn with_env<'a>(mut self, env: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// `KEY=value` pairs in a stable order
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

/// Captured container output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOutput {
    pub stdout: String,
    pub stderr: String,
    /// Either stream hit the output limit
    pub truncated: bool,
}

/// Accumulates log chunks, keeping at most `limit` bytes per stream
#[derive(Debug, Default)]
pub struct OutputBuffer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    limit: Option<usize>,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn push_stdout(&mut self, chunk: &[u8]) {
        self.truncated |= append_limited(&mut self.stdout, chunk, self.limit);
    }

    pub fn push_stderr(&mut self, chunk: &[u8]) {
        self.truncated |= append_limited(&mut self.stderr, chunk, self.limit);
    }

    /// Both streams have reached the limit; further chunks would be dropped
    pub fn is_full(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.stdout.len() >= limit && self.stderr.len() >= limit)
    }

    pub fn finish(self) -> ContainerOutput {
        ContainerOutput {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            truncated: self.truncated,
        }
    }
}

/// Returns whether anything was dropped
fn append_limited(buf: &mut Vec<u8>, chunk: &[u8], limit: Option<usize>) -> bool {
    match limit {
        Some(limit) => {
            let room = limit.saturating_sub(buf.len());
            let take = room.min(chunk.len());
            buf.extend_from_slice(&chunk[..take]);
            take < chunk.len()
        }
        None => {
            buf.extend_from_slice(chunk);
            false
        }
    }
}

/// Operations the engine needs from a container daemon
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check the daemon is reachable
    async fn ping(&self) -> Result<(), SandboxError>;

    /// Make sure `image` is present locally
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError>;

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, SandboxError>;

    async fn start(&self, container: &ContainerHandle) -> Result<(), SandboxError>;

    /// Block until the container exits and return its exit code
    async fn wait(&self, container: &ContainerHandle) -> Result<i64, SandboxError>;

    /// Collect output, at most `limit` bytes per stream
    async fn logs(
        &self,
        container: &ContainerHandle,
        limit: Option<usize>,
    ) -> Result<ContainerOutput, SandboxError>;

    /// Whether the kernel OOM killer ended the container
    async fn oom_killed(&self, container: &ContainerHandle) -> Result<bool, SandboxError>;

    /// Send SIGKILL
    async fn kill(&self, container: &ContainerHandle) -> Result<(), SandboxError>;

    /// Force-remove the container and its anonymous volumes
    async fn remove(&self, container: &ContainerHandle) -> Result<(), SandboxError>;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn container_names_are_unique_and_prefixed() {
        let a = ContainerName::generate("codejudge");
        let b = ContainerName::generate("codejudge");
        assert_ne!(a, b);

        let pid = std::process::id().to_string();
        let parts: Vec<&str> = a.as_str().splitn(3, '-').collect();
        assert_eq!(parts[0], "codejudge");
        assert_eq!(parts[1], pid);
        assert_eq!(parts[2].len(), 32);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn spec_defaults_are_locked_down() {
        let spec = ContainerSpec::new(
            ContainerName::generate("t"),
            "python:3.12-alpine",
            vec!["python3".to_owned()],
            WorkspaceMount::new("/tmp/ws"),
        );
        assert!(spec.network_disabled);
        assert!(spec.read_only_root);
        assert_eq!(spec.mount.target, "/workspace");
        assert_eq!(spec.user, None);
    }

    #[test]
    fn spec_takes_limits() {
        let limits = ResourceLimits::default()
            .with_memory_limit_mb(128)
            .with_cpus(0.5)
            .with_max_processes(16);
        let spec = ContainerSpec::new(
            ContainerName::generate("t"),
            "gcc:13",
            vec![],
            WorkspaceMount::new("/tmp/ws"),
        )
        .with_limits(&limits);

        assert_eq!(spec.memory_bytes, Some(128 * 1024 * 1024));
        assert_eq!(spec.nano_cpus, Some(500_000_000));
        assert_eq!(spec.pids_limit, Some(16));
    }

    #[test]
    fn env_pairs_are_sorted() {
        let env: HashMap<String, String> = [("B", "2"), ("A", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let spec = ContainerSpec::new(
            ContainerName::generate("t"),
            "node:20-alpine",
            vec![],
            WorkspaceMount::new("/tmp/ws"),
        )
        .with_env(&env);
        assert_eq!(spec.env_pairs(), vec!["A=1", "B=2"]);
    }

    #[test]
    fn output_buffer_truncates_each_stream() {
        let mut buffer = OutputBuffer::new(Some(4));
        buffer.push_stdout(b"abc");
        buffer.push_stdout(b"def");
        buffer.push_stderr(b"xy");
        assert!(!buffer.is_full());

        let output = buffer.finish();
        assert_eq!(output.stdout, "abcd");
        assert_eq!(output.stderr, "xy");
        assert!(output.truncated);
    }

    #[test]
    fn output_buffer_unlimited() {
        let mut buffer = OutputBuffer::new(None);
        buffer.push_stdout(&[b'a'; 10_000]);
        let output = buffer.finish();
        assert_eq!(output.stdout.len(), 10_000);
        assert!(!output.truncated);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn buffer_never_exceeds_limit(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16),
            limit in 0usize..256,
        ) {
            let mut buffer = OutputBuffer::new(Some(limit));
            let total: usize = chunks.iter().map(Vec::len).sum();
            for chunk in &chunks {
                buffer.push_stdout(chunk);
            }
            prop_assert!(buffer.stdout.len() <= limit);
            prop_assert_eq!(buffer.truncated, total > limit);
        }
    }
}
