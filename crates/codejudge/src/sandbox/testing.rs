//! Scripted in-memory [`ContainerRuntime`] for tests
//!
//! Each created container consumes the next queued [`Script`]; once the
//! queue is empty the fallback script is reused.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::sandbox::{
    ContainerHandle, ContainerOutput, ContainerRuntime, ContainerSpec, OutputBuffer, SandboxError,
};

/// What a fake container does once started
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub delay: Duration,
    pub oom_killed: bool,
}

impl Script {
    pub fn exit(code: i64) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_owned();
        self
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_owned();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn oom_killed(mut self) -> Self {
        self.oom_killed = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    fallback: Script,
    queue: Mutex<VecDeque<Script>>,
    running: Mutex<HashMap<String, Script>>,
    created: Mutex<Vec<(String, ContainerSpec)>>,
    kills: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    unavailable: bool,
    missing_image: bool,
    failing_start: bool,
    failing_kill: bool,
    hanging_kill: bool,
    hanging_start: bool,
    hanging_remove: bool,
}

impl FakeRuntime {
    pub fn new(fallback: Script) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    /// Queue scripts consumed by the next containers, in order
    pub fn with_scripts(self, scripts: impl IntoIterator<Item = Script>) -> Self {
        self.queue.lock().unwrap().extend(scripts);
        self
    }

    /// Every daemon call fails as if the socket were gone
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn with_missing_image(mut self) -> Self {
        self.missing_image = true;
        self
    }

    pub fn with_failing_start(mut self) -> Self {
        self.failing_start = true;
        self
    }

    pub fn with_failing_kill(mut self) -> Self {
        self.failing_kill = true;
        self
    }

    pub fn with_hanging_kill(mut self) -> Self {
        self.hanging_kill = true;
        self
    }

    pub fn with_hanging_start(mut self) -> Self {
        self.hanging_start = true;
        self
    }

    /// Removal is recorded, then never completes
    pub fn with_hanging_remove(mut self) -> Self {
        self.hanging_remove = true;
        self
    }

    /// Specs of every created container, in creation order
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(_, spec)| spec.clone())
            .collect()
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn kills(&self) -> Vec<String> {
        self.kills.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// Removed ids once at least `count` removals were requested, waiting
    /// up to five seconds for background teardown
    pub async fn removals(&self, count: usize) -> Vec<String> {
        let settle = async {
            while self.removed.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(5), settle).await;
        self.removed()
    }

    fn check_available(&self) -> Result<(), SandboxError> {
        if self.unavailable {
            return Err(SandboxError::Unavailable("connection refused".to_owned()));
        }
        Ok(())
    }

    fn script(&self, container: &ContainerHandle) -> Script {
        self.running
            .lock()
            .unwrap()
            .get(&container.id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), SandboxError> {
        self.check_available()
    }

    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        self.check_available()?;
        if self.missing_image {
            return Err(SandboxError::Image {
                image: image.to_owned(),
                message: "No such image".to_owned(),
            });
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, SandboxError> {
        self.check_available()?;
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let script = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.running.lock().unwrap().insert(id.clone(), script);
        self.created
            .lock()
            .unwrap()
            .push((id.clone(), spec.clone()));

        Ok(ContainerHandle {
            id,
            name: spec.name.clone(),
        })
    }

    async fn start(&self, _container: &ContainerHandle) -> Result<(), SandboxError> {
        if self.hanging_start {
            std::future::pending::<()>().await;
        }
        if self.failing_start {
            return Err(SandboxError::Unavailable("start refused".to_owned()));
        }
        Ok(())
    }

    async fn wait(&self, container: &ContainerHandle) -> Result<i64, SandboxError> {
        let script = self.script(container);
        tokio::time::sleep(script.delay).await;
        Ok(script.exit_code)
    }

    async fn logs(
        &self,
        container: &ContainerHandle,
        limit: Option<usize>,
    ) -> Result<ContainerOutput, SandboxError> {
        let script = self.script(container);
        let mut buffer = OutputBuffer::new(limit);
        buffer.push_stdout(script.stdout.as_bytes());
        buffer.push_stderr(script.stderr.as_bytes());
        Ok(buffer.finish())
    }

    async fn oom_killed(&self, container: &ContainerHandle) -> Result<bool, SandboxError> {
        Ok(self.script(container).oom_killed)
    }

    async fn kill(&self, container: &ContainerHandle) -> Result<(), SandboxError> {
        self.kills.lock().unwrap().push(container.id.clone());
        if self.hanging_kill {
            std::future::pending::<()>().await;
        }
        if self.failing_kill {
            return Err(SandboxError::Unavailable("kill refused".to_owned()));
        }
        Ok(())
    }

    async fn remove(&self, container: &ContainerHandle) -> Result<(), SandboxError> {
        self.running.lock().unwrap().remove(&container.id);
        self.removed.lock().unwrap().push(container.id.clone());
        if self.hanging_remove {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
