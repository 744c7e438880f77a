//! Wall-clock supervision of one container run
//!
//! The run races the container's exit against the time limit. When the
//! deadline wins, the container is killed and whatever it printed is
//! discarded. The container is removed afterwards on every path.
//!
//! A timed-out run returns within `time_limit + kill_grace` of starting. Any
//! teardown still pending at that point continues in a background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::sandbox::{ContainerHandle, ContainerOutput, ContainerRuntime, ContainerSpec, SandboxError};
use crate::types::ResourceLimits;

/// Upper bound on a forced removal
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// How a supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The process exited on its own with this code
    Exited(i64),
    /// The time limit expired first
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub exit: Exit,
    /// Empty when the run timed out
    pub output: ContainerOutput,
    pub oom_killed: bool,
    /// Wall time; exactly the limit on timeout
    pub elapsed: Duration,
}

/// Create, run and remove one container under `limits`
#[instrument(skip_all, fields(name = %spec.name, time_limit_ms = ?limits.time_limit_ms))]
pub async fn run_supervised(
    runtime: &Arc<dyn ContainerRuntime>,
    spec: &ContainerSpec,
    limits: &ResourceLimits,
) -> Result<RunOutcome, SandboxError> {
    let container = runtime.create(spec).await?;
    let (outcome, teardown_by) = drive(runtime.as_ref(), &container, limits).await;

    let name = container.name.clone();
    let mut removal = tokio::spawn(remove_container(Arc::clone(runtime), container));
    let finished = match teardown_by {
        Some(deadline) => tokio::time::timeout_at(deadline, &mut removal).await.ok(),
        None => Some((&mut removal).await),
    };
    match finished {
        Some(Ok(())) => {}
        Some(Err(err)) => warn!(%name, %err, "container removal task failed"),
        None => debug!(%name, "container removal continues in the background"),
    }

    outcome
}

/// Run the container to completion or to its deadline.
///
/// The second value is set when the caller must not wait past it for
/// teardown.
async fn drive(
    runtime: &dyn ContainerRuntime,
    container: &ContainerHandle,
    limits: &ResourceLimits,
) -> (Result<RunOutcome, SandboxError>, Option<Instant>) {
    let time_limit = limits.time_limit();
    let grace = limits.kill_grace();

    let budget = time_limit + grace;
    match tokio::time::timeout(budget, runtime.start(container)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return (Err(err), None),
        Err(_) => {
            warn!(name = %container.name, "container did not start in time");
            return (Err(SandboxError::StartTimeout(budget)), Some(Instant::now()));
        }
    }
    let started = Instant::now();

    let exit = tokio::select! {
        code = runtime.wait(container) => match code {
            Ok(code) => Exit::Exited(code),
            Err(err) => return (Err(err), None),
        },
        () = tokio::time::sleep(time_limit) => Exit::TimedOut,
    };
    let elapsed = started.elapsed();

    if exit == Exit::TimedOut {
        let teardown_by = Instant::now() + grace;
        kill_before(runtime, container, teardown_by).await;
        let outcome = RunOutcome {
            exit,
            output: ContainerOutput::default(),
            oom_killed: false,
            elapsed: time_limit,
        };
        return (Ok(outcome), Some(teardown_by));
    }

    let output = match runtime.logs(container, limits.max_output_bytes()).await {
        Ok(output) => output,
        Err(err) => return (Err(err), None),
    };
    let oom_killed = match runtime.oom_killed(container).await {
        Ok(killed) => killed,
        Err(err) => {
            warn!(name = %container.name, %err, "could not inspect container state");
            false
        }
    };

    debug!(
        ?exit,
        oom_killed,
        elapsed_ms = elapsed.as_millis() as u64,
        truncated = output.truncated,
        "container finished"
    );

    let outcome = RunOutcome {
        exit,
        output,
        oom_killed,
        elapsed,
    };
    (Ok(outcome), None)
}

/// One kill attempt, never retried
async fn kill_before(runtime: &dyn ContainerRuntime, container: &ContainerHandle, deadline: Instant) {
    match tokio::time::timeout_at(deadline, runtime.kill(container)).await {
        Ok(Ok(())) => debug!(name = %container.name, "killed container after time limit"),
        Ok(Err(err)) => warn!(name = %container.name, %err, "failed to kill container"),
        Err(_) => warn!(name = %container.name, "kill did not complete within grace period"),
    }
}

async fn remove_container(runtime: Arc<dyn ContainerRuntime>, container: ContainerHandle) {
    match tokio::time::timeout(REMOVE_TIMEOUT, runtime.remove(&container)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(name = %container.name, %err, "failed to remove container"),
        Err(_) => warn!(name = %container.name, "container removal timed out"),
    }
}
