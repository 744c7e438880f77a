//! Single execution: driver, workspace, compile and run containers

use std::collections::HashMap;
use std::time::Duration;

use tracing::{Instrument, Span, debug, instrument, warn};

use crate::config::{CompileConfig, Language};
use crate::driver::{self, Driver};
use crate::judge::{HostError, Judge, JudgeError};
use crate::sandbox::{
    ContainerName, ContainerOutput, ContainerSpec, Exit, RunOutcome, WorkspaceMount,
    run_supervised,
};
use crate::types::{ExecutionRequest, ExecutionResult, ResourceLimits, Verdict};
use crate::workspace::{Workspace, WorkspaceError};

/// Limits every compile step starts from, before language overrides
fn default_compile_limits() -> ResourceLimits {
    ResourceLimits::unset()
        .with_time_limit_ms(20_000)
        .with_memory_limit_mb(1024)
        .with_max_processes(256)
}

impl Judge {
    /// Run one function invocation and classify the outcome
    ///
    /// Judged failures (compile errors, crashes, timeouts) come back as an
    /// `Ok` result carrying the verdict. Errors are reserved for bad requests
    /// and host failures.
    ///
    /// The workspace and containers belong to a spawned task, so dropping
    /// this future still kills and removes everything it started.
    #[instrument(skip_all, fields(language = %request.language, function = %request.function_name))]
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, JudgeError> {
        let language = self.language(&request.language)?;
        if request.time_limit_ms == Some(0) {
            return Err(JudgeError::Request(
                "time limit must be greater than zero".to_owned(),
            ));
        }

        let driver = match driver::synthesize(
            language.driver,
            &request.source_code,
            &request.function_name,
            &request.args,
        ) {
            Ok(driver) => driver,
            Err(err) => {
                debug!(%err, "driver synthesis failed");
                return Ok(ExecutionResult::failure(
                    Verdict::CompileError,
                    vec![err.to_string()],
                ));
            }
        };

        self.runtime.ensure_image(&language.image).await?;

        let judge = self.clone();
        let language = language.clone();
        let time_limit_ms = request.time_limit_ms;
        let run = tokio::spawn(
            async move { judge.run_staged(&language, &driver, time_limit_ms).await }
                .instrument(Span::current()),
        );
        let result = run.await.map_err(HostError::Task)??;

        debug!(
            status = %result.status,
            runtime_ms = result.runtime_ms,
            "execution complete"
        );
        Ok(result)
    }

    /// Stage `driver` in a fresh workspace and run it there
    async fn run_staged(
        &self,
        language: &Language,
        driver: &Driver,
        time_limit_ms: Option<u64>,
    ) -> Result<ExecutionResult, JudgeError> {
        let workspace = Workspace::create(&self.config.workspace_root())?;
        let result = self
            .run_in_workspace(&workspace, language, driver, time_limit_ms)
            .await;
        if let Err(err) = workspace.close() {
            warn!(%err, "failed to remove workspace");
        }
        result
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        language: &Language,
        driver: &Driver,
        time_limit_ms: Option<u64>,
    ) -> Result<ExecutionResult, JudgeError> {
        workspace.write_driver(driver).await?;
        let user = self.container_user(workspace)?;
        let binary = language.binary_name(&driver.entry_file);

        if let Some(compile) = &language.compile {
            let limits = self.compile_limits(compile);
            let command = Language::expand_command(&compile.command, &driver.entry_file, binary);
            let spec = self.container_spec(workspace, language, command, &compile.env, &limits, user.clone());
            let outcome = run_supervised(&self.runtime, &spec, &limits).await?;
            if let Some(failure) = compile_failure(outcome, &limits) {
                return Ok(failure);
            }
        }

        let limits = self.run_limits(language, time_limit_ms);
        let command = Language::expand_command(&language.run.command, &driver.entry_file, binary);
        let spec = self.container_spec(workspace, language, command, &language.run.env, &limits, user);
        let outcome = run_supervised(&self.runtime, &spec, &limits).await?;

        Ok(classify(outcome, &limits, driver))
    }

    /// Defaults, then compile defaults, then the language's compile limits
    fn compile_limits(&self, compile: &CompileConfig) -> ResourceLimits {
        let base = self
            .config
            .effective_limits(Some(&default_compile_limits()));
        match &compile.limits {
            Some(limits) => base.with_overrides(limits),
            None => base,
        }
    }

    /// Defaults, then the language's run limits, then the request's time limit
    fn run_limits(&self, language: &Language, time_limit_ms: Option<u64>) -> ResourceLimits {
        let limits = self.config.effective_limits(language.run.limits.as_ref());
        match time_limit_ms {
            Some(ms) => limits.with_time_limit_ms(ms),
            None => limits,
        }
    }

    fn container_spec(
        &self,
        workspace: &Workspace,
        language: &Language,
        command: Vec<String>,
        env: &HashMap<String, String>,
        limits: &ResourceLimits,
        user: Option<String>,
    ) -> ContainerSpec {
        ContainerSpec::new(
            ContainerName::generate(&self.config.docker.container_prefix),
            &language.image,
            command,
            WorkspaceMount::new(workspace.path()),
        )
        .with_limits(limits)
        .with_env(env)
        .with_user(user)
    }

    #[cfg(unix)]
    fn container_user(&self, workspace: &Workspace) -> Result<Option<String>, WorkspaceError> {
        if !self.config.docker.run_as_workspace_owner {
            return Ok(None);
        }
        let (uid, gid) = workspace.owner()?;
        Ok(Some(format!("{uid}:{gid}")))
    }

    #[cfg(not(unix))]
    fn container_user(&self, _workspace: &Workspace) -> Result<Option<String>, WorkspaceError> {
        Ok(None)
    }
}

/// `None` when compilation succeeded
fn compile_failure(outcome: RunOutcome, limits: &ResourceLimits) -> Option<ExecutionResult> {
    let code = match outcome.exit {
        Exit::Exited(0) => return None,
        Exit::Exited(code) => code,
        Exit::TimedOut => {
            let mut result = ExecutionResult::failure(
                Verdict::CompileError,
                vec![format!(
                    "compilation timed out after {} ms",
                    duration_ms(outcome.elapsed)
                )],
            );
            result.runtime_ms = duration_ms(outcome.elapsed);
            return Some(result);
        }
    };

    let mut lines = output_lines(&outcome.output.stdout);
    lines.extend(output_lines(&outcome.output.stderr));
    if outcome.oom_killed {
        lines.push(memory_exceeded(limits));
    }
    lines.push(format!("compiler exited with code {code}"));

    let mut result = ExecutionResult::failure(Verdict::CompileError, lines);
    result.runtime_ms = duration_ms(outcome.elapsed);
    Some(result)
}

/// Map a finished run onto a verdict
fn classify(outcome: RunOutcome, limits: &ResourceLimits, driver: &Driver) -> ExecutionResult {
    let runtime_ms = duration_ms(outcome.elapsed);
    let code = match outcome.exit {
        Exit::Exited(code) => code,
        Exit::TimedOut => {
            return ExecutionResult {
                success: false,
                status: Verdict::TimeLimitExceeded,
                stdout: None,
                stderr_lines: vec![format!("time limit of {runtime_ms} ms exceeded")],
                runtime_ms,
                memory_mb: 0,
            };
        }
    };

    let ContainerOutput {
        stdout,
        stderr,
        truncated,
    } = outcome.output;
    let (result_line, earlier) = split_result_line(&stdout);
    let setup_failed = !outcome.oom_killed && driver.is_setup_failure(code, &stderr);
    let stderr = driver.strip_setup_marker(&stderr);

    let (status, result_line, mut lines) = match (outcome.oom_killed, code, result_line) {
        (false, 0, Some(line)) => (Verdict::Accepted, Some(line), earlier),
        _ if setup_failed => (Verdict::CompileError, None, output_lines(&stdout)),
        _ => (Verdict::RuntimeError, None, output_lines(&stdout)),
    };

    lines.extend(output_lines(&stderr));
    if truncated {
        lines.push(format!(
            "output truncated to {} KB",
            limits.max_output_kb.unwrap_or_default()
        ));
    }
    if outcome.oom_killed {
        lines.push(memory_exceeded(limits));
    } else if status == Verdict::RuntimeError {
        lines.push(match code {
            0 => "no result was printed".to_owned(),
            code => format!("process exited with code {code}"),
        });
    }

    ExecutionResult {
        success: status.is_accepted(),
        status,
        stdout: result_line,
        stderr_lines: lines,
        runtime_ms,
        memory_mb: 0,
    }
}

/// The last non-empty line, and every line printed before it
fn split_result_line(stdout: &str) -> (Option<String>, Vec<String>) {
    let mut lines: Vec<&str> = stdout.lines().collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let result = lines.pop().map(|line| line.trim().to_owned());
    (result, lines.into_iter().map(str::to_owned).collect())
}

fn output_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

fn memory_exceeded(limits: &ResourceLimits) -> String {
    match limits.memory_limit_mb {
        Some(mb) => format!("memory limit exceeded ({mb} MB)"),
        None => "memory limit exceeded".to_owned(),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
