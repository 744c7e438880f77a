use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource limits applied to one sandboxed container run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock time limit in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Hard memory ceiling in megabytes (swap is disabled)
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,

    /// CPU cap in cores, fractions allowed
    #[serde(default)]
    pub cpus: Option<f64>,

    /// Maximum number of processes/threads inside the container
    #[serde(default)]
    pub max_processes: Option<u32>,

    /// Maximum captured output per stream in kilobytes
    #[serde(default)]
    pub max_output_kb: Option<u64>,

    /// Time allowed for killing a runaway container, in milliseconds
    #[serde(default)]
    pub kill_grace_ms: Option<u64>,
}

impl ResourceLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1024;
    /// 1 megabyte in bytes
    pub const MB: u64 = 1024 * 1024;

    pub const DEFAULT_TIME_LIMIT_MS: u64 = 3000;
    pub const DEFAULT_KILL_GRACE_MS: u64 = 2000;

    /// Create new resource limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, useful as a sparse override
    pub fn unset() -> Self {
        Self {
            time_limit_ms: None,
            memory_limit_mb: None,
            cpus: None,
            max_processes: None,
            max_output_kb: None,
            kill_grace_ms: None,
        }
    }

    /// Set the wall clock time limit in milliseconds
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Set the memory limit in megabytes
    pub fn with_memory_limit_mb(mut self, mb: u64) -> Self {
        self.memory_limit_mb = Some(mb);
        self
    }

    /// Set the CPU cap in cores
    pub fn with_cpus(mut self, cpus: f64) -> Self {
        self.cpus = Some(cpus);
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: u32) -> Self {
        self.max_processes = Some(count);
        self
    }

    /// Set the maximum captured output in kilobytes
    pub fn with_max_output_kb(mut self, kb: u64) -> Self {
        self.max_output_kb = Some(kb);
        self
    }

    /// Set the kill grace period in milliseconds
    pub fn with_kill_grace_ms(mut self, ms: u64) -> Self {
        self.kill_grace_ms = Some(ms);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: overrides.time_limit_ms.or(self.time_limit_ms),
            memory_limit_mb: overrides.memory_limit_mb.or(self.memory_limit_mb),
            cpus: overrides.cpus.or(self.cpus),
            max_processes: overrides.max_processes.or(self.max_processes),
            max_output_kb: overrides.max_output_kb.or(self.max_output_kb),
            kill_grace_ms: overrides.kill_grace_ms.or(self.kill_grace_ms),
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms.unwrap_or(Self::DEFAULT_TIME_LIMIT_MS))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms.unwrap_or(Self::DEFAULT_KILL_GRACE_MS))
    }

    /// Memory ceiling in bytes, if any
    pub fn memory_bytes(&self) -> Option<i64> {
        self.memory_limit_mb
            .map(|mb| i64::try_from(mb.saturating_mul(Self::MB)).unwrap_or(i64::MAX))
    }

    /// CPU cap in units of 10^-9 CPUs, as container runtimes expect
    pub fn nano_cpus(&self) -> Option<i64> {
        self.cpus
            .filter(|cpus| *cpus > 0.0)
            .map(|cpus| (cpus * 1_000_000_000.0) as i64)
    }

    /// Output cap per stream in bytes
    pub fn max_output_bytes(&self) -> Option<usize> {
        self.max_output_kb
            .map(|kb| usize::try_from(kb.saturating_mul(Self::KB)).unwrap_or(usize::MAX))
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(Self::DEFAULT_TIME_LIMIT_MS),
            memory_limit_mb: Some(256),
            cpus: Some(1.0),
            max_processes: Some(64),
            max_output_kb: Some(1024),
            kill_grace_ms: Some(Self::DEFAULT_KILL_GRACE_MS),
        }
    }
}

/// Terminal classification of an execution or a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RuntimeError,
    CompileError,
    InternalError,
}

impl Verdict {
    /// Rank used when folding several case verdicts into one.
    ///
    /// Higher wins: internal errors dominate everything, accepted loses to any failure.
    pub fn severity(self) -> u8 {
        match self {
            Verdict::Accepted => 0,
            Verdict::WrongAnswer => 1,
            Verdict::RuntimeError => 2,
            Verdict::TimeLimitExceeded => 3,
            Verdict::CompileError => 4,
            Verdict::InternalError => 5,
        }
    }

    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "ACCEPTED",
            Verdict::WrongAnswer => "WRONG_ANSWER",
            Verdict::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Verdict::RuntimeError => "RUNTIME_ERROR",
            Verdict::CompileError => "COMPILE_ERROR",
            Verdict::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of a user function with positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    /// Language ID as configured (e.g. "python")
    pub language: String,

    /// User source code
    pub source_code: String,

    /// Name of the function to call, sanitized before use
    pub function_name: String,

    /// Positional arguments, in declared parameter order
    pub args: Vec<Value>,

    /// Wall clock limit overriding the configured default
    pub time_limit_ms: Option<u64>,
}

impl ExecutionRequest {
    pub const DEFAULT_FUNCTION_NAME: &'static str = "solve";

    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            function_name: Self::DEFAULT_FUNCTION_NAME.to_owned(),
            args: Vec::new(),
            time_limit_ms: None,
        }
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }
}

/// Outcome of a single execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the program ran to completion and exited cleanly
    pub success: bool,

    pub status: Verdict,

    /// The serialized result line printed by the driver
    pub stdout: Option<String>,

    /// Diagnostics: user prints, stderr lines, compiler output
    pub stderr_lines: Vec<String>,

    /// Wall clock runtime in milliseconds (the limit itself on timeout)
    pub runtime_ms: u64,

    /// Best-effort peak memory in megabytes, 0 if unmeasured
    pub memory_mb: u64,
}

impl ExecutionResult {
    /// A result for a run that never produced judged output
    pub fn failure(status: Verdict, lines: Vec<String>) -> Self {
        Self {
            success: false,
            status,
            stdout: None,
            stderr_lines: lines,
            runtime_ms: 0,
            memory_mb: 0,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success && self.status.is_accepted()
    }
}

/// Whether a test case is shown to the submitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Hidden,
}

/// A test case authored for a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Positional arguments for the function
    pub inputs: Vec<Value>,

    /// Expected return value; `None` marks a free run that is never compared
    #[serde(default)]
    pub expected_output: Option<Value>,

    #[serde(default)]
    pub visibility: Visibility,
}

impl TestCase {
    pub fn new(inputs: Vec<Value>, expected_output: Option<Value>) -> Self {
        Self {
            inputs,
            expected_output,
            visibility: Visibility::Public,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visibility = Visibility::Hidden;
        self
    }

    #[must_use]
    pub fn is_free_run(&self) -> bool {
        self.expected_output.is_none()
    }
}

/// One source judged against every test case of a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub language: String,

    #[serde(rename = "code")]
    pub source_code: String,

    #[serde(default = "default_function_name")]
    pub function_name: String,

    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    pub test_cases: Vec<TestCase>,
}

impl Submission {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            function_name: default_function_name(),
            time_limit_ms: None,
            test_cases: Vec::new(),
        }
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_test_case(mut self, case: TestCase) -> Self {
        self.test_cases.push(case);
        self
    }

    /// The single execution for `case`
    pub fn request_for(&self, case: &TestCase) -> ExecutionRequest {
        ExecutionRequest {
            language: self.language.clone(),
            source_code: self.source_code.clone(),
            function_name: self.function_name.clone(),
            args: case.inputs.clone(),
            time_limit_ms: self.time_limit_ms,
        }
    }
}

fn default_function_name() -> String {
    ExecutionRequest::DEFAULT_FUNCTION_NAME.to_owned()
}

/// Judged outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
    /// Position of the case in author order
    pub index: usize,
    pub visibility: Visibility,
    pub passed: bool,
    pub result: ExecutionResult,
}

/// Aggregate verdict over all test cases of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionVerdict {
    pub verdict: Verdict,
    pub passed_count: usize,
    pub total_count: usize,
    pub average_runtime_ms: u64,
    pub per_case: Vec<CaseReport>,
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn with_overrides_identity(
            time in proptest::option::of(0u64..100_000),
            memory in proptest::option::of(0u64..100_000),
            cpus in proptest::option::of(0.0f64..64.0),
            procs in proptest::option::of(0u32..1000),
            output in proptest::option::of(0u64..1_000_000),
            grace in proptest::option::of(0u64..10_000),
        ) {
            let base = ResourceLimits {
                time_limit_ms: time,
                memory_limit_mb: memory,
                cpus,
                max_processes: procs,
                max_output_kb: output,
                kill_grace_ms: grace,
            };

            let result = base.with_overrides(&ResourceLimits::unset());
            prop_assert_eq!(result, base);
        }

        #[test]
        fn with_overrides_full_override(
            base_time in proptest::option::of(0u64..100_000),
            override_time in 0u64..100_000,
        ) {
            let base = ResourceLimits {
                time_limit_ms: base_time,
                ..Default::default()
            };
            let overrides = ResourceLimits::unset().with_time_limit_ms(override_time);

            let result = base.with_overrides(&overrides);
            prop_assert_eq!(result.time_limit_ms, Some(override_time));
        }

        #[test]
        fn memory_bytes_never_panics(mb in any::<u64>()) {
            let _ = ResourceLimits::unset().with_memory_limit_mb(mb).memory_bytes();
        }
    }
}
