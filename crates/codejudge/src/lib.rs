//! A judge engine for function-style coding problems.
//!
//! Codejudge runs an untrusted submission by generating a small driver
//! program around it, executing the driver inside a disposable,
//! network-less Docker container and classifying what comes back into a
//! verdict. A test harness repeats that per test case and folds the results.
//!
//! # Features
//!
//! - **Driver synthesis** for JavaScript, Python, Java and C++, including
//!   static overload resolution for the typed languages.
//! - **Container sandboxing** with memory, CPU and process limits, dropped
//!   capabilities and no network.
//! - **Wall-clock supervision** that kills runaway containers.
//! - **TOML configuration** with per-language images, commands and limits.
//! - **HTTP API** for single executions and full submissions.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use judge::{HostError, Judge, JudgeError};
pub use sandbox::{ContainerRuntime, DockerRuntime, SandboxError};
pub use server::{ServerError, router, serve};
pub use types::{
    CaseReport, ExecutionRequest, ExecutionResult, ResourceLimits, Submission, SubmissionVerdict,
    TestCase, Verdict, Visibility,
};
pub use workspace::{Workspace, WorkspaceError};

pub mod config;
pub mod driver;
pub mod judge;
pub mod sandbox;
pub mod server;
pub mod types;
pub mod workspace;
