//! Driver synthesis
//!
//! A driver is a small entry program, generated per execution, that loads the
//! user's source, locates the requested function, calls it with the decoded
//! arguments and prints the JSON encoding of the result as the last line of
//! stdout. Anything the user code prints is redirected to stderr so it cannot
//! be mistaken for the result.
//!
//! Exit codes shared by every driver:
//!
//! * `0`: the function returned and its result was printed
//! * `1`: the user code raised or crashed while running
//! * [`SETUP_FAILURE_EXIT_CODE`]: the source failed to load or the function
//!   could not be found
//!
//! User code can exit with any code it likes, so the setup exit code only
//! counts when the driver also printed its [`Driver::setup_marker`] to
//! stderr. The typed drivers resolve everything before compiling and never
//! report setup failures at run time.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DriverKind;

mod cpp;
mod java;
mod javascript;
mod python;
pub mod signature;

/// Exit code of a driver that never reached the user function
pub const SETUP_FAILURE_EXIT_CODE: i64 = 3;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid function name '{0}'")]
    InvalidFunctionName(String),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    #[error("could not invoke method '{name}': {reason}")]
    NotInvocable { name: String, reason: String },

    #[error("failed to encode arguments: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A file to place in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Generated program plus the user source it wraps
#[derive(Debug, Clone)]
pub struct Driver {
    /// File substituted for `{source}` in the language commands
    pub entry_file: String,
    /// Every file to write, entry file included
    pub files: Vec<SourceFile>,
    /// Line printed to stderr right before a setup failure exit
    pub setup_marker: Option<String>,
}

impl Driver {
    /// Whether an exit with `code` and `stderr` is the driver's own setup failure
    pub fn is_setup_failure(&self, code: i64, stderr: &str) -> bool {
        code == SETUP_FAILURE_EXIT_CODE
            && self
                .setup_marker
                .as_deref()
                .is_some_and(|marker| stderr.lines().any(|line| line.trim() == marker))
    }

    /// `stderr` without the setup marker line
    pub fn strip_setup_marker(&self, stderr: &str) -> String {
        match self.setup_marker.as_deref() {
            Some(marker) => stderr
                .lines()
                .filter(|line| line.trim() != marker)
                .collect::<Vec<_>>()
                .join("\n"),
            None => stderr.to_owned(),
        }
    }

    #[cfg(test)]
    pub fn file(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|file| file.name == name)
    }

    #[cfg(test)]
    pub fn entry(&self) -> Option<&SourceFile> {
        self.file(&self.entry_file)
    }
}

/// Fresh marker for one synthesized driver
pub(crate) fn setup_marker() -> String {
    format!("codejudge-setup-{}", Uuid::new_v4().simple())
}

/// Reduce a requested function name to identifier characters.
///
/// Only ASCII letters, digits, `_` and `$` survive, so the result can be
/// embedded in any generated source without quoting.
pub fn sanitize_function_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

/// Generate the driver for `kind` around `source`
pub fn synthesize(
    kind: DriverKind,
    source: &str,
    function_name: &str,
    args: &[Value],
) -> Result<Driver, DriverError> {
    let name = sanitize_function_name(function_name);
    if name.is_empty() {
        return Err(DriverError::InvalidFunctionName(function_name.to_owned()));
    }

    match kind {
        DriverKind::Javascript => javascript::synthesize(source, &name, args),
        DriverKind::Python => python::synthesize(source, &name, args),
        DriverKind::Java => java::synthesize(source, &name, args),
        DriverKind::Cpp => cpp::synthesize(source, &name, args),
    }
}

/// Quote a JSON document as a string literal valid in JS, Python and Java
pub(crate) fn quoted_json(args: &[Value]) -> Result<String, DriverError> {
    let document = serde_json::to_string(args)?;
    Ok(serde_json::to_string(&document)?)
}

/// Shortest round-tripping decimal form of a float, always with a `.` or exponent
pub(crate) fn float_literal(value: f64) -> String {
    format!("{value:?}")
}
