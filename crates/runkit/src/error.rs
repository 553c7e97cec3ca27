//! Error types for command execution.
//!
//! A failed command always carries the text that was run and whatever
//! output was captured, so callers can report the failure or inspect the
//! partial output. Timeouts are a separate variant from non-zero exits:
//! callers watching an application often treat the two as different
//! verdicts.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum Error {
    /// The process exited with a non-zero status.
    #[error("command exited with {}: {command}{}", describe_code(.code), render_stderr(.stderr))]
    Execution {
        /// Command text that was run
        command: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard output lines
        stdout: Vec<String>,
        /// Captured standard error lines
        stderr: Vec<String>,
    },

    /// The process did not finish before the timeout elapsed.
    #[error("command timed out after {:.1}s: {command}", .timeout.as_secs_f64())]
    TimedOut {
        /// Command text that was run
        command: String,
        /// The timeout that elapsed
        timeout: Duration,
        /// Standard output captured before the timeout
        stdout: Vec<String>,
        /// Standard error captured before the timeout
        stderr: Vec<String>,
    },

    /// The process could not be started or waited on.
    #[error("failed to run command: {command}: {source}")]
    Spawn {
        /// Command text that was attempted
        command: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The same operation failed on several hosts.
    #[error("{} commands failed:\n{}", .0.len(), render_all(.0))]
    Multi(Vec<Error>),
}

impl Error {
    /// Whether this error is a timeout rather than a failed execution.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }

    /// The command text, if this error relates to a single command.
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Execution { command, .. }
            | Error::TimedOut { command, .. }
            | Error::Spawn { command, .. } => Some(command),
            Error::Multi(_) => None,
        }
    }

    /// Standard output captured before the failure.
    pub fn stdout(&self) -> &[String] {
        match self {
            Error::Execution { stdout, .. } | Error::TimedOut { stdout, .. } => stdout,
            _ => &[],
        }
    }

    /// Standard error captured before the failure.
    pub fn stderr(&self) -> &[String] {
        match self {
            Error::Execution { stderr, .. } | Error::TimedOut { stderr, .. } => stderr,
            _ => &[],
        }
    }

    /// The individual failures of an aggregate error (or just this one).
    pub fn failures(&self) -> Vec<&Error> {
        match self {
            Error::Multi(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

fn render_stderr(stderr: &[String]) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr.join("\n"))
    }
}

fn render_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, Error>;
