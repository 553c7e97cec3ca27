//! Error types for cluster operations.
//!
//! Transport failures (HTTP, JSON, YAML, subprocess) are converted into
//! these variants at the backend boundary, so callers of the orchestrator
//! only ever see domain errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during cluster operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed role selector expression.
    #[error("invalid selector expression '{0}'")]
    Selector(String),

    /// A required configuration value is missing or invalid.
    #[error("{}", render_setup(.attr, .message))]
    ConfigSetup {
        /// Name of the setting
        attr: String,
        /// What is wrong with it
        message: String,
    },

    /// A command failed, timed out, or failed on several hosts.
    #[error(transparent)]
    Command(#[from] runkit::Error),

    /// A config document could not be loaded or merged.
    #[error(transparent)]
    Config(#[from] confkit::Error),

    /// Topology discovery failed.
    #[error("{backend} discovery failed: {message}")]
    Discovery {
        /// Backend that was discovering
        backend: String,
        /// Underlying failure
        message: String,
    },

    /// A REST API answered with an error status.
    #[error("API request failed with HTTP {status}: {reason}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        reason: String,
    },

    /// A REST request could not be sent.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The backend does not implement the operation.
    #[error("operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        /// Backend name
        backend: String,
        /// Operation name
        operation: String,
    },

    /// The selector matched no roles.
    #[error("no roles found by selector '{selector}'")]
    NoRoles {
        /// Selector expression
        selector: String,
    },

    /// The OS process of a role could not be identified.
    #[error("cannot determine pid of {role}: {message}")]
    Pid {
        /// Role name
        role: String,
        /// What went wrong
        message: String,
    },

    /// Restarted roles kept their old process.
    #[error("roles were not restarted, pids unchanged: {}", .roles.join(", "))]
    RestartNotEffective {
        /// Names of the affected roles
        roles: Vec<String>,
    },

    /// Local file system failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

fn render_setup(attr: &str, message: &str) -> String {
    if attr.is_empty() {
        message.to_string()
    } else {
        format!("{attr}: {message}")
    }
}

impl Error {
    /// A missing or invalid setting.
    pub fn setup(attr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigSetup {
            attr: attr.into(),
            message: message.into(),
        }
    }

    /// An operation the backend does not implement.
    pub fn unsupported(backend: &str, operation: &str) -> Self {
        Self::Unsupported {
            backend: backend.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Wrap any failure raised while discovering a topology.
    pub fn discovery(backend: &str, err: impl std::fmt::Display) -> Self {
        Self::Discovery {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                reason: format!("HTTP {code}"),
            },
            other => Self::Http(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message() {
        assert_eq!(Error::setup("hadockPath", "not set").to_string(), "hadockPath: not set");
        assert_eq!(Error::setup("", "no backend configured").to_string(), "no backend configured");
    }

    #[test]
    fn test_command_error_is_transparent() {
        let err: Error = runkit::Error::Multi(vec![]).into();
        assert!(err.to_string().starts_with("0 commands failed"));
    }

    #[test]
    fn test_status_code_maps_to_api_error() {
        let err: Error = ureq::Error::StatusCode(404).into();
        assert!(matches!(err, Error::Api { status: 404, .. }));
    }
}
