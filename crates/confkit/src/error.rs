//! Error types for configuration documents.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, merging or writing a config document.
#[derive(Debug, Error)]
pub enum Error {
    /// `merge` was called before a base document was loaded.
    #[error("cannot merge {file} without a base document, load one first")]
    NoBase {
        /// Config file name
        file: String,
    },

    /// A key was both extended and removed.
    #[error("config key '{key}' is both extended and removed")]
    ConflictingKey {
        /// The offending key
        key: String,
    },

    /// The base document could not be parsed.
    #[error("failed to parse {file}: {message}")]
    Parse {
        /// Config file name
        file: String,
        /// Parser message
        message: String,
    },

    /// The config file name is not a known Hadoop config file.
    #[error("unknown config file: {0}")]
    UnknownFile(String),

    /// Reading or writing a document failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(file: &str, message: impl ToString) -> Self {
        Self::Parse {
            file: file.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for config document operations.
pub type Result<T> = std::result::Result<T, Error>;
