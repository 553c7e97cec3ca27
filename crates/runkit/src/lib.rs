//! # runkit
//!
//! The command execution primitive used by every cluster operation.
//!
//! A [`Command`] is a piece of shell text plus the context needed to run it:
//! a working directory, an optional SSH destination, an optional command
//! prefix and pre-hooks, and the role it acts on. Output is captured line by
//! line into the command's own buffers whichever way it is run.
//!
//! ## Example
//!
//! ```no_run
//! use runkit::{AsyncOptions, Command};
//! use std::time::Duration;
//!
//! // Blocking run
//! let cmd = Command::new("uname -a");
//! let output = cmd.run().expect("uname failed");
//! println!("{}", output.stdout.join("\n"));
//!
//! // Streaming run against a remote host, bounded by a timeout
//! let tail = Command::remote("tail -f /opt/hadoop/logs/*resourcemanager*log", "yarn", "rm-1");
//! let result = tail.run_async(AsyncOptions::blocking(Some(Duration::from_secs(10))));
//! if let Err(e) = result {
//!     assert!(e.is_timeout());
//!     println!("captured {} lines before timing out", e.stdout().len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod handle;
pub mod shell;

pub use command::{Command, Download, Output, Shell, Target};
pub use error::{Error, Result};
pub use handle::{AsyncOptions, CommandHandle, LineCallback};
pub use shell::quote;
