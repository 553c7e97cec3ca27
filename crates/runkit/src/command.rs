//! The [`Command`] type and its variants.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::handle::{self, AsyncOptions, CommandHandle};
use crate::shell::{quote, split_lines};

/// Line buffer shared between a command and its output readers.
pub(crate) type Lines = Arc<Mutex<Vec<String>>>;

pub(crate) fn lock(lines: &Lines) -> MutexGuard<'_, Vec<String>> {
    lines.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The role a command acts on, used to attribute its output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Role name
    pub role: String,
    /// Host address of the role
    pub host: String,
}

impl Target {
    /// Create a new target.
    pub fn new(role: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} | {}]", self.role, self.host)
    }
}

/// Where a command's shell runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shell {
    /// `bash -c` on this machine
    Local,
    /// `bash -c` on another machine, reached with `ssh user@host`
    Remote {
        /// Login user
        user: String,
        /// Host name or address
        host: String,
        /// Run a login shell (`bash -l`) so profile scripts set up the environment
        login: bool,
    },
}

/// Extra information carried by a command that fetches a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Destination the caller asked for (file or directory)
    pub dest: PathBuf,
    /// Where the fetched file ends up locally
    pub local_file: PathBuf,
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Non-empty standard output lines
    pub stdout: Vec<String>,
    /// Non-empty standard error lines
    pub stderr: Vec<String>,
}

/// A runnable unit of shell work with captured output.
///
/// Two commands are equal when their text, working directory, prefix and
/// target match; captured output does not take part in identity.
pub struct Command {
    text: String,
    work_dir: PathBuf,
    target: Option<Target>,
    prefix: Option<String>,
    hooks: Vec<String>,
    shell: Shell,
    download: Option<Download>,
    stdout: Lines,
    stderr: Lines,
}

impl Command {
    /// Create a command that runs locally in the current directory.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            work_dir: PathBuf::from("."),
            target: None,
            prefix: None,
            hooks: Vec::new(),
            shell: Shell::Local,
            download: None,
            stdout: Lines::default(),
            stderr: Lines::default(),
        }
    }

    /// Create a command that runs on `host` as `user` over SSH, in a login shell.
    pub fn remote(text: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        let mut cmd = Self::new(text);
        cmd.shell = Shell::Remote {
            user: user.into(),
            host: host.into(),
            login: true,
        };
        cmd
    }

    /// Set the working directory (local commands only).
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Attribute this command's output to a role.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Prepend a prefix (e.g. `sudo -u yarn`) to the command text.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.trim().is_empty()).then_some(prefix);
        self
    }

    /// Commands run before the real one, joined with `&&`.
    pub fn with_hooks(mut self, hooks: Vec<String>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Toggle the login-shell switch of a remote command.
    pub fn login_shell(mut self, login: bool) -> Self {
        if let Shell::Remote { login: l, .. } = &mut self.shell {
            *l = login;
        }
        self
    }

    /// Mark this command as a file download ending up at `local_file`.
    pub fn into_download(mut self, dest: impl Into<PathBuf>, local_file: impl Into<PathBuf>) -> Self {
        self.download = Some(Download {
            dest: dest.into(),
            local_file: local_file.into(),
        });
        self
    }

    /// The bare command text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Working directory of a local command.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Role this command acts on.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Command prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Pre-hook commands.
    pub fn hooks(&self) -> &[String] {
        &self.hooks
    }

    /// Where the shell runs.
    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Download information, for file-fetching commands.
    pub fn download(&self) -> Option<&Download> {
        self.download.as_ref()
    }

    /// Snapshot of standard output captured so far.
    pub fn stdout(&self) -> Vec<String> {
        lock(&self.stdout).clone()
    }

    /// Snapshot of standard error captured so far.
    pub fn stderr(&self) -> Vec<String> {
        lock(&self.stderr).clone()
    }

    /// The shell script actually executed: hooks, then the prefixed text.
    pub fn script(&self) -> String {
        let main = match &self.prefix {
            Some(prefix) => format!("{prefix} {}", self.text),
            None => self.text.clone(),
        };
        if self.hooks.is_empty() {
            return main;
        }
        let mut parts = self.hooks.clone();
        parts.push(main);
        parts.join(" && ")
    }

    /// The full command line as it would be typed on this machine.
    pub fn invocation(&self) -> String {
        match &self.shell {
            Shell::Local => self.script(),
            Shell::Remote { user, host, login } => {
                format!("ssh {user}@{host} {}", quote(&remote_shell(&self.script(), *login)))
            }
        }
    }

    /// Run the command to completion and return its output.
    ///
    /// Fails with [`Error::Execution`] on a non-zero exit; captured output is
    /// kept in the error and in this command's buffers.
    pub fn run(&self) -> Result<Output> {
        log::debug!("Running command {}", self.invocation());

        let output = self
            .process()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                command: self.script(),
                source,
            })?;

        let stdout = split_lines(&String::from_utf8_lossy(&output.stdout));
        let stderr = split_lines(&String::from_utf8_lossy(&output.stderr));
        lock(&self.stdout).extend(stdout.iter().cloned());
        lock(&self.stderr).extend(stderr.iter().cloned());

        if !output.status.success() {
            return Err(Error::Execution {
                command: self.script(),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(Output { stdout, stderr })
    }

    /// Start the command without blocking the caller.
    ///
    /// Every output line is captured into this command's buffers and handed
    /// to the callbacks in `options` (or logged when none are given). With
    /// `options.block` set the call waits up to `options.timeout` before
    /// returning the handle.
    pub fn run_async(&self, options: AsyncOptions) -> Result<CommandHandle> {
        log::debug!(
            "Running command asynchronously {} (blocking: {})",
            self.invocation(),
            options.block
        );
        handle::spawn(self, options)
    }

    pub(crate) fn process(&self) -> Process {
        match &self.shell {
            Shell::Local => {
                let mut process = Process::new("bash");
                process.arg("-c").arg(self.script()).current_dir(&self.work_dir);
                process
            }
            Shell::Remote { user, host, login } => {
                let mut process = Process::new("ssh");
                process
                    .arg(format!("{user}@{host}"))
                    .arg(remote_shell(&self.script(), *login));
                process
            }
        }
    }

    pub(crate) fn buffers(&self) -> (Lines, Lines) {
        (Arc::clone(&self.stdout), Arc::clone(&self.stderr))
    }

    fn key(&self) -> (&str, &Path, Option<&str>, Option<&Target>) {
        (&self.text, &self.work_dir, self.prefix.as_deref(), self.target.as_ref())
    }
}

/// `bash [-l] -c '<script>'` as passed to the remote side of `ssh`.
fn remote_shell(script: &str, login: bool) -> String {
    let switches = if login { "-l -c" } else { "-c" };
    format!("bash {switches} {}", quote(script))
}

impl Clone for Command {
    /// Clones get their own output buffers, seeded with what was captured so far.
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            work_dir: self.work_dir.clone(),
            target: self.target.clone(),
            prefix: self.prefix.clone(),
            hooks: self.hooks.clone(),
            shell: self.shell.clone(),
            download: self.download.clone(),
            stdout: Arc::new(Mutex::new(self.stdout())),
            stderr: Arc::new(Mutex::new(self.stderr())),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("work_dir", &self.work_dir)
            .field("target", &self.target)
            .field("prefix", &self.prefix)
            .field("shell", &self.shell)
            .field("download", &self.download)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.invocation())
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
