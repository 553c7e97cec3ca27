//! Asynchronous command execution.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::{Command, Lines, Output, lock};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Callback invoked with every output line of an asynchronous command.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for [`Command::run_async`].
#[derive(Clone, Default)]
pub struct AsyncOptions {
    /// Called with each standard output line; logs the line when unset
    pub on_stdout: Option<LineCallback>,
    /// Called with each standard error line; logs the line when unset
    pub on_stderr: Option<LineCallback>,
    /// Wait for the command before returning its handle
    pub block: bool,
    /// Upper bound for a blocking wait
    pub timeout: Option<Duration>,
}

impl AsyncOptions {
    /// Options that wait for the command, optionally bounded by `timeout`.
    pub fn blocking(timeout: Option<Duration>) -> Self {
        Self {
            block: true,
            timeout,
            ..Self::default()
        }
    }
}

impl fmt::Debug for AsyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOptions")
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("block", &self.block)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A running (or finished) asynchronous command.
///
/// Output keeps flowing into the originating [`Command`]'s buffers while the
/// process runs.
pub struct CommandHandle {
    command: String,
    child: Child,
    readers: Vec<JoinHandle<()>>,
    stdout: Lines,
    stderr: Lines,
    status: Option<ExitStatus>,
    timed_out: Option<Duration>,
}

pub(crate) fn spawn(command: &Command, options: AsyncOptions) -> Result<CommandHandle> {
    let script = command.script();
    let mut child = command
        .process()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn {
            command: script.clone(),
            source,
        })?;

    let (stdout, stderr) = command.buffers();
    let label = command.target().map(ToString::to_string).unwrap_or_default();

    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        let callback = options.on_stdout.clone().unwrap_or_else(|| log_line(label.clone()));
        readers.push(read_lines(pipe, Arc::clone(&stdout), callback));
    }
    if let Some(pipe) = child.stderr.take() {
        let callback = options.on_stderr.clone().unwrap_or_else(|| log_line(label.clone()));
        readers.push(read_lines(pipe, Arc::clone(&stderr), callback));
    }

    let mut handle = CommandHandle {
        command: script,
        child,
        readers,
        stdout,
        stderr,
        status: None,
        timed_out: None,
    };

    if options.block {
        handle.wait(options.timeout)?;
    }
    Ok(handle)
}

fn log_line(label: String) -> LineCallback {
    Arc::new(move |line: &str| {
        if label.is_empty() {
            log::info!("{line}");
        } else {
            log::info!("{label} {line}");
        }
    })
}

fn read_lines<R: Read + Send + 'static>(pipe: R, sink: Lines, callback: LineCallback) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            lock(&sink).push(line.to_string());
            callback(line);
        }
    })
}

impl CommandHandle {
    /// Wait for the command to finish.
    ///
    /// With a timeout, a command still running when it elapses is killed and
    /// [`Error::TimedOut`] is returned with the output captured until then.
    /// Waiting again after completion (or after a timeout) returns the same
    /// verdict.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Output> {
        let status = match self.status {
            Some(_) if self.timed_out.is_some() => return Err(self.timed_out_error()),
            Some(status) => status,
            None => self.poll_until(timeout)?,
        };

        if status.success() {
            Ok(self.output())
        } else {
            let Output { stdout, stderr } = self.output();
            Err(Error::Execution {
                command: self.command.clone(),
                code: status.code(),
                stdout,
                stderr,
            })
        }
    }

    fn poll_until(&mut self, timeout: Option<Duration>) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait().map_err(|source| self.io_error(source))? {
                self.join_readers();
                self.status = Some(status);
                return Ok(status);
            }

            if let Some(limit) = timeout
                && started.elapsed() >= limit
            {
                log::warn!("Command timed out after {:.1}s: {}", limit.as_secs_f64(), self.command);
                self.terminate()?;
                self.timed_out = Some(limit);
                return Err(self.timed_out_error());
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Whether the process has exited.
    pub fn is_finished(&mut self) -> bool {
        if self.status.is_some() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.join_readers();
                self.status = Some(status);
                true
            }
            Ok(None) => false,
            Err(_) => true,
        }
    }

    /// Kill the process if it is still running.
    pub fn kill(&mut self) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        self.terminate()
    }

    /// Exit status, once the process has finished.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// The script being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Standard output captured so far.
    pub fn stdout(&self) -> Vec<String> {
        lock(&self.stdout).clone()
    }

    /// Standard error captured so far.
    pub fn stderr(&self) -> Vec<String> {
        lock(&self.stderr).clone()
    }

    fn timed_out_error(&self) -> Error {
        let Output { stdout, stderr } = self.output();
        Error::TimedOut {
            command: self.command.clone(),
            timeout: self.timed_out.unwrap_or_default(),
            stdout,
            stderr,
        }
    }

    fn output(&self) -> Output {
        Output {
            stdout: self.stdout(),
            stderr: self.stderr(),
        }
    }

    // Readers of a killed process are left detached: a grandchild may still
    // hold the pipes open.
    fn terminate(&mut self) -> Result<()> {
        self.child.kill().map_err(|source| self.io_error(source))?;
        let status = self.child.wait().map_err(|source| self.io_error(source))?;
        self.readers.clear();
        self.status = Some(status);
        Ok(())
    }

    fn join_readers(&mut self) {
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                log::warn!("Output reader of '{}' panicked, captured output may be incomplete", self.command);
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Spawn {
            command: self.command.clone(),
            source,
        }
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("command", &self.command)
            .field("pid", &self.child.id())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_async_callbacks_receive_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = AsyncOptions {
            on_stdout: Some(Arc::new(move |line: &str| {
                sink.lock().unwrap().push(line.to_uppercase());
            })),
            ..AsyncOptions::default()
        };

        let cmd = Command::new("echo alpha; echo beta");
        let mut handle = cmd.run_async(options).unwrap();
        let output = handle.wait(None).unwrap();

        assert_eq!(output.stdout, vec!["alpha", "beta"]);
        assert_eq!(*seen.lock().unwrap(), vec!["ALPHA", "BETA"]);
        assert_eq!(cmd.stdout(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_blocking_timeout_keeps_partial_output() {
        let cmd = Command::new("echo started; sleep 5");
        let started = Instant::now();
        let err = cmd
            .run_async(AsyncOptions::blocking(Some(Duration::from_secs(1))))
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.stdout(), ["started".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_wait_after_timeout_reports_timeout_again() {
        let cmd = Command::new("echo waiting; sleep 5");
        let mut handle = cmd.run_async(AsyncOptions::default()).unwrap();

        let first = handle.wait(Some(Duration::from_millis(500))).unwrap_err();
        assert!(first.is_timeout());
        assert!(handle.is_finished());

        let again = handle.wait(None).unwrap_err();
        assert!(again.is_timeout());
        assert!(matches!(again, Error::TimedOut { timeout, .. } if timeout == Duration::from_millis(500)));
    }

    #[test]
    fn test_async_nonzero_exit() {
        let cmd = Command::new("echo bad >&2; exit 2");
        let mut handle = cmd.run_async(AsyncOptions::default()).unwrap();
        let err = handle.wait(None).unwrap_err();

        assert!(!err.is_timeout());
        assert_eq!(err.stderr(), ["bad".to_string()]);
        assert!(handle.is_finished());
        // the verdict is stable
        assert!(handle.wait(None).is_err());
    }

    #[test]
    fn test_kill_running_command() {
        let cmd = Command::new("sleep 10");
        let mut handle = cmd.run_async(AsyncOptions::default()).unwrap();
        assert!(!handle.is_finished());

        handle.kill().unwrap();
        assert!(handle.is_finished());
        assert!(!handle.status().unwrap().success());
    }

    #[test]
    fn test_blocking_success_returns_finished_handle() {
        let cmd = Command::new("echo done");
        let mut handle = cmd.run_async(AsyncOptions::blocking(None)).unwrap();
        assert!(handle.is_finished());
        assert_eq!(handle.stdout(), vec!["done"]);
        assert_eq!(handle.wait(None).unwrap().stdout, vec!["done"]);
    }
}
