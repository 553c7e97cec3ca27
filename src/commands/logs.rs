use anyhow::{Result, bail};
use clusterkit::ReadLogOptions;
use runkit::{AsyncOptions, Command, LineCallback};
use std::sync::Arc;

use super::cluster;
use crate::Context;
use crate::cli::LogArgs;
use crate::ui;

/// Read the logs of every selected role at once
pub fn run(ctx: &Context, args: LogArgs) -> Result<()> {
    let cluster = cluster(ctx)?;
    let options = ReadLogOptions {
        follow: args.follow,
        tail: args.tail,
        download: args.download,
    };
    let cmds = cluster.read_logs(&args.selector, &options)?;
    if cmds.is_empty() {
        bail!("No roles found by selector '{}'", args.selector);
    }

    let mut handles = Vec::with_capacity(cmds.len());
    for cmd in &cmds {
        handles.push(cmd.run_async(async_options(cmd, args.grep.as_deref()))?);
    }

    let mut failures = Vec::new();
    for mut handle in handles {
        if let Err(e) = handle.wait(None) {
            log::warn!("{e}");
            failures.push(e);
        }
    }

    if args.download {
        ui::success(&format!("Downloaded {} log files", cmds.len() - failures.len()));
    }
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0).into()),
        _ => Err(runkit::Error::Multi(failures).into()),
    }
}

/// Default line logging, or a filter passing only lines containing `grep`
fn async_options(cmd: &Command, grep: Option<&str>) -> AsyncOptions {
    let Some(pattern) = grep else {
        return AsyncOptions::default();
    };
    let callback = grep_callback(
        cmd.target().map(ToString::to_string).unwrap_or_default(),
        pattern.to_string(),
    );
    AsyncOptions {
        on_stdout: Some(Arc::clone(&callback)),
        on_stderr: Some(callback),
        ..AsyncOptions::default()
    }
}

fn grep_callback(label: String, pattern: String) -> LineCallback {
    Arc::new(move |line: &str| {
        if line.contains(&pattern) {
            log::info!("{label} {line}");
        }
    })
}
