use anyhow::{Result, anyhow};
use clusterkit::Application;
use runkit::AsyncOptions;

use super::cluster;
use crate::Context;
use crate::cli::RunAppArgs;
use crate::ui;

/// Submit an example application from a random selected role
pub fn run(ctx: &Context, args: RunAppArgs) -> Result<()> {
    let app = Application::from_name(&args.app, args.cmd, args.queue).ok_or_else(|| {
        anyhow!(
            "Unknown application '{}', expected distributed-shell or mapreduce",
            args.app
        )
    })?;
    let cluster = cluster(ctx)?;
    let cmd = cluster.run_app(&app, &args.selector, &mut rand::thread_rng())?;
    ui::info(&format!("Submitting: {}", cmd.text()));
    cmd.run_async(AsyncOptions::blocking(None))?;
    ui::success("Application finished");
    Ok(())
}
