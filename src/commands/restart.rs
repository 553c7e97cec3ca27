use anyhow::{Result, bail};
use dialoguer::Confirm;
use rayon::prelude::*;
use runkit::Command;

use super::cluster;
use crate::Context;
use crate::cli::RestartArgs;
use crate::ui;

pub fn run(ctx: &Context, args: RestartArgs) -> Result<()> {
    let cluster = cluster(ctx)?;

    if args.all {
        let confirmed = args.yes
            || Confirm::new()
                .with_prompt(format!("Restart every role of the {} cluster?", cluster.topology().kind()))
                .default(false)
                .interact()?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
        cluster.restart()?;
        ui::success("Cluster restarted");
        return Ok(());
    }

    if args.guarantee {
        cluster.restart_with_guarantee(&args.selector, args.sleep)?;
        ui::success("Roles restarted with new processes");
        return Ok(());
    }

    let cmds = cluster.restart_roles(&args.selector)?;
    let total = cmds.len();
    let failures = run_all(&cmds);
    if !failures.is_empty() {
        for e in &failures {
            ui::error(&e.to_string());
        }
        bail!(runkit::Error::Multi(failures));
    }
    if total > 0 {
        ui::success(&format!("Restarted {total} roles"));
    } else {
        ui::success("Restart requested");
    }
    Ok(())
}

/// Run every command in parallel, returning the failures
fn run_all(cmds: &[Command]) -> Vec<runkit::Error> {
    cmds.par_iter().filter_map(|cmd| cmd.run().err()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_all_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cmds: Vec<Command> = ["true", "exit 3", "echo ok", "exit 1"]
            .into_iter()
            .map(|text| Command::new(text).with_work_dir(dir.path()))
            .collect();

        let failures = run_all(&cmds);
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|e| matches!(e, runkit::Error::Execution { .. })));
        assert_eq!(cmds[2].stdout(), vec!["ok".to_string()]);
    }
}
