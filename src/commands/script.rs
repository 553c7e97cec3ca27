//! Scripts: named sequences of cluster operations, picked from an explicit registry.

use anyhow::{Result, anyhow};
use clusterkit::Cluster;

use super::cluster;
use crate::Context;
use crate::cli::RunScriptArgs;
use crate::ui;

/// A named operation run against an opened cluster
pub trait Script {
    fn name(&self) -> &'static str;
    fn about(&self) -> &'static str;
    fn run(&self, cluster: &Cluster) -> Result<()>;
}

/// Every script `run-script` knows about
pub fn registry() -> Vec<Box<dyn Script>> {
    vec![Box::new(StatusScript), Box::new(RolePidsScript)]
}

fn find(name: &str) -> Result<Box<dyn Script>> {
    let scripts = registry();
    let names: Vec<&str> = scripts.iter().map(|s| s.name()).collect();
    let known = names.join(", ");
    scripts
        .into_iter()
        .find(|script| script.name() == name)
        .ok_or_else(|| anyhow!("Script '{name}' not found, registered scripts: {known}"))
}

pub fn run(ctx: &Context, args: RunScriptArgs) -> Result<()> {
    if args.list {
        ui::header("Scripts");
        for script in registry() {
            ui::kv(script.name(), script.about());
        }
        return Ok(());
    }

    let name = args.name.unwrap_or_default();
    let script = find(&name)?;
    let cluster = cluster(ctx)?;
    log::info!("Running script {}", script.name());
    script.run(&cluster)
}

// ============================================================================
// Scripts
// ============================================================================

struct StatusScript;

impl Script for StatusScript {
    fn name(&self) -> &'static str {
        "status"
    }

    fn about(&self) -> &'static str {
        "Print the status of every cluster component"
    }

    fn run(&self, cluster: &Cluster) -> Result<()> {
        for entry in cluster.get_status()? {
            println!("{}\t{}", entry.name, entry.status);
        }
        Ok(())
    }
}

struct RolePidsScript;

impl Script for RolePidsScript {
    fn name(&self) -> &'static str {
        "role-pids"
    }

    fn about(&self) -> &'static str {
        "Print the process id of every role"
    }

    fn run(&self, cluster: &Cluster) -> Result<()> {
        for (role, pid) in cluster.get_role_pids("")? {
            let pid = pid.map_or_else(|| "-".to_string(), |pid| pid.to_string());
            println!("{role}\t{pid}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_names_are_unique() {
        let scripts = registry();
        let names: HashSet<&str> = scripts.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), scripts.len());
    }

    #[test]
    fn test_find_script() {
        assert_eq!(find("status").unwrap().name(), "status");
        let err = find("netty4").err().unwrap();
        assert!(err.to_string().contains("role-pids"));
    }
}
