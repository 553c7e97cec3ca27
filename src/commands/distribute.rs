use anyhow::{Result, bail};
use clusterkit::HadoopDir;
use std::path::PathBuf;

use super::{load_config, open_cluster};
use crate::Context;
use crate::cli::DistributeArgs;
use crate::ui;

pub fn run(ctx: &Context, args: DistributeArgs) -> Result<()> {
    let files = pair_files(&args.sources, &args.dests)?;
    if files.is_empty() && args.modules.is_empty() {
        bail!("Nothing to distribute, pass --source/--dest pairs or --module");
    }

    let config = load_config(ctx)?;
    let cluster = open_cluster(ctx, &config)?;
    for (source, dest) in &files {
        if !source.exists() {
            bail!("Local file {} does not exist", source.display());
        }
        cluster.distribute(&args.selector, source, dest)?;
    }

    if !args.modules.is_empty() {
        let mut hadoop = HadoopDir::new(config.hadoop_dir()?);
        hadoop.add_modules(&args.modules, true);
        cluster.replace_module_jars(&args.selector, &hadoop)?;
    }

    ui::success(&format!(
        "Distributed {} files and {} module jars",
        files.len(),
        args.modules.len()
    ));
    Ok(())
}

fn pair_files(sources: &[PathBuf], dests: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
    if sources.len() != dests.len() {
        bail!(
            "Every source must map to a destination. Sources: {} Destinations: {}",
            sources.len(),
            dests.len()
        );
    }
    Ok(sources.iter().cloned().zip(dests.iter().cloned()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_files_keeps_order() {
        let sources = vec![PathBuf::from("a.jar"), PathBuf::from("b.xml")];
        let dests = vec![PathBuf::from("/opt/a.jar"), PathBuf::from("/etc/b.xml")];
        let pairs = pair_files(&sources, &dests).unwrap();
        assert_eq!(pairs[1], (PathBuf::from("b.xml"), PathBuf::from("/etc/b.xml")));
    }

    #[test]
    fn test_pair_files_mismatch() {
        assert!(pair_files(&[PathBuf::from("a")], &[]).is_err());
    }
}
