pub mod app;
pub mod compile;
pub mod config;
pub mod discover;
pub mod distribute;
pub mod logs;
pub mod restart;
pub mod script;
pub mod status;
pub mod yarn;

use anyhow::{Context as _, Result, bail};
use clusterkit::{Cluster, ClusterManifest};
use std::collections::BTreeMap;
use std::env;

use crate::Context;
use crate::config::HadesConfig;

/// Load the config, applying the `--prefix` override
pub fn load_config(ctx: &Context) -> Result<HadesConfig> {
    let mut config = HadesConfig::load(&ctx.config_path)?;
    if let Some(prefix) = &ctx.prefix {
        config.cmd_prefix.clone_from(prefix);
    }
    Ok(config)
}

/// Open the cluster described by the manifest with the configured backend
pub fn open_cluster(ctx: &Context, config: &HadesConfig) -> Result<Cluster> {
    if !ctx.cluster_path.exists() {
        bail!(
            "Cluster manifest {} does not exist. Create one with 'hades discover'",
            ctx.cluster_path.display()
        );
    }
    let manifest = ClusterManifest::load(&ctx.cluster_path)?;
    let backend = clusterkit::backend::create(&config.cluster).context("Could not set up the cluster backend")?;
    let cluster = Cluster::from_manifest(&manifest, backend, config.command_settings())?;
    Ok(cluster.with_workdir(env::current_dir()?))
}

/// Load the config and open the cluster
pub fn cluster(ctx: &Context) -> Result<Cluster> {
    let config = load_config(ctx)?;
    open_cluster(ctx, &config)
}

/// Pair repeated `--property` and `--value` flags
pub fn pair_properties(properties: &[String], values: &[String]) -> Result<BTreeMap<String, String>> {
    if properties.len() != values.len() {
        bail!(
            "Every property must map to a value. Properties: {} Values: {}",
            properties.len(),
            values.len()
        );
    }
    Ok(properties.iter().cloned().zip(values.iter().cloned()).collect())
}
