use anyhow::{Context as _, Result};
use clusterkit::{ClusterKind, ClusterManifest, ClusterSettings};

use super::load_config;
use crate::Context;
use crate::cli::{ClusterType, DiscoverArgs};
use crate::config::HadesConfig;
use crate::ui;

/// Create an empty config file unless one exists
pub fn init(ctx: &Context) -> Result<()> {
    if ctx.config_path.exists() {
        ui::info(&format!("Config {} already exists", ctx.config_path.display()));
        return Ok(());
    }
    HadesConfig::default().save(&ctx.config_path)?;
    ui::success(&format!("Initialized config file {}", ctx.config_path.display()));
    Ok(())
}

/// Discover the cluster and write the manifest
pub fn run(ctx: &Context, args: DiscoverArgs) -> Result<()> {
    let mut config = load_config(ctx)?;
    apply_args(&mut config.cluster, &args);

    let backend = clusterkit::backend::create(&config.cluster).context("Could not set up the cluster backend")?;
    let manifest = backend.discover()?;
    manifest.save(&ctx.cluster_path)?;

    if args.save {
        config.save(&ctx.config_path)?;
        ui::info(&format!("Saved cluster settings to {}", ctx.config_path.display()));
    }

    ui::success(&format!(
        "Discovered {} roles of {} cluster '{}', written to {}",
        manifest.role_count(),
        manifest.cluster_type,
        manifest.cluster_name,
        ctx.cluster_path.display()
    ));
    if ctx.verbose > 0 && !ctx.quiet {
        print_manifest(&manifest);
    }
    Ok(())
}

fn apply_args(settings: &mut ClusterSettings, args: &DiscoverArgs) {
    if let Some(kind) = args.cluster_type {
        settings.kind = match kind {
            ClusterType::Cm => ClusterKind::Cm,
            ClusterType::Hadock => ClusterKind::Hadock,
            ClusterType::Standard => ClusterKind::Standard,
        };
    }
    if let Some(host) = &args.host {
        match settings.kind {
            ClusterKind::Cm => settings.cm_host = Some(host.clone()),
            _ => settings.rm_address = Some(host.clone()),
        }
    }
    if args.username.is_some() {
        settings.cm_username.clone_from(&args.username);
    }
    if args.password.is_some() {
        settings.cm_password.clone_from(&args.password);
    }
    if let Some(path) = &args.hadock_path {
        settings.hadock_path = Some(shellexpand::tilde(path).into_owned());
    }
}

fn print_manifest(manifest: &ClusterManifest) {
    for (key, service) in &manifest.context {
        ui::section(&format!("{key} ({})", service.name));
        let rows: Vec<(String, String)> = service
            .roles
            .iter()
            .map(|(name, role)| (name.clone(), format!("{} @ {}", role.kind, role.host)))
            .collect();
        ui::table(&rows);
    }
}
