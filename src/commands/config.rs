use anyhow::{Context as _, Result, anyhow, bail};
use confkit::{ConfigDocument, ConfigFile, Overlay};
use similar::TextDiff;
use std::collections::BTreeMap;

use super::{cluster, pair_properties};
use crate::Context;
use crate::cli::{GetConfigArgs, UpdateConfigArgs};
use crate::ui;

fn parse_file(name: &str) -> Result<ConfigFile> {
    name.parse::<ConfigFile>().map_err(|_| {
        let known: Vec<&str> = ConfigFile::ALL.iter().map(ConfigFile::name).collect();
        anyhow!("Unknown config file '{name}', expected one of: {}", known.join(", "))
    })
}

fn parse_removals(removals: &[String]) -> Result<BTreeMap<String, String>> {
    removals
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("Removal '{entry}' is not in name=value form"))
        })
        .collect()
}

/// Update a config file of the selected roles
pub fn update(ctx: &Context, args: UpdateConfigArgs) -> Result<()> {
    let file = parse_file(&args.file)?;
    let mut doc = confkit::create(file);
    doc.extend_with_args(&pair_properties(&args.properties, &args.values)?);
    if let Some(source) = &args.source {
        doc.extend_with_xml(source)
            .with_context(|| format!("Could not read properties of {}", source.display()))?;
    }
    doc.remove_confs(&parse_removals(&args.removals)?);
    if doc.overlay().is_empty() {
        bail!("Nothing to update, pass --property/--value, --source or --remove");
    }
    doc.overlay().check()?;

    let cluster = cluster(ctx)?;
    if args.dry_run {
        for (role, current) in cluster.get_config(&args.selector, file)? {
            let (old, new) = preview(current.as_ref(), doc.overlay())?;
            ui::section(&role);
            print!("{}", unified_diff(&old, &new, file.name()));
        }
        return Ok(());
    }

    cluster.update_config(&args.selector, doc.as_mut(), args.no_backup, args.allow_empty)?;
    ui::success(&format!(
        "Updated {} with {} changes",
        file,
        doc.overlay().extension().len() + doc.overlay().removal().len()
    ));
    Ok(())
}

/// Print a config file of the selected roles
pub fn get(ctx: &Context, args: GetConfigArgs) -> Result<()> {
    let file = parse_file(&args.file)?;
    let cluster = cluster(ctx)?;
    for (role, doc) in cluster.get_config(&args.selector, file)? {
        ui::section(&role);
        if args.properties.is_empty() {
            println!("{}", doc.to_str()?);
            continue;
        }
        let values = doc.to_dict();
        for property in &args.properties {
            match values.get(property) {
                Some(value) => ui::kv(property, value),
                None => ui::kv(property, "<unset>"),
            }
        }
    }
    Ok(())
}

/// Current and merged text of a document
fn preview(current: &dyn ConfigDocument, overlay: &Overlay) -> Result<(String, String)> {
    let old = current.to_str()?;
    let mut merged = confkit::create(current.file());
    merged.set_raw(&old)?;
    *merged.overlay_mut() = overlay.clone();
    merged.merge()?;
    Ok((old, merged.to_str()?))
}

fn unified_diff(old: &str, new: &str, name: &str) -> String {
    if old == new {
        return "  (no changes)\n".to_string();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}
