use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

use super::cluster;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let cluster = cluster(ctx)?;
    let title = if cluster.name().is_empty() {
        format!("Hades: {} cluster", cluster.topology().kind())
    } else {
        format!("Hades: {}", cluster.name())
    };
    ui::header(&title);

    ui::section("Status");
    let rows: Vec<(String, String)> = cluster
        .get_status()?
        .into_iter()
        .map(|entry| (entry.name, ui::status(&entry.status)))
        .collect();
    if rows.is_empty() {
        ui::dim("No components reported");
    } else {
        ui::table(&rows);
    }

    ui::section("Cluster Metrics");
    match cluster.get_metrics() {
        Ok(metrics) => {
            for (key, value) in metric_rows(&metrics) {
                ui::kv(&key, &value);
            }
        }
        Err(e) => ui::warn(&format!("Metrics unavailable: {e}")),
    }

    if !ctx.quiet {
        ui::section("Roles");
        for service in cluster.topology().services() {
            for role in cluster.topology().roles_of(service) {
                ui::kv(&role.name, &format!("{} @ {}", role.kind, role.host.id().dimmed()));
            }
        }
    }
    println!();
    Ok(())
}

/// Flat key/value rows of the scalar entries of `clusterMetrics`
fn metric_rows(metrics: &Value) -> Vec<(String, String)> {
    let Some(map) = metrics.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_rows_skip_nested_values() {
        let metrics = json!({
            "appsRunning": 2,
            "activeNodes": 3,
            "crossPartitionMetricsAvailable": true,
            "totalClusterResourcesAcrossPartition": { "memory": 24576 }
        });
        let rows = metric_rows(&metrics);
        assert_eq!(rows.len(), 3);
        assert!(rows.contains(&("appsRunning".to_string(), "2".to_string())));
        assert!(rows.iter().all(|(key, _)| key != "totalClusterResourcesAcrossPartition"));
    }

    #[test]
    fn test_metric_rows_of_non_object() {
        assert!(metric_rows(&json!([1, 2])).is_empty());
    }
}
