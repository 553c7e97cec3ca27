#![allow(dead_code)]

use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Tables
// ============================================================================

/// Render rows as two aligned columns
pub fn columns(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(left, _)| left.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, right)| format!("{left:<width$}  {right}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print rows as two aligned columns
pub fn table(rows: &[(String, String)]) {
    for line in columns(rows).lines() {
        println!("  {line}");
    }
}

/// Colour a health or container status
pub fn status(value: &str) -> String {
    let upper = value.to_uppercase();
    if upper == "GOOD" || upper.starts_with("UP") || upper == "RUNNING" {
        value.green().to_string()
    } else if upper == "CONCERNING" || upper.contains("RESTARTING") || upper == "UNHEALTHY" {
        value.yellow().to_string()
    } else if upper == "UNKNOWN" || upper.is_empty() {
        value.dimmed().to_string()
    } else {
        value.red().to_string()
    }
}
