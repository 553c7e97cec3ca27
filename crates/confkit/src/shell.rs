//! Shell scripts sourced by the Hadoop launchers, such as `yarn-env.sh`.
//!
//! Scripts are treated as ordered lines. Merging drops lines assigning a
//! removed key and appends new assignments below a single `#EXTENSION`
//! marker, skipping any assignment already present verbatim, so repeated
//! updates leave the script unchanged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::document::{ConfigDocument, Overlay, no_base};
use crate::error::Result;
use crate::file::ConfigFile;

/// Separator between hand-written lines and generated assignments.
pub const EXTENSION_MARKER: &str = "#EXTENSION";

/// `(key, value)` of an assignment line such as `export YARN_OPTS="-Xmx1g"`.
fn assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
    let (key, value) = line.split_once('=')?;
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some((key, value))
}

/// A shell script config file.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    file: ConfigFile,
    path: PathBuf,
    overlay: Overlay,
    base: Option<Vec<String>>,
}

impl ShellConfig {
    /// Create a document for `file` without a base.
    pub fn new(file: ConfigFile) -> Self {
        Self {
            file,
            path: PathBuf::from(file.name()),
            overlay: Overlay::default(),
            base: None,
        }
    }
}

impl ConfigDocument for ShellConfig {
    fn file(&self) -> ConfigFile {
        self.file
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    fn set_raw(&mut self, text: &str) -> Result<()> {
        self.base = Some(text.lines().map(ToString::to_string).collect());
        Ok(())
    }

    fn has_base(&self) -> bool {
        self.base.is_some()
    }

    fn merge(&mut self) -> Result<()> {
        let Self {
            file,
            overlay,
            base,
            ..
        } = self;
        let lines = base.as_mut().ok_or_else(|| no_base(*file))?;
        overlay.check()?;

        let removal = overlay.removal();
        lines.retain(|line| match assignment(line) {
            Some((key, _)) if removal.contains_key(key) => {
                log::debug!("Removing line {line}");
                false
            }
            _ => true,
        });

        let additions: Vec<String> = overlay
            .extension()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .filter(|line| !lines.contains(line))
            .collect();
        if additions.is_empty() {
            return Ok(());
        }

        if !lines.iter().any(|line| line.trim() == EXTENSION_MARKER) {
            lines.push(EXTENSION_MARKER.to_string());
        }
        for line in additions {
            log::debug!("Adding line {line}");
            lines.push(line);
        }
        Ok(())
    }

    fn to_str(&self) -> Result<String> {
        let lines = self.base.as_ref().ok_or_else(|| no_base(self.file))?;
        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    fn to_dict(&self) -> BTreeMap<String, String> {
        match &self.base {
            Some(lines) => lines
                .iter()
                .filter_map(|line| assignment(line))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            None => self.overlay.extension().clone(),
        }
    }
}
