//! Java properties documents such as `log4j.properties`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::document::{ConfigDocument, Overlay, no_base};
use crate::error::Result;
use crate::file::ConfigFile;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String, raw: String },
    Other(String),
}

impl Line {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            return Self::Other(raw.to_string());
        }
        match trimmed.find(['=', ':']) {
            Some(at) => Self::Entry {
                key: trimmed[..at].trim().to_string(),
                value: trimmed[at + 1..].trim().to_string(),
                raw: raw.to_string(),
            },
            None => Self::Other(raw.to_string()),
        }
    }

    fn entry(key: &str, value: &str) -> Self {
        Self::Entry {
            key: key.to_string(),
            value: value.to_string(),
            raw: format!("{key}={value}"),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::Entry { raw, .. } | Self::Other(raw) => raw,
        }
    }
}

/// A properties file, kept line by line so untouched lines survive verbatim.
#[derive(Debug, Clone)]
pub struct PropertiesConfig {
    file: ConfigFile,
    path: PathBuf,
    overlay: Overlay,
    base: Option<Vec<Line>>,
}

impl PropertiesConfig {
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

impl ConfigDocument for PropertiesConfig {
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
        self.base = Some(text.lines().map(Line::parse).collect());
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

        let extension = overlay.extension();
        let removal = overlay.removal();
        let mut pending: BTreeSet<&str> = extension.keys().map(String::as_str).collect();

        lines.retain_mut(|line| {
            let Line::Entry { key, value, .. } = line else {
                return true;
            };
            if let Some(new_value) = extension.get(key.as_str()) {
                pending.remove(key.as_str());
                if value.as_str() != new_value.as_str() {
                    log::debug!("Setting {key} to {new_value}. Old value was: {value}");
                    let updated = Line::entry(key, new_value);
                    *line = updated;
                }
            } else if let Some(strip) = removal.get(key.as_str()) {
                let stripped = value.replace(strip.as_str(), "");
                if stripped.trim().is_empty() {
                    log::debug!("Removing property {key}");
                    return false;
                }
                let updated = Line::entry(key, stripped.trim());
                *line = updated;
            }
            true
        });

        for key in pending {
            let value = &extension[key];
            log::debug!("Adding new property {key} with value {value}");
            lines.push(Line::entry(key, value));
        }
        Ok(())
    }

    fn to_str(&self) -> Result<String> {
        let lines = self.base.as_ref().ok_or_else(|| no_base(self.file))?;
        let mut out = lines.iter().map(Line::raw).collect::<Vec<_>>().join("\n");
        out.push('\n');
        Ok(out)
    }

    fn to_dict(&self) -> BTreeMap<String, String> {
        match &self.base {
            Some(lines) => lines
                .iter()
                .filter_map(|line| match line {
                    Line::Entry { key, value, .. } => Some((key.clone(), value.clone())),
                    Line::Other(_) => None,
                })
                .collect(),
            None => self.overlay.extension().clone(),
        }
    }
}
