//! The [`ConfigDocument`] trait and the overlay state shared by every format.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file::{ConfigFile, ConfigKind};
use crate::properties::PropertiesConfig;
use crate::shell::ShellConfig;
use crate::xml::{self, XmlConfig};

/// Pending edits for a document: keys to set and substrings to strip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    extension: BTreeMap<String, String>,
    removal: BTreeMap<String, String>,
}

impl Overlay {
    /// Keys to set, with their new values.
    pub fn extension(&self) -> &BTreeMap<String, String> {
        &self.extension
    }

    /// Keys whose values lose a substring.
    pub fn removal(&self) -> &BTreeMap<String, String> {
        &self.removal
    }

    /// Whether no edits are pending.
    pub fn is_empty(&self) -> bool {
        self.extension.is_empty() && self.removal.is_empty()
    }

    /// Set keys, overwriting earlier values for the same key.
    pub fn extend(&mut self, args: &BTreeMap<String, String>) {
        self.extension
            .extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Set keys that are not pending yet.
    pub fn extend_missing<I>(&mut self, props: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in props {
            self.extension.entry(key).or_insert(value);
        }
    }

    /// Register substrings to strip from values.
    pub fn remove(&mut self, removals: &BTreeMap<String, String>) {
        self.removal
            .extend(removals.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Fail if a key is both extended and removed.
    pub fn check(&self) -> Result<()> {
        match self.extension.keys().find(|key| self.removal.contains_key(*key)) {
            Some(key) => Err(Error::ConflictingKey { key: key.clone() }),
            None => Ok(()),
        }
    }
}

/// A Hadoop config file plus pending edits.
///
/// A document starts without a base. Once a base is loaded with
/// [`set_base_config`](Self::set_base_config) or [`set_raw`](Self::set_raw),
/// any number of edits can be registered, applied with
/// [`merge`](Self::merge) and written back with [`commit`](Self::commit).
pub trait ConfigDocument: fmt::Debug + Send {
    /// Which config file this document represents.
    fn file(&self) -> ConfigFile;

    /// Path written by [`commit`](Self::commit).
    fn path(&self) -> &Path;

    /// Change the path written by [`commit`](Self::commit).
    fn set_path(&mut self, path: PathBuf);

    /// Pending edits.
    fn overlay(&self) -> &Overlay;

    /// Pending edits, mutably.
    fn overlay_mut(&mut self) -> &mut Overlay;

    /// Parse `text` as the base document.
    fn set_raw(&mut self, text: &str) -> Result<()>;

    /// Whether a base document is loaded.
    fn has_base(&self) -> bool;

    /// Apply pending edits to the base document.
    ///
    /// Fails with [`Error::NoBase`] before a base is loaded, and with
    /// [`Error::ConflictingKey`] before touching the base if a key is both
    /// extended and removed.
    fn merge(&mut self) -> Result<()>;

    /// Serialize the base document.
    fn to_str(&self) -> Result<String>;

    /// Effective key/value view: the base once loaded, else the pending extension.
    fn to_dict(&self) -> BTreeMap<String, String>;

    /// Load the base document from `path`; later commits write back to it.
    fn set_base_config(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.set_raw(&text)?;
        self.set_path(path.to_path_buf());
        Ok(())
    }

    /// Set keys, overwriting earlier values for the same key.
    fn extend_with_args(&mut self, args: &BTreeMap<String, String>) {
        self.overlay_mut().extend(args);
    }

    /// Set every property of another Hadoop XML file that is not pending yet.
    fn extend_with_xml(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let props = xml::read_properties(&text, self.file().name())?;
        self.overlay_mut().extend_missing(props);
        Ok(())
    }

    /// Strip `value` from the current value of each key.
    fn remove_confs(&mut self, removals: &BTreeMap<String, String>) {
        self.overlay_mut().remove(removals);
    }

    /// Write the serialized document to [`path`](Self::path).
    fn commit(&self) -> Result<PathBuf> {
        let text = self.to_str()?;
        let path = self.path().to_path_buf();
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        log::debug!("Wrote {} to {}", self.file(), path.display());
        Ok(path)
    }
}

/// Create an empty document of the right format for `file`.
pub fn create(file: ConfigFile) -> Box<dyn ConfigDocument> {
    match file.kind() {
        ConfigKind::Xml => Box::new(XmlConfig::new(file)),
        ConfigKind::Properties => Box::new(PropertiesConfig::new(file)),
        ConfigKind::Shell => Box::new(ShellConfig::new(file)),
    }
}

pub(crate) fn no_base(file: ConfigFile) -> Error {
    Error::NoBase {
        file: file.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_later_extension_wins() {
        let mut overlay = Overlay::default();
        overlay.extend(&map(&[("a", "1")]));
        overlay.extend(&map(&[("a", "2")]));
        assert_eq!(overlay.extension()["a"], "2");
    }

    #[test]
    fn test_extend_missing_keeps_pending() {
        let mut overlay = Overlay::default();
        overlay.extend(&map(&[("a", "1")]));
        overlay.extend_missing(vec![("a".to_string(), "9".to_string()), ("b".to_string(), "2".to_string())]);
        assert_eq!(overlay.extension(), &map(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_conflict_detected() {
        let mut overlay = Overlay::default();
        overlay.extend(&map(&[("a", "1")]));
        overlay.remove(&map(&[("a", "x")]));
        assert!(matches!(overlay.check(), Err(Error::ConflictingKey { key }) if key == "a"));
    }

    #[test]
    fn test_create_picks_format() {
        assert_eq!(create(ConfigFile::YarnSite).file(), ConfigFile::YarnSite);
        assert_eq!(create(ConfigFile::YarnEnv).path(), Path::new("yarn-env.sh"));
    }

    #[test]
    fn test_extend_with_xml_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("extra.xml");
        fs::write(
            &source,
            "<configuration><property><name>a</name><value>from-xml</value></property>\
             <property><name>b</name><value>2</value></property></configuration>",
        )
        .unwrap();

        let mut doc = create(ConfigFile::YarnSite);
        doc.extend_with_args(&map(&[("a", "1")]));
        doc.extend_with_xml(&source).unwrap();

        assert_eq!(doc.overlay().extension(), &map(&[("a", "1"), ("b", "2")]));
    }
}
