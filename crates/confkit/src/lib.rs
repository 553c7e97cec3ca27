//! # confkit
//!
//! Overlay edits onto existing Hadoop configuration files without losing the
//! settings nobody asked to change.
//!
//! Every supported file is a [`ConfigFile`] paired with a document format
//! ([`ConfigKind`]). [`create`] returns the matching [`ConfigDocument`]:
//!
//! - [`XmlConfig`] for `*-site.xml`, `capacity-scheduler.xml` and the SSL files
//! - [`PropertiesConfig`] for `log4j.properties`
//! - [`ShellConfig`] for `yarn-env.sh`
//!
//! ## Example
//!
//! ```no_run
//! use confkit::{ConfigFile, create};
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! let mut doc = create(ConfigFile::YarnSite);
//! doc.set_base_config(Path::new("/tmp/yarn-site.xml"))?;
//! doc.extend_with_args(&BTreeMap::from([(
//!     "yarn.nodemanager.resource.memory-mb".to_string(),
//!     "8192".to_string(),
//! )]));
//! doc.merge()?;
//! doc.commit()?;
//! # Ok::<(), confkit::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod file;
pub mod properties;
pub mod shell;
pub mod xml;

pub use document::{ConfigDocument, Overlay, create};
pub use error::{Error, Result};
pub use file::{ConfigFile, ConfigKind};
pub use properties::PropertiesConfig;
pub use shell::{EXTENSION_MARKER, ShellConfig};
pub use xml::{XmlConfig, read_properties};
