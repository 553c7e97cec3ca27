//! # clusterkit
//!
//! Discover Hadoop clusters, address their roles with selector expressions and
//! run administrative operations against them, whichever technology manages
//! the cluster.
//!
//! ## Overview
//!
//! - [`Topology`]: services and their roles, each role bound to a [`Host`]
//! - [`selector`]: the `service/role` query language picking roles
//! - [`Backend`]: turns operations into commands for one cluster technology
//!   ([`CmBackend`], [`HadockBackend`], [`StandardBackend`])
//! - [`Cluster`]: the orchestrator tying the three together
//!
//! ## Example
//!
//! ```no_run
//! use clusterkit::{Cluster, ClusterManifest, ClusterSettings, CommandSettings, ReadLogOptions};
//! use std::path::Path;
//!
//! let settings = ClusterSettings {
//!     hadock_path: Some("/work/hadock".to_string()),
//!     kind: clusterkit::ClusterKind::Hadock,
//!     ..ClusterSettings::default()
//! };
//! let backend = clusterkit::backend::create(&settings)?;
//! let manifest = backend.discover()?;
//! let cluster = Cluster::from_manifest(&manifest, backend, CommandSettings::default())?;
//!
//! let options = ReadLogOptions { tail: Some(20), ..ReadLogOptions::default() };
//! for cmd in cluster.read_logs("Yarn/NodeManager", &options)? {
//!     cmd.run()?;
//! }
//! manifest.save(Path::new("cluster.json"))?;
//! # Ok::<(), clusterkit::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod app;
pub mod backend;
pub mod cluster;
pub mod error;
pub mod host;
pub mod manifest;
pub mod module;
pub mod mvn;
pub mod selector;
pub mod types;

pub use app::{AppJars, Application};
pub use backend::{
    Backend, CertCopy, CertExport, CertImport, ClusterSettings, CmBackend, HadockBackend, JavaRun, KeypairOptions,
    Layout, ReadLogOptions, StandardBackend, UpdateOptions,
};
pub use cluster::Cluster;
pub use error::{Error, Result};
pub use host::{BACKUP_DIR, CommandSettings, Host, HostKind};
pub use manifest::{ClusterManifest, MANIFEST_FILE, RoleManifest, ServiceManifest};
pub use module::HadoopDir;
pub use mvn::MavenCompiler;
pub use selector::{Selector, select};
pub use types::{ClusterKind, LogLevel, Role, RoleKind, Service, ServiceKind, StatusEntry, Topology};
