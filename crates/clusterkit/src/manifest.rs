//! Cluster manifests: the persisted form of a discovered topology.
//!
//! ```json
//! {
//!   "clusterType": "hadock",
//!   "clusterName": "",
//!   "context": {
//!     "Yarn": {
//!       "name": "Yarn",
//!       "roles": {
//!         "resourcemanager": { "type": "resourcemanager", "host": "resourcemanager", "user": "" }
//!       }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::host::CommandSettings;
use crate::types::{ClusterKind, RoleKind, ServiceKind, Topology};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "cluster.json";

/// A role entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleManifest {
    /// Daemon kind
    #[serde(rename = "type")]
    pub kind: RoleKind,
    /// Host address or container name
    pub host: String,
    /// Login user, empty for containers
    #[serde(default)]
    pub user: String,
}

/// A service entry of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Service name as known to the cluster manager
    pub name: String,
    /// Roles keyed by role name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleManifest>,
}

/// Persisted cluster topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterManifest {
    /// Backend the topology was discovered with
    pub cluster_type: ClusterKind,
    /// Cluster name, empty when the backend has none
    #[serde(default)]
    pub cluster_name: String,
    /// Services keyed by service kind (`Yarn`, `Hdfs`)
    #[serde(default)]
    pub context: BTreeMap<String, ServiceManifest>,
}

impl ClusterManifest {
    /// An empty manifest.
    pub fn new(cluster_type: ClusterKind, cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_type,
            cluster_name: cluster_name.into(),
            context: BTreeMap::new(),
        }
    }

    /// Add a role under the service of its kind, creating the service entry
    /// named `service_name` when missing.
    pub fn add_role(&mut self, service_name: &str, role_name: impl Into<String>, role: RoleManifest) {
        self.context
            .entry(role.kind.service_kind().manifest_key().to_string())
            .or_insert_with(|| ServiceManifest {
                name: service_name.to_string(),
                roles: BTreeMap::new(),
            })
            .roles
            .insert(role_name.into(), role);
    }

    /// Number of roles in the manifest.
    pub fn role_count(&self) -> usize {
        self.context.values().map(|service| service.roles.len()).sum()
    }

    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::setup("cluster manifest", format!("{}: {e}", path.display())))
    }

    /// Write the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text + "\n").map_err(|e| Error::io(path, e))
    }

    /// Build the in-memory topology, creating hosts with `backend`.
    pub fn to_topology(&self, backend: &dyn Backend, settings: CommandSettings) -> Result<Topology> {
        if self.cluster_type != backend.kind() {
            log::warn!(
                "Manifest was discovered with the {} backend, using {}",
                self.cluster_type,
                backend.kind()
            );
        }

        let mut topology = Topology::new(self.cluster_type, self.cluster_name.clone(), settings);
        for (key, service) in &self.context {
            let kind = ServiceKind::parse(key)
                .ok_or_else(|| Error::setup("cluster manifest", format!("unknown service '{key}'")))?;
            let id = topology.add_service(service.name.clone(), kind);
            for (name, role) in &service.roles {
                topology.add_role(id, name.clone(), role.kind, backend.host(&role.host, &role.user));
            }
        }
        Ok(topology)
    }

    /// The manifest describing `topology`.
    pub fn from_topology(topology: &Topology) -> Self {
        let mut manifest = Self::new(topology.kind(), topology.name());
        for service in topology.services() {
            let entry = manifest
                .context
                .entry(service.kind.manifest_key().to_string())
                .or_insert_with(|| ServiceManifest {
                    name: service.name.clone(),
                    roles: BTreeMap::new(),
                });
            for role in topology.roles_of(service) {
                entry.roles.insert(
                    role.name.clone(),
                    RoleManifest {
                        kind: role.kind,
                        host: role.host.id().to_string(),
                        user: role.host.user().to_string(),
                    },
                );
            }
        }
        manifest
    }
}
