//! Plain hosts reachable over SSH.
//!
//! The topology is discovered from the node list of one known
//! ResourceManager; every operation uses the host-generic defaults of
//! [`Backend`] against the configured [`Layout`].

use super::{Backend, ClusterSettings, Layout, required};
use crate::api::{RmApi, rm::RmNode};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::manifest::{ClusterManifest, RoleManifest};
use crate::types::{ClusterKind, RoleKind, StatusEntry};

const DEFAULT_USER: &str = "yarn";

/// Backend for plain SSH clusters.
#[derive(Debug, Clone)]
pub struct StandardBackend {
    rm_address: String,
    user: String,
    layout: Layout,
}

impl StandardBackend {
    /// Backend discovering from the ResourceManager at `rm_address`.
    pub fn new(rm_address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            rm_address: rm_address.into(),
            user: user.into(),
            layout: Layout::standard(),
        }
    }

    /// Use a non-default installation layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub(crate) fn from_settings(settings: &ClusterSettings) -> Result<Self> {
        let rm_address = required(&settings.rm_address, "rmAddress", ClusterKind::Standard)?;
        let user = settings.user.as_deref().unwrap_or(DEFAULT_USER);
        Ok(Self::new(rm_address, user).with_layout(settings.layout.clone().unwrap_or_default()))
    }

    fn rm_api(&self) -> RmApi {
        RmApi::new(&self.rm_address)
    }
}

/// Host name of an address that may carry a scheme and port.
fn bare_host(address: &str) -> &str {
    let host = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"))
        .unwrap_or(address);
    host.split([':', '/']).next().unwrap_or(host)
}

fn manifest_from_nodes(rm_address: &str, user: &str, nodes: Vec<RmNode>) -> ClusterManifest {
    let mut manifest = ClusterManifest::new(ClusterKind::Standard, "");
    let rm_host = bare_host(rm_address);
    manifest.add_role(
        "Yarn",
        rm_host,
        RoleManifest {
            kind: RoleKind::ResourceManager,
            host: rm_host.to_string(),
            user: user.to_string(),
        },
    );
    for node in nodes {
        manifest.add_role(
            "Yarn",
            node.id,
            RoleManifest {
                kind: RoleKind::NodeManager,
                host: node.node_host_name,
                user: user.to_string(),
            },
        );
    }
    manifest
}

impl Backend for StandardBackend {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn kind(&self) -> ClusterKind {
        ClusterKind::Standard
    }

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn host(&self, address: &str, user: &str) -> Host {
        let user = if user.is_empty() { &self.user } else { user };
        Host::ssh(address, user)
    }

    fn discover(&self) -> Result<ClusterManifest> {
        log::info!("Discovering nodes of ResourceManager {}", self.rm_address);
        let nodes = self
            .rm_api()
            .nodes()
            .map_err(|e| Error::discovery(self.name(), e))?;
        Ok(manifest_from_nodes(&self.rm_address, &self.user, nodes))
    }

    fn get_cluster_status(&self, _cluster: &str) -> Result<Vec<StatusEntry>> {
        Ok(self
            .rm_api()
            .nodes()?
            .into_iter()
            .map(|node| StatusEntry::new(node.id, node.state))
            .collect())
    }
}
