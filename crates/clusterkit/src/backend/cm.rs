//! Clusters managed by a Cloudera Manager style REST API.
//!
//! Topology, restarts and role configuration go through [`CmApi`]. Logs,
//! pids and files are still reached over SSH, using CM's own log directories
//! and file names.

use confkit::ConfigDocument;
use runkit::Command;
use std::collections::{BTreeMap, HashMap};

use super::{Backend, ClusterSettings, Layout, UpdateOptions, required};
use crate::api::CmApi;
use crate::api::cm::{ApiHost, ApiRole, ApiService};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::manifest::{ClusterManifest, RoleManifest};
use crate::types::{ClusterKind, Role, RoleKind, StatusEntry};

const DEFAULT_CREDENTIAL: &str = "admin";
const DEFAULT_USER: &str = "root";
const MANAGED_SERVICES: [&str; 2] = ["YARN", "HDFS"];

/// CM role type of a role kind, and the log directory of its daemon.
fn cm_names(kind: RoleKind) -> (&'static str, &'static str) {
    match kind {
        RoleKind::ResourceManager => ("RESOURCEMANAGER", "/var/log/hadoop-yarn"),
        RoleKind::NodeManager => ("NODEMANAGER", "/var/log/hadoop-yarn"),
        RoleKind::JobHistoryServer => ("JOBHISTORY", "/var/log/hadoop-mapreduce"),
        RoleKind::AppHistoryServer => ("TIMELINESERVER", "/var/log/hadoop-yarn"),
        RoleKind::NameNode => ("NAMENODE", "/var/log/hadoop-hdfs"),
        RoleKind::DataNode => ("DATANODE", "/var/log/hadoop-hdfs"),
    }
}

fn role_kind(cm_type: &str) -> Option<RoleKind> {
    RoleKind::ALL
        .into_iter()
        .find(|kind| cm_names(*kind).0.eq_ignore_ascii_case(cm_type))
}

/// Backend for CM managed clusters.
pub struct CmBackend {
    api: CmApi,
    cluster: Option<String>,
    user: String,
    layout: Layout,
}

impl CmBackend {
    /// Backend talking to an already configured API client.
    pub fn new(api: CmApi, cluster: Option<String>, user: impl Into<String>) -> Self {
        Self {
            api,
            cluster,
            user: user.into(),
            layout: Layout::cm(),
        }
    }

    pub(crate) fn from_settings(settings: &ClusterSettings) -> Result<Self> {
        let host = required(&settings.cm_host, "cmHost", ClusterKind::Cm)?;
        let api = CmApi::new(
            host,
            settings.cm_username.as_deref().unwrap_or(DEFAULT_CREDENTIAL),
            settings.cm_password.as_deref().unwrap_or(DEFAULT_CREDENTIAL),
        );
        let mut backend = Self::new(
            api,
            settings.name.clone(),
            settings.user.as_deref().unwrap_or(DEFAULT_USER),
        );
        if let Some(layout) = &settings.layout {
            backend.layout = layout.clone();
        }
        Ok(backend)
    }

    /// `requested`, else the configured cluster, else the first cluster CM knows.
    fn cluster_name(&self, requested: &str) -> Result<String> {
        if !requested.is_empty() {
            return Ok(requested.to_string());
        }
        if let Some(name) = &self.cluster {
            return Ok(name.clone());
        }
        self.api
            .clusters()?
            .into_iter()
            .next()
            .map(|cluster| cluster.name)
            .ok_or_else(|| Error::Other("CM manages no clusters".to_string()))
    }
}

fn manifest_from_api(
    cluster: &str,
    services: Vec<(ApiService, Vec<ApiRole>)>,
    hosts: &[ApiHost],
    user: &str,
) -> ClusterManifest {
    let hostnames: HashMap<&str, &str> = hosts
        .iter()
        .map(|host| (host.host_id.as_str(), host.hostname.as_str()))
        .collect();

    let mut manifest = ClusterManifest::new(ClusterKind::Cm, cluster);
    for (service, roles) in services {
        for role in roles {
            let Some(kind) = role_kind(&role.kind) else {
                log::debug!("Skipping CM role {} of type {}", role.name, role.kind);
                continue;
            };
            let host = role
                .host_ref
                .hostname
                .clone()
                .or_else(|| hostnames.get(role.host_ref.host_id.as_str()).map(|h| h.to_string()))
                .unwrap_or_else(|| role.host_ref.host_id.clone());
            manifest.add_role(
                &service.name,
                role.name,
                RoleManifest {
                    kind,
                    host,
                    user: user.to_string(),
                },
            );
        }
    }
    manifest
}

impl Backend for CmBackend {
    fn name(&self) -> &'static str {
        "cm"
    }

    fn kind(&self) -> ClusterKind {
        ClusterKind::Cm
    }

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn host(&self, address: &str, user: &str) -> Host {
        let user = if user.is_empty() { &self.user } else { user };
        Host::ssh(address, user)
    }

    fn discover(&self) -> Result<ClusterManifest> {
        let discover = || -> Result<ClusterManifest> {
            let cluster = self.cluster_name("")?;
            log::info!("Discovering services of CM cluster {cluster}");
            let mut services = Vec::new();
            for service in self.api.services(&cluster)? {
                if !MANAGED_SERVICES.contains(&service.kind.to_uppercase().as_str()) {
                    continue;
                }
                let roles = self.api.roles(&cluster, &service.name)?;
                services.push((service, roles));
            }
            let hosts = self.api.hosts()?;
            Ok(manifest_from_api(&cluster, services, &hosts, &self.user))
        };
        discover().map_err(|e| Error::discovery(self.name(), e))
    }

    fn log_file(&self, role: &Role) -> String {
        let (cm_type, dir) = cm_names(role.kind);
        format!("{dir}/*{cm_type}*")
    }

    fn get_cluster_status(&self, cluster: &str) -> Result<Vec<StatusEntry>> {
        let cluster = self.cluster_name(cluster)?;
        Ok(self
            .api
            .services(&cluster)?
            .into_iter()
            .map(|service| {
                let health = service.health_summary.unwrap_or_else(|| "UNKNOWN".to_string());
                StatusEntry::new(service.name, health)
            })
            .collect())
    }

    fn update_config(&self, roles: &[&Role], doc: &mut dyn ConfigDocument, _options: &UpdateOptions) -> Result<()> {
        let overlay = doc.overlay();
        if !overlay.removal().is_empty() {
            return Err(Error::unsupported(self.name(), "update_config with removals"));
        }
        let cluster = self.cluster_name("")?;
        for role in roles {
            log::info!("Setting config {} on {} through CM", doc.file(), role.colorized());
            self.api
                .update_role_config(&cluster, role.service_name(), &role.name, overlay.extension())?;
        }
        Ok(())
    }

    fn restart_roles(&self, roles: &[&Role]) -> Result<Vec<Command>> {
        let cluster = self.cluster_name("")?;
        let mut by_service: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for role in roles {
            by_service
                .entry(role.service_name())
                .or_default()
                .push(role.name.as_str());
        }
        for (service, names) in by_service {
            log::info!("Restarting {} roles of {service} through CM", names.len());
            self.api.restart_roles(&cluster, service, &names)?;
        }
        Ok(Vec::new())
    }

    fn restart_cluster(&self, cluster: &str) -> Result<()> {
        let cluster = self.cluster_name(cluster)?;
        log::info!("Restarting CM cluster {cluster}");
        self.api.restart_cluster(&cluster)
    }
}
