//! Core types: role and service kinds, roles, services and the cluster topology.

use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::host::{CommandSettings, Host};

/// Kind of Hadoop daemon a role runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoleKind {
    /// YARN ResourceManager
    ResourceManager,
    /// YARN NodeManager
    NodeManager,
    /// HDFS NameNode
    NameNode,
    /// HDFS DataNode
    DataNode,
    /// MapReduce JobHistoryServer
    JobHistoryServer,
    /// YARN ApplicationHistoryServer (timeline server)
    AppHistoryServer,
}

impl RoleKind {
    /// Every role kind.
    pub const ALL: [Self; 6] = [
        Self::ResourceManager,
        Self::NodeManager,
        Self::NameNode,
        Self::DataNode,
        Self::JobHistoryServer,
        Self::AppHistoryServer,
    ];

    /// Selector token, also used in manifests.
    pub fn token(&self) -> &'static str {
        match self {
            Self::ResourceManager => "resourcemanager",
            Self::NodeManager => "nodemanager",
            Self::NameNode => "namenode",
            Self::DataNode => "datanode",
            Self::JobHistoryServer => "job-historyserver",
            Self::AppHistoryServer => "app-historyserver",
        }
    }

    /// Main class name as printed by `jps`.
    pub fn jps_name(&self) -> &'static str {
        match self {
            Self::ResourceManager => "ResourceManager",
            Self::NodeManager => "NodeManager",
            Self::NameNode => "NameNode",
            Self::DataNode => "DataNode",
            Self::JobHistoryServer => "JobHistoryServer",
            Self::AppHistoryServer => "ApplicationHistoryServer",
        }
    }

    /// Daemon name passed to the launcher, also found in log file names.
    pub fn daemon(&self) -> &'static str {
        match self {
            Self::ResourceManager => "resourcemanager",
            Self::NodeManager => "nodemanager",
            Self::NameNode => "namenode",
            Self::DataNode => "datanode",
            Self::JobHistoryServer => "historyserver",
            Self::AppHistoryServer => "timelineserver",
        }
    }

    /// Launcher that stops and starts the daemon.
    pub fn launcher(&self) -> &'static str {
        match self.service_kind() {
            ServiceKind::Hdfs => "hdfs --daemon",
            ServiceKind::Yarn if *self == Self::JobHistoryServer => "mapred --daemon",
            ServiceKind::Yarn => "yarn --daemon",
        }
    }

    /// Service the daemon belongs to.
    pub fn service_kind(&self) -> ServiceKind {
        match self {
            Self::NameNode | Self::DataNode => ServiceKind::Hdfs,
            _ => ServiceKind::Yarn,
        }
    }

    /// Default web UI port, for daemons that expose a log level servlet.
    pub fn web_port(&self) -> Option<u16> {
        match self {
            Self::ResourceManager => Some(8088),
            Self::NodeManager => Some(8042),
            _ => None,
        }
    }

    /// Whether `token` names this kind, ignoring case.
    pub fn matches(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(self.token()) || token.eq_ignore_ascii_case(self.jps_name())
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RoleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.matches(s))
            .ok_or_else(|| Error::Other(format!("unknown role type '{s}'")))
    }
}

impl TryFrom<String> for RoleKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RoleKind> for String {
    fn from(kind: RoleKind) -> Self {
        kind.token().to_string()
    }
}

/// Kind of Hadoop service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    /// YARN (and the MapReduce history server)
    Yarn,
    /// HDFS
    Hdfs,
}

impl ServiceKind {
    /// Selector token.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Yarn => "yarn",
            Self::Hdfs => "hdfs",
        }
    }

    /// Key of the service in a cluster manifest.
    pub fn manifest_key(&self) -> &'static str {
        match self {
            Self::Yarn => "Yarn",
            Self::Hdfs => "Hdfs",
        }
    }

    /// Parse a manifest key or selector token, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Yarn, Self::Hdfs]
            .into_iter()
            .find(|kind| kind.token().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// The cluster management technology behind a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterKind {
    /// Cloudera Manager style REST managed cluster
    #[serde(alias = "CM")]
    Cm,
    /// Docker Compose simulated cluster
    #[serde(alias = "HADOCK", alias = "Hadock")]
    Hadock,
    /// Plain hosts reachable over SSH
    #[default]
    #[serde(alias = "STANDARD", alias = "Standard")]
    Standard,
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cm => "cm",
            Self::Hadock => "hadock",
            Self::Standard => "standard",
        })
    }
}

/// Log level accepted by `yarn daemonlog -setlevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// TRACE
    Trace,
    /// DEBUG
    Debug,
    /// INFO
    Info,
    /// WARN
    Warn,
    /// ERROR
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(Error::Other(format!("unknown log level '{other}'"))),
        }
    }
}

/// Health of one cluster component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Component name
    pub name: String,
    /// Status as reported by the backend
    pub status: String,
}

impl StatusEntry {
    /// Create a new status entry.
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }
}

/// Index of a role in its [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(usize);

/// Index of a service in its [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(usize);

/// One Hadoop daemon instance on one host.
#[derive(Debug, Clone)]
pub struct Role {
    /// Role name, unique within its service
    pub name: String,
    /// Daemon kind
    pub kind: RoleKind,
    /// Host the daemon runs on
    pub host: Host,
    service: ServiceId,
    service_name: String,
}

impl Role {
    /// Owning service.
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Name of the owning service.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// `[name | host]` painted in a colour derived from the role name.
    pub fn colorized(&self) -> String {
        const PALETTE: [Color; 6] = [
            Color::Cyan,
            Color::Green,
            Color::Magenta,
            Color::Yellow,
            Color::Blue,
            Color::BrightRed,
        ];
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        let color = PALETTE[(hasher.finish() % PALETTE.len() as u64) as usize];
        format!(
            "[{} | {}]",
            self.name.as_str().color(color),
            self.host.id().color(color)
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} | {}]", self.name, self.host.id())
    }
}

/// A logical group of roles of one subsystem.
#[derive(Debug, Clone)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Subsystem
    pub kind: ServiceKind,
    roles: Vec<RoleId>,
}

impl Service {
    /// Roles of this service, in insertion order.
    pub fn role_ids(&self) -> &[RoleId] {
        &self.roles
    }
}

/// In-memory cluster topology.
///
/// The topology owns every role; services refer to their roles by
/// [`RoleId`] and each role refers back to its service by [`ServiceId`].
#[derive(Debug, Clone)]
pub struct Topology {
    kind: ClusterKind,
    name: String,
    settings: Arc<CommandSettings>,
    services: Vec<Service>,
    roles: Vec<Role>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new(kind: ClusterKind, name: impl Into<String>, settings: CommandSettings) -> Self {
        Self {
            kind,
            name: name.into(),
            settings: Arc::new(settings),
            services: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Cluster kind.
    pub fn kind(&self) -> ClusterKind {
        self.kind
    }

    /// Cluster name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command settings shared by every host.
    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    /// Add a service and return its id.
    pub fn add_service(&mut self, name: impl Into<String>, kind: ServiceKind) -> ServiceId {
        self.services.push(Service {
            name: name.into(),
            kind,
            roles: Vec::new(),
        });
        ServiceId(self.services.len() - 1)
    }

    /// Add a role to `service`, replacing a role of the same name.
    ///
    /// The role's host is bound to the cluster command settings and to the
    /// role itself, so every command it creates carries the role as target.
    pub fn add_role(
        &mut self,
        service: ServiceId,
        name: impl Into<String>,
        kind: RoleKind,
        mut host: Host,
    ) -> RoleId {
        let name = name.into();
        host.bind(&name, Arc::clone(&self.settings));
        let role = Role {
            name,
            kind,
            host,
            service,
            service_name: self.services[service.0].name.clone(),
        };

        let existing = self.services[service.0]
            .roles
            .iter()
            .copied()
            .find(|id| self.roles[id.0].name == role.name);
        match existing {
            Some(id) => {
                self.roles[id.0] = role;
                id
            }
            None => {
                self.roles.push(role);
                let id = RoleId(self.roles.len() - 1);
                self.services[service.0].roles.push(id);
                id
            }
        }
    }

    /// Services in insertion order.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// A service by id.
    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    /// A role by id.
    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.0]
    }

    /// Roles of a service, in insertion order.
    pub fn roles_of<'a>(&'a self, service: &'a Service) -> impl Iterator<Item = &'a Role> + 'a {
        service.roles.iter().map(|id| &self.roles[id.0])
    }

    /// Every role, grouped by service.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.services.iter().flat_map(|service| self.roles_of(service))
    }

    /// First role of the given kind.
    pub fn first_role_of(&self, kind: RoleKind) -> Option<&Role> {
        self.roles().find(|role| role.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kind_parsing() {
        assert_eq!("ResourceManager".parse::<RoleKind>().unwrap(), RoleKind::ResourceManager);
        assert_eq!("job-historyserver".parse::<RoleKind>().unwrap(), RoleKind::JobHistoryServer);
        assert_eq!("ApplicationHistoryServer".parse::<RoleKind>().unwrap(), RoleKind::AppHistoryServer);
        assert!("historyserver".parse::<RoleKind>().is_err());
    }

    #[test]
    fn test_launchers() {
        assert_eq!(RoleKind::NodeManager.launcher(), "yarn --daemon");
        assert_eq!(RoleKind::DataNode.launcher(), "hdfs --daemon");
        assert_eq!(RoleKind::JobHistoryServer.launcher(), "mapred --daemon");
        assert_eq!(RoleKind::AppHistoryServer.daemon(), "timelineserver");
    }

    #[test]
    fn test_cluster_kind_serde() {
        let kind: ClusterKind = serde_json::from_str("\"HADOCK\"").unwrap();
        assert_eq!(kind, ClusterKind::Hadock);
        assert_eq!(serde_json::to_string(&ClusterKind::Cm).unwrap(), "\"cm\"");
    }

    #[test]
    fn test_add_role_binds_service_and_target() {
        let mut topology = Topology::new(ClusterKind::Hadock, "test", CommandSettings::default());
        let yarn = topology.add_service("Yarn-1", ServiceKind::Yarn);
        let id = topology.add_role(yarn, "rm-1", RoleKind::ResourceManager, Host::container("resourcemanager"));

        let role = topology.role(id);
        assert_eq!(role.service(), yarn);
        assert_eq!(role.service_name(), "Yarn-1");
        let cmd = role.host.create_command("jps");
        assert_eq!(cmd.target().unwrap().role, "rm-1");
    }

    #[test]
    fn test_add_role_replaces_same_name() {
        let mut topology = Topology::new(ClusterKind::Standard, "", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        let first = topology.add_role(yarn, "nm", RoleKind::NodeManager, Host::ssh("a", "yarn"));
        let second = topology.add_role(yarn, "nm", RoleKind::NodeManager, Host::ssh("b", "yarn"));

        assert_eq!(first, second);
        assert_eq!(topology.roles().count(), 1);
        assert_eq!(topology.role(first).host.address(), "b");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::Info.to_string(), "INFO");
    }
}
