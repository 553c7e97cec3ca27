//! Docker Compose simulated clusters.
//!
//! Every compose service is one role running in its own container. The role
//! type is the service name without digits (`nodemanager2` is a
//! NodeManager). Logs come from `docker logs`, restarts go through Docker,
//! and the Hadoop jars are mounted into the containers so they never need
//! replacing.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use runkit::Command;

use super::{Backend, ClusterSettings, Layout, ReadLogOptions, required};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::manifest::{ClusterManifest, RoleManifest};
use crate::module::HadoopDir;
use crate::types::{ClusterKind, Role, RoleKind, StatusEntry};

const DEFAULT_COMPOSE: &str = "docker-compose.yml";
const PS_FORMAT: &str = "'{{.Names}}\\t{{.Image}}\\t{{.Status}}'";
const HADOOP_IMAGE: &str = "hadoop";

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposeService {
    container_name: Option<String>,
}

/// Backend for Hadock clusters.
#[derive(Debug, Clone)]
pub struct HadockBackend {
    repository: PathBuf,
    compose: String,
    layout: Layout,
}

impl HadockBackend {
    /// Backend for the Hadock checkout at `repository`.
    pub fn new(repository: impl Into<PathBuf>, compose: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            compose: compose.into(),
            layout: Layout::hadock(),
        }
    }

    pub(crate) fn from_settings(settings: &ClusterSettings) -> Result<Self> {
        let repository = required(&settings.hadock_path, "hadockPath", ClusterKind::Hadock)?;
        let compose = settings.hadock_compose.as_deref().unwrap_or(DEFAULT_COMPOSE);
        let mut backend = Self::new(repository, compose);
        if let Some(layout) = &settings.layout {
            backend.layout = layout.clone();
        }
        Ok(backend)
    }

    fn compose_path(&self) -> PathBuf {
        self.repository.join(&self.compose)
    }
}

/// Manifest of the roles declared in a compose file.
fn manifest_from_compose(text: &str) -> Result<ClusterManifest> {
    let compose: ComposeFile = serde_yaml::from_str(text).map_err(|e| Error::discovery("hadock", e))?;
    let mut manifest = ClusterManifest::new(ClusterKind::Hadock, "");
    for (name, service) in compose.services {
        let role_type: String = name.chars().filter(|c| !c.is_ascii_digit()).collect();
        let kind = match role_type.parse::<RoleKind>() {
            Ok(kind) => kind,
            Err(_) => {
                log::warn!("Skipping compose service '{name}', '{role_type}' is not a Hadoop role");
                continue;
            }
        };
        let host = service.container_name.unwrap_or_else(|| name.clone());
        let service_name = kind.service_kind().manifest_key();
        manifest.add_role(
            service_name,
            name,
            RoleManifest {
                kind,
                host,
                user: String::new(),
            },
        );
    }
    Ok(manifest)
}

/// Name and status of the Hadoop containers in `docker ps` output.
fn parse_status(lines: &[String]) -> Vec<StatusEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let mut columns = line.split('\t');
            let (name, image, status) = (columns.next()?, columns.next()?, columns.next()?);
            image
                .contains(HADOOP_IMAGE)
                .then(|| StatusEntry::new(name, status))
        })
        .collect()
}

impl Backend for HadockBackend {
    fn name(&self) -> &'static str {
        "hadock"
    }

    fn kind(&self) -> ClusterKind {
        ClusterKind::Hadock
    }

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn host(&self, address: &str, _user: &str) -> Host {
        Host::container(address)
    }

    fn discover(&self) -> Result<ClusterManifest> {
        let path = self.compose_path();
        log::info!("Discovering roles from {}", path.display());
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::discovery(self.name(), format!("{}: {e}", path.display())))?;
        manifest_from_compose(&text)
    }

    fn read_log(&self, roles: &[&Role], options: &ReadLogOptions) -> Result<Vec<Command>> {
        Ok(roles
            .iter()
            .map(|role| {
                let container = role.host.id();
                let mut text = format!("docker logs {container}");
                if options.follow && !options.download {
                    text.push_str(" -f");
                }
                if let Some(tail) = options.tail {
                    text.push_str(&format!(" --tail {tail}"));
                }
                if options.download {
                    return role.host.download_output(&text, &format!("{container}.log"), None);
                }
                role.host.local_command(text)
            })
            .collect())
    }

    fn get_cluster_status(&self, _cluster: &str) -> Result<Vec<StatusEntry>> {
        let output = Command::new(format!("docker ps --format {PS_FORMAT}")).run()?;
        Ok(parse_status(&output.stdout))
    }

    fn restart_roles(&self, roles: &[&Role]) -> Result<Vec<Command>> {
        Ok(roles
            .iter()
            .map(|role| {
                log::info!("Restarting {}", role.colorized());
                role.host.local_command(format!("docker restart {}", role.host.id()))
            })
            .collect())
    }

    fn restart_cluster(&self, _cluster: &str) -> Result<()> {
        log::info!("Restarting every container of {}", self.compose_path().display());
        Command::new(format!("docker compose -f {} restart", self.compose))
            .with_work_dir(&self.repository)
            .run()?;
        Ok(())
    }

    fn replace_module_jars(&self, _roles: &[&Role], _modules: &HadoopDir) -> Result<()> {
        log::info!("Hadock has a local mounted volume for jars. No need to replace them manually.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandSettings;
    use crate::types::ServiceKind;

    const COMPOSE: &str = r#"
version: "3"
services:
  namenode:
    image: bde2020/hadoop-namenode
    container_name: namenode
  datanode1:
    image: bde2020/hadoop-datanode
  resourcemanager:
    image: bde2020/hadoop-resourcemanager
    container_name: resourcemanager
  nodemanager1:
    image: bde2020/hadoop-nodemanager
  nodemanager2:
    image: bde2020/hadoop-nodemanager
  historyserver:
    image: bde2020/hadoop-historyserver
"#;

    #[test]
    fn test_manifest_from_compose() {
        let manifest = manifest_from_compose(COMPOSE).unwrap();

        let yarn = &manifest.context["Yarn"];
        let hdfs = &manifest.context["Hdfs"];
        assert_eq!(yarn.name, "Yarn");
        assert_eq!(hdfs.name, "Hdfs");
        assert_eq!(
            yarn.roles.keys().collect::<Vec<_>>(),
            vec!["nodemanager1", "nodemanager2", "resourcemanager"]
        );
        assert_eq!(hdfs.roles.keys().collect::<Vec<_>>(), vec!["datanode1", "namenode"]);
        assert_eq!(yarn.roles["nodemanager2"].kind, RoleKind::NodeManager);
        assert_eq!(yarn.roles["nodemanager2"].host, "nodemanager2");
        assert_eq!(hdfs.roles["namenode"].host, "namenode");
    }

    #[test]
    fn test_discover_reads_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cluster.yml"), COMPOSE).unwrap();
        let backend = HadockBackend::new(dir.path(), "cluster.yml");

        let manifest = backend.discover().unwrap();
        assert_eq!(manifest.cluster_type, ClusterKind::Hadock);
        assert_eq!(manifest.role_count(), 5);

        let missing = HadockBackend::new(dir.path(), DEFAULT_COMPOSE);
        assert!(matches!(missing.discover(), Err(Error::Discovery { .. })));
    }

    #[test]
    fn test_invalid_compose() {
        assert!(matches!(
            manifest_from_compose("services: [oops"),
            Err(Error::Discovery { .. })
        ));
    }

    #[test]
    fn test_parse_status() {
        let lines = vec![
            "nodemanager1\tbde2020/hadoop-nodemanager:2.0.0\tUp 3 hours".to_string(),
            "postgres\tpostgres:13\tUp 3 hours".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(parse_status(&lines), vec![StatusEntry::new("nodemanager1", "Up 3 hours")]);
    }

    #[test]
    fn test_container_commands() {
        let backend = HadockBackend::new("/tmp/hadock", DEFAULT_COMPOSE);
        let mut topology = crate::types::Topology::new(ClusterKind::Hadock, "", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        topology.add_role(yarn, "nodemanager1", RoleKind::NodeManager, backend.host("nodemanager1", ""));
        let roles: Vec<&Role> = topology.roles().collect();

        let options = ReadLogOptions {
            follow: true,
            tail: Some(10),
            download: false,
        };
        let logs = backend.read_log(&roles, &options).unwrap();
        assert_eq!(logs[0].text(), "docker logs nodemanager1 -f --tail 10");
        assert_eq!(logs[0].target().unwrap().role, "nodemanager1");

        let restarts = backend.restart_roles(&roles).unwrap();
        assert_eq!(restarts[0].text(), "docker restart nodemanager1");
    }

    #[test]
    fn test_downloaded_log_records_local_file() {
        let backend = HadockBackend::new("/tmp/hadock", DEFAULT_COMPOSE);
        let mut topology = crate::types::Topology::new(ClusterKind::Hadock, "", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        topology.add_role(yarn, "resourcemanager", RoleKind::ResourceManager, backend.host("resourcemanager", ""));
        let roles: Vec<&Role> = topology.roles().collect();

        let options = ReadLogOptions {
            follow: true,
            tail: None,
            download: true,
        };
        let logs = backend.read_log(&roles, &options).unwrap();
        let download = logs[0].download().unwrap();
        assert_eq!(download.local_file, std::path::PathBuf::from("./resourcemanager.log"));
        assert_eq!(logs[0].text(), "docker logs resourcemanager > ./resourcemanager.log 2>&1");
        assert_eq!(logs[0].target().unwrap().role, "resourcemanager");
    }

    #[test]
    fn test_from_settings() {
        let settings = ClusterSettings {
            kind: ClusterKind::Hadock,
            hadock_path: Some("/work/hadock".to_string()),
            ..ClusterSettings::default()
        };
        let backend = HadockBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.compose_path(), PathBuf::from("/work/hadock/docker-compose.yml"));
        assert_eq!(backend.layout().config_dir, PathBuf::from("/etc/hadoop"));

        assert!(HadockBackend::from_settings(&ClusterSettings::default()).is_err());
    }
}
