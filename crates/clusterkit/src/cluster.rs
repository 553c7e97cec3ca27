//! The cluster orchestrator.
//!
//! [`Cluster`] owns the topology and the backend. Every operation resolves a
//! selector to roles, warns when nothing matched and hands the roles to the
//! backend. Operations returning [`Command`]s leave running them to the
//! caller, so commands for several roles can run concurrently.

use confkit::{ConfigDocument, ConfigFile};
use rand::Rng;
use rand::seq::SliceRandom;
use runkit::Command;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::api::{MutationRequest, NmApi, QueueNode, RmApi};
use crate::app::Application;
use crate::backend::{
    Backend, CertCopy, CertExport, CertImport, JavaRun, KeypairOptions, ReadLogOptions, UpdateOptions,
};
use crate::error::{Error, Result};
use crate::host::CommandSettings;
use crate::manifest::ClusterManifest;
use crate::module::HadoopDir;
use crate::selector;
use crate::types::{LogLevel, Role, RoleKind, StatusEntry, Topology};

const RESOURCE_MANAGERS: &str = "Yarn/ResourceManager";

/// A cluster bound to the backend managing it.
pub struct Cluster {
    topology: Topology,
    backend: Box<dyn Backend>,
    workdir: PathBuf,
}

impl Cluster {
    /// Cluster over an existing topology.
    pub fn new(topology: Topology, backend: Box<dyn Backend>) -> Self {
        Self {
            topology,
            backend,
            workdir: PathBuf::from("."),
        }
    }

    /// Cluster described by a manifest.
    pub fn from_manifest(manifest: &ClusterManifest, backend: Box<dyn Backend>, settings: CommandSettings) -> Result<Self> {
        let topology = manifest.to_topology(backend.as_ref(), settings)?;
        Ok(Self::new(topology, backend))
    }

    /// Local directory downloads and merged configs are written to.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// The topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Cluster name.
    pub fn name(&self) -> &str {
        self.topology.name()
    }

    /// Roles matched by `selector`, warning when there are none.
    pub fn select_roles(&self, selector: &str) -> Result<Vec<&Role>> {
        let roles = selector::select(selector, &self.topology)?;
        if roles.is_empty() {
            log::warn!("No roles found by selector '{selector}'");
        }
        log::debug!(
            "Selected roles for '{selector}': {}",
            roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(roles)
    }

    fn select_random_role<R: Rng + ?Sized>(&self, selector: &str, rng: &mut R) -> Result<&Role> {
        self.select_roles(selector)?
            .choose(rng)
            .copied()
            .ok_or_else(|| Error::NoRoles {
                selector: selector.to_string(),
            })
    }

    /// Commands reading the daemon logs of the selected roles.
    pub fn read_logs(&self, selector: &str, options: &ReadLogOptions) -> Result<Vec<Command>> {
        self.backend.read_log(&self.select_roles(selector)?, options)
    }

    /// Commands changing a logger level on the selected daemons.
    pub fn set_log_level(&self, selector: &str, package: &str, level: LogLevel) -> Result<Vec<Command>> {
        self.backend.set_log_level(&self.select_roles(selector)?, package, level)
    }

    /// Commands printing logger levels of the selected daemons, per package.
    pub fn get_log_levels(&self, selector: &str, packages: &[String]) -> Result<BTreeMap<String, Vec<Command>>> {
        self.backend.get_log_levels(&self.select_roles(selector)?, packages)
    }

    /// Pack the logs of an application on the selected hosts; the returned
    /// commands download the archives into the work directory.
    pub fn compress_and_download_app_logs(&self, selector: &str, app_id: &str, compress_dir: bool) -> Result<Vec<Command>> {
        let roles = self.select_roles(selector)?;
        self.backend.compress_app_logs(&roles, app_id, &self.workdir, compress_dir)
    }

    /// Pack the daemon logs of the selected hosts; the returned commands
    /// download the archives into the work directory.
    pub fn compress_and_download_daemon_logs(&self, selector: &str) -> Result<Vec<Command>> {
        let roles = self.select_roles(selector)?;
        self.backend.compress_daemon_logs(&roles, &self.workdir)
    }

    /// Health of the cluster components.
    pub fn get_status(&self) -> Result<Vec<StatusEntry>> {
        self.backend.get_cluster_status(self.name())
    }

    /// Command submitting `app` from one randomly picked selected role.
    pub fn run_app<R: Rng + ?Sized>(&self, app: &Application, selector: &str, rng: &mut R) -> Result<Command> {
        let role = self.select_random_role(selector, rng)?;
        Ok(self.backend.run_app(role, app))
    }

    /// Merge the pending edits of `doc` into the config of the selected roles.
    pub fn update_config(&self, selector: &str, doc: &mut dyn ConfigDocument, no_backup: bool, allow_empty: bool) -> Result<()> {
        let options = UpdateOptions {
            no_backup,
            workdir: self.workdir.clone(),
            allow_empty,
        };
        self.backend.update_config(&self.select_roles(selector)?, doc, &options)
    }

    /// Commands restarting the selected roles.
    pub fn restart_roles(&self, selector: &str) -> Result<Vec<Command>> {
        self.backend.restart_roles(&self.select_roles(selector)?)
    }

    /// Kill and start the selected roles.
    pub fn force_restart_roles(&self, selector: &str, sleep_after: u64) -> Result<()> {
        self.backend.force_restart_roles(&self.select_roles(selector)?, sleep_after)
    }

    /// Pid of each selected role, keyed by role name.
    pub fn get_role_pids(&self, selector: &str) -> Result<BTreeMap<String, Option<u32>>> {
        self.backend.get_role_pids(&self.select_roles(selector)?)
    }

    /// Restart the selected roles and make sure the NodeManagers among them
    /// really got a new process.
    ///
    /// NodeManagers whose pid did not change are killed and started again;
    /// if even that leaves the pid unchanged the restart fails.
    pub fn restart_with_guarantee(&self, selector: &str, sleep_after: u64) -> Result<()> {
        let roles = self.select_roles(selector)?;
        let node_managers: Vec<&Role> = roles
            .iter()
            .copied()
            .filter(|role| role.kind == RoleKind::NodeManager)
            .collect();

        let before = self.backend.get_role_pids(&node_managers)?;
        for cmd in self.backend.restart_roles(&roles)? {
            cmd.run()?;
        }
        let after = self.backend.get_role_pids(&node_managers)?;

        let stuck = unchanged_pids(&before, &after);
        if stuck.is_empty() {
            return Ok(());
        }
        log::warn!("Pids of {} did not change, force restarting", stuck.join(", "));
        let stuck_roles: Vec<&Role> = node_managers
            .iter()
            .copied()
            .filter(|role| stuck.contains(&role.name))
            .collect();
        self.backend.force_restart_roles(&stuck_roles, sleep_after)?;

        let forced = self.backend.get_role_pids(&stuck_roles)?;
        let still = unchanged_pids(&before, &forced);
        if still.is_empty() {
            Ok(())
        } else {
            Err(Error::RestartNotEffective { roles: still })
        }
    }

    /// Restart the whole cluster.
    pub fn restart(&self) -> Result<()> {
        self.backend.restart_cluster(self.name())
    }

    /// Client of the first ResourceManager.
    pub fn rm_api(&self) -> Result<RmApi> {
        let rm = selector::select(RESOURCE_MANAGERS, &self.topology)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoRoles {
                selector: RESOURCE_MANAGERS.to_string(),
            })?;
        Ok(RmApi::new(rm.host.address()))
    }

    /// ResourceManager cluster metrics.
    pub fn get_metrics(&self) -> Result<Value> {
        self.rm_api()?.metrics()
    }

    /// Capacity scheduler queue tree.
    pub fn get_queues(&self) -> Result<QueueNode> {
        self.rm_api()?.queues()
    }

    /// Apply a scheduler configuration mutation.
    pub fn mutate_scheduler(&self, request: &MutationRequest) -> Result<()> {
        self.rm_api()?.mutate(request)
    }

    /// Effective configuration of each selected NodeManager, read from its web UI.
    pub fn get_nm_confs(&self, selector: &str) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        self.select_roles(selector)?
            .into_iter()
            .filter(|role| role.kind == RoleKind::NodeManager)
            .map(|role| Ok((role.name.clone(), NmApi::new(role.host.address()).conf()?)))
            .collect()
    }

    /// Copy a local file to every selected host, backing up the destination first.
    pub fn distribute(&self, selector: &str, source: &Path, dest: &Path) -> Result<()> {
        for role in self.select_roles(selector)? {
            log::info!(
                "Distributing local file {} to remote host '{}' path {}",
                source.display(),
                role.name,
                dest.display()
            );
            role.host.make_backup(dest).run()?;
            role.host.upload(source, dest).run()?;
        }
        Ok(())
    }

    /// Config file of each selected role, keyed by role name.
    pub fn get_config(&self, selector: &str, file: ConfigFile) -> Result<BTreeMap<String, Box<dyn ConfigDocument>>> {
        self.backend.get_config(&self.select_roles(selector)?, file, &self.workdir)
    }

    /// Replace the jars of the picked modules on the selected hosts.
    pub fn replace_module_jars(&self, selector: &str, modules: &HadoopDir) -> Result<()> {
        self.backend.replace_module_jars(&self.select_roles(selector)?, modules)
    }

    /// Command listing running applications from a random selected role.
    pub fn get_running_apps<R: Rng + ?Sized>(&self, selector: &str, rng: &mut R) -> Result<Command> {
        Ok(self.backend.get_running_apps(self.select_random_role(selector, rng)?))
    }

    /// Command listing finished applications from a random selected role.
    pub fn get_finished_apps<R: Rng + ?Sized>(&self, selector: &str, rng: &mut R) -> Result<Command> {
        Ok(self.backend.get_finished_apps(self.select_random_role(selector, rng)?))
    }

    /// Copy a local file to the selected hosts without a backup.
    pub fn upload_file(&self, selector: &str, local_file: &Path, target: &Path) -> Result<()> {
        self.backend.upload_file(&self.select_roles(selector)?, local_file, target)
    }

    /// Compile a Java source file on the selected hosts.
    pub fn compile_java(&self, selector: &str, file: &str, target_dir: &str) -> Result<()> {
        self.backend.compile_java(&self.select_roles(selector)?, file, target_dir)
    }

    /// Run a Java main class on the selected hosts.
    pub fn execute_java(&self, selector: &str, run: &JavaRun) -> Result<BTreeMap<String, String>> {
        self.backend.execute_java(&self.select_roles(selector)?, run)
    }

    /// Generate key pairs on the selected hosts.
    pub fn generate_keypair(&self, selector: &str, options: &KeypairOptions) -> Result<()> {
        self.backend.generate_keypair(&self.select_roles(selector)?, options)
    }

    /// Export certificates on the selected hosts.
    pub fn export_cert_from_keystore(&self, selector: &str, export: &CertExport) -> Result<()> {
        self.backend.export_cert_from_keystore(&self.select_roles(selector)?, export)
    }

    /// Exchange exported certificates between the selected hosts.
    pub fn scp_certs_from_other_hosts(&self, selector: &str, copy: &CertCopy) -> Result<()> {
        self.backend.scp_certs_from_other_hosts(&self.select_roles(selector)?, copy)
    }

    /// Import certificates into truststores on the selected hosts.
    pub fn import_certs(&self, selector: &str, import: &CertImport) -> Result<()> {
        self.backend.import_certs(&self.select_roles(selector)?, import)
    }

    /// Change owner and mode of a file on the selected hosts.
    pub fn modify_file_permissions(&self, selector: &str, file: &str, owner_group: &str, permission: &str) -> Result<()> {
        self.backend
            .modify_file_permissions(&self.select_roles(selector)?, file, owner_group, permission)
    }

    /// Remove large files under `dirs` on the selected hosts.
    pub fn cleanup_files(&self, selector: &str, dirs: &[String], limit_mb: u64, assume_yes: bool) -> Result<()> {
        self.backend
            .cleanup_files(&self.select_roles(selector)?, dirs, limit_mb, assume_yes)
    }
}

/// Roles that had a pid before and still have the same one.
fn unchanged_pids(before: &BTreeMap<String, Option<u32>>, after: &BTreeMap<String, Option<u32>>) -> Vec<String> {
    before
        .iter()
        .filter_map(|(role, pid)| {
            let pid = (*pid)?;
            (after.get(role).copied().flatten() == Some(pid)).then(|| role.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Layout, StandardBackend};
    use crate::host::Host;
    use crate::types::{ClusterKind, ServiceKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn local_layout() -> Layout {
        Layout {
            share_dir: PathBuf::from("share"),
            bin_dir: None,
            log_dir: PathBuf::from("logs"),
            app_log_dir: PathBuf::from("app-logs"),
            config_dir: PathBuf::from("etc"),
            tmp_dir: PathBuf::from("tmp"),
        }
    }

    fn cluster(dirs: &[&Path]) -> Cluster {
        let mut topology = Topology::new(ClusterKind::Standard, "local", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        for (i, dir) in dirs.iter().enumerate() {
            let kind = if i == 0 { RoleKind::ResourceManager } else { RoleKind::NodeManager };
            topology.add_role(yarn, format!("role-{i}"), kind, Host::local(format!("host-{i}"), *dir));
        }
        let backend = StandardBackend::new("host-0", "yarn").with_layout(local_layout());
        Cluster::new(topology, Box::new(backend))
    }

    #[test]
    fn test_run_app_picks_selected_role_deterministically() {
        let dirs: Vec<tempfile::TempDir> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();
        let paths: Vec<&Path> = dirs.iter().map(|d| d.path()).collect();
        let cluster = cluster(&paths);
        let app = Application::DistributedShell { cmd: None, queue: None };

        let first = cluster
            .run_app(&app, "Yarn/NodeManager", &mut StdRng::seed_from_u64(7))
            .unwrap();
        let again = cluster
            .run_app(&app, "Yarn/NodeManager", &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(first.target(), again.target());
        assert_ne!(first.target().unwrap().role, "role-0");
        assert!(first.text().starts_with("yarn org.apache.hadoop.yarn.applications.distributedshell.Client"));
    }

    #[test]
    fn test_run_app_without_roles() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster(&[dir.path()]);
        let app = Application::MapReduce { cmd: None, queue: None };
        let err = cluster
            .run_app(&app, "Hdfs", &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, Error::NoRoles { ref selector } if selector == "Hdfs"));
    }

    #[test]
    fn test_empty_selection_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster(&[dir.path()]);
        assert!(cluster.read_logs("Hdfs", &ReadLogOptions::default()).unwrap().is_empty());
        assert!(cluster.restart_roles("Yarn/DataNode").unwrap().is_empty());
        assert!(matches!(cluster.read_logs("a/b/c", &ReadLogOptions::default()), Err(Error::Selector(_))));
    }

    #[test]
    fn test_distribute_copies_to_every_host() {
        let dirs: Vec<tempfile::TempDir> = (0..2).map(|_| tempfile::tempdir().unwrap()).collect();
        let paths: Vec<&Path> = dirs.iter().map(|d| d.path()).collect();
        for path in &paths {
            fs::write(path.join("hades-distribute.conf"), "old").unwrap();
        }
        let cluster = cluster(&paths);
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("new.conf");
        fs::write(&source, "new").unwrap();

        cluster
            .distribute("Yarn", &source, Path::new("hades-distribute.conf"))
            .unwrap();
        for path in &paths {
            assert_eq!(fs::read_to_string(path.join("hades-distribute.conf")).unwrap(), "new");
        }
    }

    #[test]
    fn test_rm_api_uses_first_resource_manager() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = cluster(&[dir.path()]);
        assert_eq!(cluster.rm_api().unwrap().base(), "http://host-0:8088/ws/v1/cluster");

        let empty = Cluster::new(
            Topology::new(ClusterKind::Standard, "", CommandSettings::default()),
            Box::new(StandardBackend::new("rm", "yarn")),
        );
        assert!(matches!(empty.rm_api(), Err(Error::NoRoles { .. })));
    }

    #[test]
    fn test_unchanged_pids() {
        let before = BTreeMap::from([
            ("nm-1".to_string(), Some(100)),
            ("nm-2".to_string(), Some(200)),
            ("nm-3".to_string(), None),
        ]);
        let after = BTreeMap::from([
            ("nm-1".to_string(), Some(100)),
            ("nm-2".to_string(), Some(201)),
            ("nm-3".to_string(), Some(300)),
        ]);
        assert_eq!(unchanged_pids(&before, &after), vec!["nm-1"]);

        let stopped = BTreeMap::from([("nm-1".to_string(), None)]);
        assert!(unchanged_pids(&before, &stopped).is_empty());
    }

    #[test]
    fn test_from_manifest() {
        let mut manifest = ClusterManifest::new(ClusterKind::Standard, "c1");
        manifest.add_role(
            "yarn",
            "nm-1",
            crate::manifest::RoleManifest {
                kind: RoleKind::NodeManager,
                host: "nm-1.example.com".to_string(),
                user: String::new(),
            },
        );
        let cluster = Cluster::from_manifest(
            &manifest,
            Box::new(StandardBackend::new("rm", "yarn")),
            CommandSettings::default(),
        )
        .unwrap();
        assert_eq!(cluster.name(), "c1");
        let roles = cluster.select_roles("yarn/nodemanager").unwrap();
        assert_eq!(roles[0].host.user(), "yarn");
    }

    /// Backend answering pid lookups from a script and recording force restarts.
    struct PidScriptBackend {
        layout: Layout,
        answers: Mutex<VecDeque<Vec<(&'static str, u32)>>>,
        restarted: Arc<Mutex<Vec<String>>>,
        forced: Arc<Mutex<Vec<String>>>,
    }

    impl Backend for PidScriptBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn kind(&self) -> ClusterKind {
            ClusterKind::Standard
        }

        fn layout(&self) -> &Layout {
            &self.layout
        }

        fn host(&self, address: &str, _user: &str) -> Host {
            Host::local(address, address)
        }

        fn discover(&self) -> Result<ClusterManifest> {
            Err(Error::unsupported(self.name(), "discover"))
        }

        fn restart_roles(&self, roles: &[&Role]) -> Result<Vec<Command>> {
            let mut restarted = self.restarted.lock().unwrap();
            restarted.extend(roles.iter().map(|role| role.name.clone()));
            Ok(Vec::new())
        }

        fn force_restart_roles(&self, roles: &[&Role], _sleep_after: u64) -> Result<()> {
            let mut forced = self.forced.lock().unwrap();
            forced.extend(roles.iter().map(|role| role.name.clone()));
            Ok(())
        }

        fn get_role_pids(&self, roles: &[&Role]) -> Result<BTreeMap<String, Option<u32>>> {
            let answer = self.answers.lock().unwrap().pop_front().unwrap();
            Ok(roles
                .iter()
                .map(|role| {
                    let pid = answer.iter().find(|(name, _)| *name == role.name).map(|(_, pid)| *pid);
                    (role.name.clone(), pid)
                })
                .collect())
        }
    }

    struct Recorded {
        restarted: Arc<Mutex<Vec<String>>>,
        forced: Arc<Mutex<Vec<String>>>,
    }

    /// One ResourceManager and two NodeManagers; `answers` are the pid
    /// lookups in the order the restart performs them.
    fn scripted_cluster(answers: Vec<Vec<(&'static str, u32)>>) -> (Cluster, Recorded) {
        let restarted = Arc::new(Mutex::new(Vec::new()));
        let forced = Arc::new(Mutex::new(Vec::new()));
        let backend = PidScriptBackend {
            layout: local_layout(),
            answers: Mutex::new(answers.into()),
            restarted: Arc::clone(&restarted),
            forced: Arc::clone(&forced),
        };
        let mut topology = Topology::new(ClusterKind::Standard, "scripted", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        topology.add_role(yarn, "rm", RoleKind::ResourceManager, Host::local("host-0", "."));
        topology.add_role(yarn, "nm-1", RoleKind::NodeManager, Host::local("host-1", "."));
        topology.add_role(yarn, "nm-2", RoleKind::NodeManager, Host::local("host-2", "."));
        (Cluster::new(topology, Box::new(backend)), Recorded { restarted, forced })
    }

    #[test]
    fn test_restart_with_guarantee_new_pids() {
        let (cluster, recorded) = scripted_cluster(vec![
            vec![("nm-1", 100), ("nm-2", 200)],
            vec![("nm-1", 101), ("nm-2", 201)],
        ]);
        cluster.restart_with_guarantee("Yarn", 0).unwrap();
        assert_eq!(*recorded.restarted.lock().unwrap(), ["rm", "nm-1", "nm-2"]);
        assert!(recorded.forced.lock().unwrap().is_empty());
    }

    #[test]
    fn test_restart_with_guarantee_forces_stuck_node_managers() {
        let (cluster, recorded) = scripted_cluster(vec![
            vec![("nm-1", 100), ("nm-2", 200)],
            vec![("nm-1", 100), ("nm-2", 201)],
            vec![("nm-1", 102)],
        ]);
        cluster.restart_with_guarantee("Yarn", 0).unwrap();
        assert_eq!(*recorded.forced.lock().unwrap(), ["nm-1"]);
    }

    #[test]
    fn test_restart_with_guarantee_fails_when_force_has_no_effect() {
        let (cluster, recorded) = scripted_cluster(vec![
            vec![("nm-1", 100), ("nm-2", 200)],
            vec![("nm-1", 100), ("nm-2", 200)],
            vec![("nm-1", 100), ("nm-2", 202)],
        ]);
        let err = cluster.restart_with_guarantee("Yarn/NodeManager", 0).unwrap_err();
        assert!(matches!(err, Error::RestartNotEffective { ref roles } if roles == &["nm-1".to_string()]));
        assert_eq!(*recorded.forced.lock().unwrap(), ["nm-1", "nm-2"]);
    }
}
