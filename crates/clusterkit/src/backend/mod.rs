//! Execution backends.
//!
//! A backend turns abstract cluster operations into commands for one cluster
//! management technology and discovers the topology it manages. The trait
//! provides host-generic implementations of most operations (they only need
//! the role's [`Host`] and the backend's [`Layout`]); backends override what
//! their technology does differently.
//!
//! Three backends exist:
//!
//! - [`cm::CmBackend`]: clusters managed through a Cloudera Manager style REST API
//! - [`hadock::HadockBackend`]: Docker Compose simulated clusters
//! - [`standard::StandardBackend`]: plain hosts reachable over SSH

pub mod cm;
pub mod hadock;
pub mod standard;

use chrono::Utc;
use confkit::{ConfigDocument, ConfigFile};
use runkit::Command;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::{AppJars, Application};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::manifest::ClusterManifest;
use crate::module::{HadoopDir, jar_subdir};
use crate::types::{ClusterKind, LogLevel, Role, StatusEntry};

pub use cm::CmBackend;
pub use hadock::HadockBackend;
pub use standard::StandardBackend;

const NO_SUCH_FILE: &str = "No such file or directory";
const AUTOGENERATED_ALIAS: &str = "autogenerated";

/// Where a Hadoop installation keeps its files on every host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Layout {
    /// `share/hadoop` directory holding the module jars
    pub share_dir: PathBuf,
    /// Directory of the `yarn` launcher, when it is not on `PATH`
    pub bin_dir: Option<PathBuf>,
    /// Daemon log directory
    pub log_dir: PathBuf,
    /// Aggregated application (container) log directory
    pub app_log_dir: PathBuf,
    /// Directory of the Hadoop config files
    pub config_dir: PathBuf,
    /// Scratch directory for archives
    pub tmp_dir: PathBuf,
}

impl Layout {
    /// A tarball installation under `/opt/hadoop`.
    pub fn standard() -> Self {
        Self {
            share_dir: PathBuf::from("/opt/hadoop/share/hadoop"),
            bin_dir: Some(PathBuf::from("/opt/hadoop/bin")),
            log_dir: PathBuf::from("/opt/hadoop/logs"),
            app_log_dir: PathBuf::from("/tmp/hadoop-logs"),
            config_dir: PathBuf::from("/opt/hadoop/etc/hadoop"),
            tmp_dir: PathBuf::from("/tmp"),
        }
    }

    /// The images used by Hadock containers.
    pub fn hadock() -> Self {
        Self {
            bin_dir: None,
            config_dir: PathBuf::from("/etc/hadoop"),
            ..Self::standard()
        }
    }

    /// A parcel based installation managed by CM.
    pub fn cm() -> Self {
        Self {
            share_dir: PathBuf::from("/opt/cloudera/parcels/CDH/lib/hadoop"),
            bin_dir: None,
            log_dir: PathBuf::from("/var/log"),
            app_log_dir: PathBuf::from("/yarn/container-logs"),
            config_dir: PathBuf::from("/etc/hadoop/conf"),
            tmp_dir: PathBuf::from("/tmp"),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::standard()
    }
}

/// How [`Backend::read_log`] reads a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadLogOptions {
    /// Keep reading as the log grows
    pub follow: bool,
    /// Only the last N lines
    pub tail: Option<usize>,
    /// Fetch the whole file instead of printing it
    pub download: bool,
}

/// Options of [`Backend::update_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Delete the downloaded original after uploading the merged file
    pub no_backup: bool,
    /// Local directory for downloaded and merged files
    pub workdir: PathBuf,
    /// Start from an empty document when the remote file does not exist
    pub allow_empty: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            no_backup: false,
            workdir: PathBuf::from("."),
            allow_empty: false,
        }
    }
}

/// Parameters of `keytool -genkeypair`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairOptions {
    /// Distinguished name
    pub dname: String,
    /// Keystore file
    pub keystore: String,
    /// Keystore password
    pub store_pass: String,
    /// Key alias; `autogenerated` derives one from the host address
    pub alias: String,
    /// `-ext` values; `$HOSTNAME` is replaced with the host address
    pub extensions: Vec<String>,
    /// Key algorithm
    pub key_alg: String,
    /// Key size in bits
    pub keysize: u32,
    /// Validity in days
    pub validity: u32,
}

impl Default for KeypairOptions {
    fn default() -> Self {
        Self {
            dname: String::new(),
            keystore: String::new(),
            store_pass: String::new(),
            alias: AUTOGENERATED_ALIAS.to_string(),
            extensions: Vec::new(),
            key_alg: "RSA".to_string(),
            keysize: 2048,
            validity: 3650,
        }
    }
}

/// Parameters of `keytool -exportcert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertExport {
    /// Directory the certificate is written to, emptied first
    pub dest_dir: String,
    /// Certificate file extension, e.g. `pem`
    pub cert_ext: String,
    /// Key alias; `autogenerated` derives one from the host address
    pub alias: String,
    /// Keystore file
    pub keystore: String,
    /// Keystore password
    pub store_pass: String,
}

/// Parameters for copying exported certificates between hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertCopy {
    /// Directory holding the exported certificate on every host
    pub src_dir: String,
    /// Local directory on the receiving host
    pub dest_dir: String,
    /// Certificate file extension
    pub cert_ext: String,
    /// Run `scp` as this user
    pub run_as_user: Option<String>,
    /// User `scp` logs in as on the other hosts
    pub remote_user: String,
}

impl Default for CertCopy {
    fn default() -> Self {
        Self {
            src_dir: String::new(),
            dest_dir: String::new(),
            cert_ext: String::new(),
            run_as_user: None,
            remote_user: "systest".to_string(),
        }
    }
}

/// Parameters of `keytool -importcert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertImport {
    /// Directory holding the certificates
    pub src_dir: String,
    /// File name pattern of the certificates, e.g. `*.pem`
    pub filename_pattern: String,
    /// Truststore file
    pub truststore: String,
    /// Truststore password
    pub store_pass: String,
}

/// A Java main class to run on hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JavaRun {
    /// Classpath
    pub classpath: String,
    /// Directory to run in
    pub working_dir: String,
    /// Fully qualified main class
    pub main_class: String,
    /// Program arguments
    pub args: Vec<String>,
}

/// Backend selection and the settings each backend needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSettings {
    /// Backend kind
    #[serde(rename = "type")]
    pub kind: ClusterKind,
    /// Cluster name, discovered when unset
    pub name: Option<String>,
    /// CM server, e.g. `http://cm-1.example.com:7180`
    pub cm_host: Option<String>,
    /// CM user
    pub cm_username: Option<String>,
    /// CM password
    pub cm_password: Option<String>,
    /// Hadock repository
    pub hadock_path: Option<String>,
    /// Compose file inside the Hadock repository
    pub hadock_compose: Option<String>,
    /// ResourceManager address of a standard cluster
    pub rm_address: Option<String>,
    /// SSH user for standard and CM hosts
    pub user: Option<String>,
    /// Installation layout overriding the backend default
    pub layout: Option<Layout>,
}

/// Create the backend selected by `settings`.
pub fn create(settings: &ClusterSettings) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match settings.kind {
        ClusterKind::Cm => Box::new(CmBackend::from_settings(settings)?),
        ClusterKind::Hadock => Box::new(HadockBackend::from_settings(settings)?),
        ClusterKind::Standard => Box::new(StandardBackend::from_settings(settings)?),
    };
    log::debug!("Using {} backend", backend.name());
    Ok(backend)
}

pub(crate) fn required<'a>(value: &'a Option<String>, attr: &str, kind: ClusterKind) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::setup(attr, format!("required by the {kind} backend")))
}

/// A cluster management technology.
pub trait Backend: Send + Sync {
    /// Backend name for messages.
    fn name(&self) -> &'static str;

    /// Cluster kind this backend manages.
    fn kind(&self) -> ClusterKind;

    /// File system layout of the managed hosts.
    fn layout(&self) -> &Layout;

    /// Host of a role entry of a manifest.
    fn host(&self, address: &str, user: &str) -> Host;

    /// Build a manifest from the backend's own source of truth.
    fn discover(&self) -> Result<ClusterManifest>;

    /// Application jars on the managed hosts.
    fn app_jars(&self) -> AppJars {
        AppJars::under_share(&self.layout().share_dir)
    }

    /// Glob matching the daemon log of `role`.
    fn log_file(&self, role: &Role) -> String {
        format!("{}/*{}*.log", self.layout().log_dir.display(), role.kind.daemon())
    }

    /// Commands printing, following or fetching the daemon log of each role.
    fn read_log(&self, roles: &[&Role], options: &ReadLogOptions) -> Result<Vec<Command>> {
        Ok(roles
            .iter()
            .map(|role| {
                let file = self.log_file(role);
                if options.download {
                    return role.host.download(&file, None);
                }
                let text = match (options.follow, options.tail) {
                    (true, Some(n)) => format!("tail -n {n} -f {file}"),
                    (true, None) => format!("tail -f {file}"),
                    (false, Some(n)) => format!("tail -n {n} {file}"),
                    (false, None) => format!("cat {file}"),
                };
                role.host.create_command(text)
            })
            .collect())
    }

    /// Commands setting the level of a logger on each role's daemon.
    fn set_log_level(&self, roles: &[&Role], package: &str, level: LogLevel) -> Result<Vec<Command>> {
        roles
            .iter()
            .map(|role| {
                let port = web_port(role)?;
                Ok(role.host.create_command(format!(
                    "yarn daemonlog -setlevel `hostname`:{port} {package} {level}"
                )))
            })
            .collect()
    }

    /// Commands printing the level of each logger, grouped by package.
    fn get_log_levels(&self, roles: &[&Role], packages: &[String]) -> Result<BTreeMap<String, Vec<Command>>> {
        let mut cmds: BTreeMap<String, Vec<Command>> = BTreeMap::new();
        for role in roles {
            let port = web_port(role)?;
            for package in packages {
                cmds.entry(package.clone()).or_default().push(
                    role.host
                        .create_command(format!("yarn daemonlog -getlevel `hostname`:{port} {package}")),
                );
            }
        }
        Ok(cmds)
    }

    /// Pack the container logs of an application on every host and return
    /// the commands downloading the archives into `workdir`.
    ///
    /// Hosts where the search fails are skipped. Only when it fails on every
    /// host are the archives removed again and the failures returned together.
    fn compress_app_logs(
        &self,
        roles: &[&Role],
        app_id: &str,
        workdir: &Path,
        compress_dir: bool,
    ) -> Result<Vec<Command>> {
        let app_id = normalize_app_id(app_id);
        log::info!("Looking for application with ID: '{app_id}'");
        let layout = self.layout();
        let find = format!("find {} -name {app_id} -print", layout.app_log_dir.display());

        let mut downloads = Vec::new();
        let mut failures = Vec::new();
        let mut attempted = Vec::new();
        for role in roles {
            let name = format!("{app_id}_{}.tar.gz", role.host.id());
            let archive = layout.tmp_dir.join(&name);
            match pack_app_logs(role, &find, &app_id, &archive, &layout.tmp_dir, compress_dir) {
                Ok(true) => downloads.push(role.host.download(&archive, Some(&workdir.join(&name)))),
                Ok(false) => log::warn!("Find did not return files on host '{}'", role.host),
                Err(err) => {
                    log::debug!("Packing logs of {app_id} failed on {}: {err}", role.host);
                    attempted.push((*role, archive));
                    failures.push(err);
                }
            }
        }

        if !roles.is_empty() && failures.len() == roles.len() {
            log::error!("Command '{find}' failed on all hosts");
            remove_archives(&attempted);
        }
        settle_archives(roles.len(), downloads, failures, "application")
    }

    /// Pack the daemon log directory on every host and return the commands
    /// downloading the archives into `workdir`.
    fn compress_daemon_logs(&self, roles: &[&Role], workdir: &Path) -> Result<Vec<Command>> {
        let layout = self.layout();
        let mut downloads = Vec::new();
        let mut failures = Vec::new();
        let mut attempted = Vec::new();
        for role in roles {
            let dir_name = format!("{}_daemonlogs_{}", role.kind.daemon(), role.host.id());
            let name = format!("{dir_name}.tar.gz");
            let archive = layout.tmp_dir.join(&name);
            let staging = layout.tmp_dir.join(&dir_name);
            log::info!("Creating archive of daemon logs on {}", role.host);
            let text = format!(
                "rm -rf {staging}; mkdir -p {staging} && cp -R {logs}/* {staging} && tar -czvf {archive} -C {tmp} ./{dir_name}",
                staging = staging.display(),
                logs = layout.log_dir.display(),
                archive = archive.display(),
                tmp = layout.tmp_dir.display(),
            );
            match role.host.create_command(text).run() {
                Ok(_) => downloads.push(role.host.download(&archive, Some(&workdir.join(&name)))),
                Err(err) => {
                    attempted.push((*role, archive));
                    failures.push(err);
                }
            }
        }

        if !roles.is_empty() && failures.len() == roles.len() {
            remove_archives(&attempted);
        }
        settle_archives(roles.len(), downloads, failures, "daemon")
    }

    /// Health of the cluster components.
    fn get_cluster_status(&self, _cluster: &str) -> Result<Vec<StatusEntry>> {
        Err(Error::unsupported(self.name(), "get_cluster_status"))
    }

    /// Command submitting `app` from `role`'s host.
    fn run_app(&self, role: &Role, app: &Application) -> Command {
        log::info!("Running app {app} from {role}");
        let text = app.build(&self.app_jars());
        let text = match &self.layout().bin_dir {
            Some(bin) => format!("{}/{text}", bin.display()),
            None => text,
        };
        role.host.create_command(text)
    }

    /// Merge the pending edits of `doc` into the config file of every role.
    ///
    /// For each host the remote file is downloaded into `options.workdir`,
    /// merged, written next to it and uploaded back.
    fn update_config(&self, roles: &[&Role], doc: &mut dyn ConfigDocument, options: &UpdateOptions) -> Result<()> {
        let file = doc.file();
        let remote = self.layout().config_dir.join(file.name());
        for role in roles {
            log::info!("Setting config {file} on {}", role.colorized());
            let local = options.workdir.join(local_config_name(file, role.host.id()));
            let download = role.host.download(&remote, Some(&local));
            if let Err(err) = download.run() {
                if options.allow_empty && is_missing_file(&err) {
                    log::warn!("Config file '{}' not found on host '{}'", remote.display(), role.host.address());
                    fs::write(&local, file.kind().empty_document()).map_err(|e| Error::io(&local, e))?;
                } else {
                    return Err(err.into());
                }
            }

            doc.set_base_config(&local)?;
            doc.set_path(options.workdir.join(file.name()));
            doc.merge()?;
            let merged = doc.commit()?;
            role.host.upload(&merged, &remote).run()?;

            if options.no_backup {
                log::info!("Backup is turned off. Deleting file {}", local.display());
                fs::remove_file(&local).map_err(|e| Error::io(&local, e))?;
            }
        }
        Ok(())
    }

    /// Commands restarting each role's daemon.
    fn restart_roles(&self, roles: &[&Role]) -> Result<Vec<Command>> {
        Ok(roles
            .iter()
            .map(|role| {
                let (launcher, daemon) = (role.kind.launcher(), role.kind.daemon());
                role.host
                    .create_command(format!("{launcher} stop {daemon} && {launcher} start {daemon}"))
            })
            .collect())
    }

    /// Kill each role's daemon and start it again, waiting `sleep_after`
    /// seconds after every start.
    fn force_restart_roles(&self, roles: &[&Role], sleep_after: u64) -> Result<()> {
        for role in roles {
            let pid = role_pid(role)?.ok_or_else(|| Error::Pid {
                role: role.name.clone(),
                message: "no running process".to_string(),
            })?;
            let (launcher, daemon) = (role.kind.launcher(), role.kind.daemon());
            let mut text = format!("kill {pid} && sleep 15 && {launcher} start {daemon}");
            if sleep_after > 0 {
                text.push_str(&format!(" && sleep {sleep_after}"));
            }
            log::info!("Force restarting {}", role.colorized());
            role.host.create_command(text).run()?;
        }
        Ok(())
    }

    /// OS process id of each role's daemon, keyed by role name.
    fn get_role_pids(&self, roles: &[&Role]) -> Result<BTreeMap<String, Option<u32>>> {
        roles
            .iter()
            .map(|role| Ok((role.name.clone(), role_pid(role)?)))
            .collect()
    }

    /// Restart every service of the cluster.
    fn restart_cluster(&self, _cluster: &str) -> Result<()> {
        Err(Error::unsupported(self.name(), "restart_cluster"))
    }

    /// The config file of each role, keyed by role name.
    fn get_config(
        &self,
        roles: &[&Role],
        file: ConfigFile,
        workdir: &Path,
    ) -> Result<BTreeMap<String, Box<dyn ConfigDocument>>> {
        let remote = self.layout().config_dir.join(file.name());
        let mut configs = BTreeMap::new();
        for role in roles {
            let local = workdir.join(local_config_name(file, role.host.id()));
            role.host.download(&remote, Some(&local)).run()?;
            let mut doc = confkit::create(file);
            let loaded = doc.set_base_config(&local);
            fs::remove_file(&local).map_err(|e| Error::io(&local, e))?;
            loaded?;
            configs.insert(role.name.clone(), doc);
        }
        Ok(configs)
    }

    /// Replace the jars of the picked modules with the locally built ones.
    ///
    /// Each host is visited once. The remote jar of a module is looked up on
    /// the first host and reused for the others. When several jars match, the
    /// one named after the project version is taken.
    fn replace_module_jars(&self, roles: &[&Role], modules: &HadoopDir) -> Result<()> {
        let mut seen = HashSet::new();
        let hosts: Vec<&Role> = roles
            .iter()
            .copied()
            .filter(|role| seen.insert(role.host.address().to_string()))
            .collect();
        let jars = modules.jar_paths();
        let mut cache: HashMap<&str, PathBuf> = HashMap::new();

        for role in hosts {
            log::info!("Replacing jars on {}", role.host.address());
            for (module, local_jar) in &jars {
                let remote_jar = match cache.get(module) {
                    Some(jar) => jar.clone(),
                    None => {
                        let dir = self.layout().share_dir.join(jar_subdir(module));
                        let found = role.host.find_file(&dir, &format!("*{module}*")).run()?;
                        let Some(jar) = pick_remote_jar(&found.stdout, &dir, module, modules)? else {
                            log::warn!("No remote jar found for module {module} on {}", role.host);
                            continue;
                        };
                        cache.insert(*module, jar.clone());
                        jar
                    }
                };
                role.host.make_backup(&remote_jar).run()?;
                log::info!(
                    "Replacing remote jar {}:{} with local jar: {}",
                    role.host,
                    remote_jar.display(),
                    local_jar.display()
                );
                role.host.upload(local_jar, &remote_jar).run()?;
            }
        }
        Ok(())
    }

    /// Command listing the running applications, newest first.
    fn get_running_apps(&self, role: &Role) -> Command {
        role.host.create_command(
            "yarn application -list 2>/dev/null | grep -oe application_[0-9]*_[0-9]* | sort -r || true",
        )
    }

    /// Command listing the finished applications, newest first.
    fn get_finished_apps(&self, role: &Role) -> Command {
        role.host.create_command(
            "yarn application -list -appStates FINISHED 2>/dev/null | grep -oe application_[0-9]*_[0-9]* | sort -r || true",
        )
    }

    /// Copy a local file to every role's host.
    fn upload_file(&self, roles: &[&Role], local_file: &Path, target: &Path) -> Result<()> {
        for role in roles {
            log::info!(
                "Uploading local file '{}' on host '{}' to path '{}'",
                local_file.display(),
                role.host,
                target.display()
            );
            role.host.upload(local_file, target).run()?;
        }
        Ok(())
    }

    /// Compile a Java source file on every role's host.
    fn compile_java(&self, roles: &[&Role], file: &str, target_dir: &str) -> Result<()> {
        for role in roles {
            log::info!("Compiling Java file '{file}' on host '{}' to '{target_dir}'", role.host);
            role.host
                .create_command(format!(
                    "mkdir -p {target_dir} && cp {file} {target_dir} && cd {target_dir} && javac -d . *.java"
                ))
                .run()?;
        }
        Ok(())
    }

    /// Run a Java main class on every role's host.
    ///
    /// The program must print exactly two lines; the second one is returned
    /// per host id.
    fn execute_java(&self, roles: &[&Role], run: &JavaRun) -> Result<BTreeMap<String, String>> {
        let mut outputs = BTreeMap::new();
        for role in roles {
            let text = format!(
                "cd {} && java -classpath {} {} {}",
                run.working_dir,
                run.classpath,
                run.main_class,
                run.args.join(" ")
            );
            log::info!("Executing Java main class '{}' on host '{}'", run.main_class, role.host);
            let output = role.host.create_command(text.trim_end()).run()?;
            match output.stdout.as_slice() {
                [_, second] => {
                    outputs.insert(role.host.id().to_string(), second.clone());
                }
                other => {
                    return Err(Error::Other(format!(
                        "expected a 2-line stdout from '{}', got: {other:?}",
                        text.trim_end()
                    )));
                }
            }
        }
        Ok(outputs)
    }

    /// Generate a key pair in a keystore on every role's host.
    fn generate_keypair(&self, roles: &[&Role], options: &KeypairOptions) -> Result<()> {
        for role in roles {
            let extensions: String = options
                .extensions
                .iter()
                .map(|ext| format!("-ext {} ", ext.replace("$HOSTNAME", role.host.address())))
                .collect();
            let text = format!(
                "keytool -v -genkeypair -dname \"{}\" -keystore {ks} -storepass {pass} {} -keyalg {} -keysize {} -validity {} {extensions}&& keytool -list -keystore {ks} -storepass {pass}",
                options.dname,
                alias_arg(&options.alias, role.host.address()),
                options.key_alg,
                options.keysize,
                options.validity,
                ks = options.keystore,
                pass = options.store_pass,
            );
            log_all(&role.host.create_command(text).run()?);
        }
        Ok(())
    }

    /// Export each host's certificate into `dest_dir` as `server-<n>.<ext>`.
    fn export_cert_from_keystore(&self, roles: &[&Role], export: &CertExport) -> Result<()> {
        for role in roles {
            let dest = &export.dest_dir;
            let file = format!("{dest}/{}.{}", server_name(role.host.address()), export.cert_ext);
            let text = format!(
                "mkdir -p {dest} && rm -f {dest}/* && keytool -v -exportcert -file {file} {} -keystore {} -storepass {} -rfc && ls -la {dest}",
                alias_arg(&export.alias, role.host.address()),
                export.keystore,
                export.store_pass,
            );
            log_all(&role.host.create_command(text).run()?);
        }
        Ok(())
    }

    /// Copy the exported certificate of every other host onto each host.
    fn scp_certs_from_other_hosts(&self, roles: &[&Role], copy: &CertCopy) -> Result<()> {
        for role in roles {
            for other in roles.iter().filter(|other| other.host.address() != role.host.address()) {
                let address = other.host.address();
                let source = format!("{}/{}.{}", copy.src_dir, server_name(address), copy.cert_ext);
                let sudo = copy
                    .run_as_user
                    .as_ref()
                    .map(|user| format!("sudo -u {user} "))
                    .unwrap_or_default();
                let text = format!(
                    "{sudo}scp -o StrictHostKeyChecking=no {}@{address}:{source} {dest} && ls -la {dest}",
                    copy.remote_user,
                    dest = copy.dest_dir,
                );
                log_all(&role.host.create_command(text).run()?);
            }
        }
        Ok(())
    }

    /// Import every matching certificate into a truststore on each host.
    fn import_certs(&self, roles: &[&Role], import: &CertImport) -> Result<()> {
        for role in roles {
            let found = role
                .host
                .create_command(format!("find {}/{}", import.src_dir, import.filename_pattern))
                .run()?;
            for cert in &found.stdout {
                let alias = Path::new(cert)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| cert.clone());
                let text = format!(
                    "keytool -v -importcert -file {cert} -alias {alias} -keystore {ts} -storepass {pass} -noprompt && keytool -list -keystore {ts} -storepass {pass}",
                    ts = import.truststore,
                    pass = import.store_pass,
                );
                log_all(&role.host.create_command(text).run()?);
            }
        }
        Ok(())
    }

    /// `chown` and `chmod` a file on every role's host.
    fn modify_file_permissions(&self, roles: &[&Role], file: &str, owner_group: &str, permission: &str) -> Result<()> {
        if !owner_group.contains(':') {
            return Err(Error::Other(format!(
                "expected owner and group as '<owner>:<group>', got '{owner_group}'"
            )));
        }
        for role in roles {
            role.host.create_command(format!("chown {owner_group} {file}")).run()?;
            role.host.create_command(format!("chmod {permission} {file}")).run()?;
        }
        Ok(())
    }

    /// Delete entries of `dirs` at least `limit_mb` megabytes large.
    ///
    /// The removal command is confirmed interactively unless `assume_yes`.
    fn cleanup_files(&self, roles: &[&Role], dirs: &[String], limit_mb: u64, assume_yes: bool) -> Result<()> {
        for role in roles {
            log::info!("Running cleanup on {}. Dirs: {dirs:?}", role.host.address());
            let mut large = Vec::new();
            for dir in dirs {
                let output = role
                    .host
                    .create_command(format!("du -sm {dir}/* | sort -rn"))
                    .run()?;
                large.extend(large_entries(&output.stdout, limit_mb)?);
            }
            if large.is_empty() {
                continue;
            }

            let rm = format!("rm -rf {}", large.join(" "));
            let confirmed = assume_yes
                || dialoguer::Confirm::new()
                    .with_prompt(format!("Execute '{rm}' on {}?", role.host.address()))
                    .default(false)
                    .interact()
                    .map_err(|e| Error::Other(e.to_string()))?;
            if confirmed {
                role.host.create_command(rm).run()?;
            }
        }
        Ok(())
    }
}

fn web_port(role: &Role) -> Result<u16> {
    role.kind
        .web_port()
        .ok_or_else(|| Error::Other(format!("unexpected role type for log levels: {}", role.kind)))
}

/// `application_<n>` for either `application_<n>` or `<n>`.
pub(crate) fn normalize_app_id(app_id: &str) -> String {
    let number = app_id.strip_prefix("application_").unwrap_or(app_id);
    format!("application_{number}")
}

fn pack_app_logs(
    role: &Role,
    find: &str,
    app_id: &str,
    archive: &Path,
    tmp_dir: &Path,
    compress_dir: bool,
) -> runkit::Result<bool> {
    let found = role.host.create_command(find).run()?;
    log::debug!("Find command: '{find}' on host '{}', results: {:?}", role.host, found.stdout);
    if found.stdout.is_empty() {
        return Ok(false);
    }

    log::info!("Creating archive of application logs {app_id} on host {}", role.host);
    let text = if compress_dir {
        let dir_name = format!("{app_id}_{}", role.host.address());
        let staging = tmp_dir.join(&dir_name);
        format!(
            "rm -rf {staging} && mkdir -p {staging} && cp -R {files} {staging} && tar -czvf {archive} -C {tmp} ./{dir_name}",
            staging = staging.display(),
            files = found.stdout.join(" "),
            archive = archive.display(),
            tmp = tmp_dir.display(),
        )
    } else {
        format!("tar -czvf {} {}", archive.display(), found.stdout.join(" "))
    };
    log_all(&role.host.create_command(text).run()?);
    Ok(true)
}

fn remove_archives(attempted: &[(&Role, PathBuf)]) {
    for (role, archive) in attempted {
        log::debug!("Removing file {} from host '{}'", archive.display(), role.host);
        if let Err(err) = role.host.create_command(format!("rm -f {}", archive.display())).run() {
            log::warn!("Could not remove {} from {}: {err}", archive.display(), role.host);
        }
    }
}

/// Verdict of a multi-host archive operation.
///
/// Every host failing is an aggregate error; no host producing an archive
/// is an error; otherwise the downloads of the hosts that succeeded.
pub(crate) fn settle_archives(
    hosts: usize,
    downloads: Vec<Command>,
    failures: Vec<runkit::Error>,
    what: &str,
) -> Result<Vec<Command>> {
    if hosts > 0 && failures.len() == hosts {
        return Err(runkit::Error::Multi(failures).into());
    }
    if downloads.is_empty() {
        return Err(Error::Other(format!(
            "failed to compress {what} logs, no archive created on any of the {hosts} hosts"
        )));
    }
    for failure in &failures {
        log::warn!("Skipping host: {failure}");
    }
    Ok(downloads)
}

fn local_config_name(file: ConfigFile, host: &str) -> String {
    let (stem, ext) = file.split_name();
    format!("{stem}-{host}-{}.{ext}", Utc::now().timestamp())
}

fn is_missing_file(err: &runkit::Error) -> bool {
    err.stderr().iter().any(|line| line.contains(NO_SUCH_FILE)) || err.to_string().contains(NO_SUCH_FILE)
}

fn role_pid(role: &Role) -> Result<Option<u32>> {
    let cmd = role
        .host
        .create_command(format!("jps | grep -iw {}", role.kind.jps_name()));
    match cmd.run() {
        Ok(output) => parse_pid(&role.name, &output.stdout),
        // grep exits with 1 when nothing matched
        Err(runkit::Error::Execution { code: Some(1), .. }) => {
            log::warn!("No {} process is running on host {}", role.kind, role.host);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Pid from `jps` lines filtered to one daemon.
pub(crate) fn parse_pid(role: &str, lines: &[String]) -> Result<Option<u32>> {
    let lines: Vec<&String> = lines.iter().filter(|line| !line.trim().is_empty()).collect();
    match lines.as_slice() {
        [] => Ok(None),
        [line] => {
            let pid = line.split_whitespace().next().unwrap_or_default();
            pid.parse().map(Some).map_err(|_| Error::Pid {
                role: role.to_string(),
                message: format!("unexpected jps output '{line}'"),
            })
        }
        many => Err(Error::Pid {
            role: role.to_string(),
            message: format!("more than one matching process: {many:?}"),
        }),
    }
}

fn pick_remote_jar(found: &[String], dir: &Path, module: &str, modules: &HadoopDir) -> Result<Option<PathBuf>> {
    match found {
        [] => Ok(None),
        [jar] => Ok(Some(PathBuf::from(jar))),
        many => {
            log::debug!("Found ambiguous jars for module '{module}': {many:?}");
            let expected = dir.join(format!("{module}-{}.jar", modules.project_version()?));
            if many.iter().any(|jar| Path::new(jar) == expected) {
                Ok(Some(expected))
            } else {
                Err(Error::Other(format!(
                    "found ambiguous jars for module '{module}': {}; expected {}",
                    many.join(", "),
                    expected.display()
                )))
            }
        }
    }
}

/// Certificate name derived from the digits of a host address.
pub(crate) fn server_name(address: &str) -> String {
    let digits: Vec<char> = address.chars().filter(char::is_ascii_digit).collect();
    match digits.as_slice() {
        [] => format!("server-{address}"),
        [d] => format!("server-{d}"),
        [d1, d2] => format!("server-{d1}_{d2}"),
        [.., last] => format!("server-{last}"),
    }
}

fn alias_arg(alias: &str, address: &str) -> String {
    match alias {
        "" => String::new(),
        AUTOGENERATED_ALIAS => format!("-alias {}", server_name(address)),
        alias => format!("-alias {alias}"),
    }
}

fn large_entries(du: &[String], limit_mb: u64) -> Result<Vec<String>> {
    let mut large = Vec::new();
    for line in du {
        let Some((size, file)) = line.split_once('\t') else {
            return Err(Error::Other(format!("unexpected du output line: '{line}'")));
        };
        let size: u64 = size
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("unexpected du size: '{line}'")))?;
        if size >= limit_mb {
            log::info!("Detected large file: {size}M\t{file}");
            large.push(file.to_string());
        }
    }
    Ok(large)
}

fn log_all(output: &runkit::Output) {
    log::debug!("stdout: {:?}", output.stdout);
    log::debug!("stderr: {:?}", output.stderr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandSettings;
    use crate::types::{RoleKind, ServiceKind, Topology};
    use confkit::ConfigFile;
    use std::collections::BTreeMap;

    struct LocalBackend {
        layout: Layout,
    }

    impl LocalBackend {
        fn new() -> Self {
            Self {
                layout: Layout {
                    share_dir: PathBuf::from("share"),
                    bin_dir: None,
                    log_dir: PathBuf::from("logs"),
                    app_log_dir: PathBuf::from("app-logs"),
                    config_dir: PathBuf::from("etc"),
                    tmp_dir: PathBuf::from("tmp"),
                },
            }
        }
    }

    impl Backend for LocalBackend {
        fn name(&self) -> &'static str {
            "local"
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
    }

    struct Cluster {
        dirs: Vec<tempfile::TempDir>,
        topology: Topology,
    }

    /// Three local hosts, each with `app-logs`, `logs`, `etc` and `tmp` directories.
    fn local_cluster() -> Cluster {
        let mut dirs = Vec::new();
        let mut topology = Topology::new(ClusterKind::Standard, "local", CommandSettings::default());
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        for name in ["host-a", "host-b", "host-c"] {
            let dir = tempfile::tempdir().unwrap();
            for sub in ["app-logs", "logs", "etc", "tmp"] {
                fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            topology.add_role(yarn, format!("nm-{name}"), RoleKind::NodeManager, Host::local(name, dir.path()));
            dirs.push(dir);
        }
        Cluster { dirs, topology }
    }

    fn work_dir(cluster: &Cluster, index: usize) -> &Path {
        cluster.dirs[index].path()
    }

    fn add_app_logs(dir: &Path, app_id: &str) {
        let container = dir.join("app-logs").join(app_id).join("container_1_0001_01_000001");
        fs::create_dir_all(&container).unwrap();
        fs::write(container.join("stdout"), "done").unwrap();
    }

    #[test]
    fn test_compress_app_logs_tolerates_partial_failure() {
        let cluster = local_cluster();
        add_app_logs(work_dir(&cluster, 0), "application_1_0001");
        add_app_logs(work_dir(&cluster, 2), "application_1_0001");
        fs::remove_dir_all(work_dir(&cluster, 1).join("app-logs")).unwrap();

        let roles: Vec<&Role> = cluster.topology.roles().collect();
        let out = tempfile::tempdir().unwrap();
        let downloads = LocalBackend::new()
            .compress_app_logs(&roles, "1_0001", out.path(), false)
            .unwrap();

        assert_eq!(downloads.len(), 2);
        for cmd in &downloads {
            cmd.run().unwrap();
        }
        assert!(out.path().join("application_1_0001_host-a.tar.gz").exists());
        assert!(out.path().join("application_1_0001_host-c.tar.gz").exists());
        assert!(!out.path().join("application_1_0001_host-b.tar.gz").exists());
    }

    #[test]
    fn test_compress_app_logs_fails_when_every_host_fails() {
        let cluster = local_cluster();
        for i in 0..3 {
            fs::remove_dir_all(work_dir(&cluster, i).join("app-logs")).unwrap();
        }

        let roles: Vec<&Role> = cluster.topology.roles().collect();
        let out = tempfile::tempdir().unwrap();
        let err = LocalBackend::new()
            .compress_app_logs(&roles, "application_1_0001", out.path(), false)
            .unwrap_err();

        match err {
            Error::Command(runkit::Error::Multi(failures)) => assert_eq!(failures.len(), 3),
            other => panic!("expected aggregate failure, got {other}"),
        }
    }

    #[test]
    fn test_compress_app_logs_without_matches() {
        let cluster = local_cluster();
        let roles: Vec<&Role> = cluster.topology.roles().collect();
        let out = tempfile::tempdir().unwrap();
        let err = LocalBackend::new()
            .compress_app_logs(&roles, "application_9_0009", out.path(), false)
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_compress_app_log_dir() {
        let cluster = local_cluster();
        add_app_logs(work_dir(&cluster, 0), "application_1_0002");
        let roles: Vec<&Role> = cluster.topology.roles().take(1).collect();
        let out = tempfile::tempdir().unwrap();
        let downloads = LocalBackend::new()
            .compress_app_logs(&roles, "application_1_0002", out.path(), true)
            .unwrap();
        downloads[0].run().unwrap();
        assert!(out.path().join("application_1_0002_host-a.tar.gz").exists());
    }

    #[test]
    fn test_compress_daemon_logs() {
        let cluster = local_cluster();
        fs::write(work_dir(&cluster, 0).join("logs/hadoop-yarn-nodemanager-a.log"), "started").unwrap();
        let roles: Vec<&Role> = cluster.topology.roles().take(1).collect();
        let out = tempfile::tempdir().unwrap();
        let downloads = LocalBackend::new().compress_daemon_logs(&roles, out.path()).unwrap();
        downloads[0].run().unwrap();
        assert!(out.path().join("nodemanager_daemonlogs_host-a.tar.gz").exists());
    }

    #[test]
    fn test_update_config_allow_empty() {
        let cluster = local_cluster();
        let roles: Vec<&Role> = cluster.topology.roles().collect();
        fs::write(
            work_dir(&cluster, 0).join("etc/yarn-site.xml"),
            "<configuration>\n<property><name>x</name><value>1</value></property>\n</configuration>",
        )
        .unwrap();

        let backend = LocalBackend::new();
        let out = tempfile::tempdir().unwrap();
        let mut doc = confkit::create(ConfigFile::YarnSite);
        doc.extend_with_args(&BTreeMap::from([("x".to_string(), "2".to_string())]));

        let strict = UpdateOptions {
            workdir: out.path().to_path_buf(),
            ..UpdateOptions::default()
        };
        assert!(backend.update_config(&roles[1..2], doc.as_mut(), &strict).is_err());

        let lenient = UpdateOptions {
            allow_empty: true,
            no_backup: true,
            ..strict
        };
        backend.update_config(&roles, doc.as_mut(), &lenient).unwrap();

        for i in 0..3 {
            let merged = fs::read_to_string(work_dir(&cluster, i).join("etc/yarn-site.xml")).unwrap();
            assert!(merged.contains("<value>2</value>"));
            assert_eq!(merged.matches("<name>x</name>").count(), 1);
        }
        let leftovers: Vec<_> = fs::read_dir(out.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("-host-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_get_config() {
        let cluster = local_cluster();
        fs::write(
            work_dir(&cluster, 1).join("etc/core-site.xml"),
            "<configuration><property><name>fs.defaultFS</name><value>hdfs://nn:8020</value></property></configuration>",
        )
        .unwrap();
        let roles: Vec<&Role> = cluster.topology.roles().skip(1).take(1).collect();
        let out = tempfile::tempdir().unwrap();
        let configs = LocalBackend::new()
            .get_config(&roles, ConfigFile::CoreSite, out.path())
            .unwrap();
        assert_eq!(configs["nm-host-b"].to_dict()["fs.defaultFS"], "hdfs://nn:8020");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_log_commands() {
        let cluster = local_cluster();
        let roles: Vec<&Role> = cluster.topology.roles().take(1).collect();
        let backend = LocalBackend::new();

        let follow = ReadLogOptions {
            follow: true,
            ..ReadLogOptions::default()
        };
        assert_eq!(backend.read_log(&roles, &follow).unwrap()[0].text(), "tail -f logs/*nodemanager*.log");
        assert_eq!(
            backend.read_log(&roles, &ReadLogOptions::default()).unwrap()[0].text(),
            "cat logs/*nodemanager*.log"
        );
    }

    #[test]
    fn test_set_log_level_requires_web_port() {
        let mut topology = Topology::new(ClusterKind::Standard, "", CommandSettings::default());
        let hdfs = topology.add_service("Hdfs", ServiceKind::Hdfs);
        topology.add_role(hdfs, "dn-1", RoleKind::DataNode, Host::ssh("dn-1", "hdfs"));
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        topology.add_role(yarn, "rm-1", RoleKind::ResourceManager, Host::ssh("rm-1", "yarn"));

        let backend = LocalBackend::new();
        let rm: Vec<&Role> = topology.roles().skip(1).collect();
        let cmds = backend
            .set_log_level(&rm, "org.apache.hadoop.yarn", LogLevel::Debug)
            .unwrap();
        assert_eq!(
            cmds[0].text(),
            "yarn daemonlog -setlevel `hostname`:8088 org.apache.hadoop.yarn DEBUG"
        );

        let all: Vec<&Role> = topology.roles().collect();
        assert!(backend.set_log_level(&all, "org", LogLevel::Info).is_err());
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("nm", &["12345 NodeManager".to_string()]).unwrap(), Some(12345));
        assert_eq!(parse_pid("nm", &[]).unwrap(), None);
        assert!(matches!(
            parse_pid("nm", &["1 NodeManager".to_string(), "2 NodeManager".to_string()]),
            Err(Error::Pid { .. })
        ));
        assert!(parse_pid("nm", &["garbage".to_string()]).is_err());
    }

    #[test]
    fn test_role_pid_of_missing_process() {
        let cluster = local_cluster();
        let roles: Vec<&Role> = cluster.topology.roles().take(1).collect();
        let pids = LocalBackend::new().get_role_pids(&roles).unwrap();
        assert_eq!(pids["nm-host-a"], None);
    }

    #[test]
    fn test_role_pid_lookup_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CommandSettings {
            hooks: vec!["exit 255".to_string()],
            ..CommandSettings::default()
        };
        let mut topology = Topology::new(ClusterKind::Standard, "local", settings);
        let yarn = topology.add_service("Yarn", ServiceKind::Yarn);
        topology.add_role(yarn, "nm-1", RoleKind::NodeManager, Host::local("host-1", dir.path()));
        let roles: Vec<&Role> = topology.roles().collect();

        let err = LocalBackend::new().get_role_pids(&roles).unwrap_err();
        assert!(matches!(err, Error::Command(runkit::Error::Execution { code: Some(255), .. })));
        let err = LocalBackend::new().force_restart_roles(&roles, 0).unwrap_err();
        assert!(!matches!(err, Error::Pid { .. }));
    }

    #[test]
    fn test_server_name() {
        assert_eq!(server_name("host-1.example.com"), "server-1");
        assert_eq!(server_name("node-1-2.example.com"), "server-1_2");
        assert_eq!(server_name("10.0.0.17"), "server-7");
        assert_eq!(alias_arg("autogenerated", "host-3"), "-alias server-3");
        assert_eq!(alias_arg("", "host-3"), "");
        assert_eq!(alias_arg("mykey", "host-3"), "-alias mykey");
    }

    #[test]
    fn test_normalize_app_id() {
        assert_eq!(normalize_app_id("1657557929851_0006"), "application_1657557929851_0006");
        assert_eq!(normalize_app_id("application_1_0001"), "application_1_0001");
    }

    #[test]
    fn test_large_entries() {
        let du = vec!["512\t/tmp/a".to_string(), "20\t/tmp/b".to_string()];
        assert_eq!(large_entries(&du, 100).unwrap(), vec!["/tmp/a"]);
        assert!(large_entries(&["oops".to_string()], 1).is_err());
    }

    #[test]
    fn test_settle_archives() {
        let failure = || runkit::Error::Execution {
            command: "find".to_string(),
            code: Some(1),
            stdout: vec![],
            stderr: vec![],
        };
        let ok = settle_archives(3, vec![Command::new("a"), Command::new("c")], vec![failure()], "application");
        assert_eq!(ok.unwrap().len(), 2);

        let all = settle_archives(2, vec![], vec![failure(), failure()], "application");
        assert!(matches!(all, Err(Error::Command(runkit::Error::Multi(ref f))) if f.len() == 2));

        assert!(matches!(settle_archives(2, vec![], vec![], "daemon"), Err(Error::Other(_))));
    }

    #[test]
    fn test_modify_file_permissions_validates_owner() {
        let cluster = local_cluster();
        let roles: Vec<&Role> = cluster.topology.roles().collect();
        assert!(LocalBackend::new()
            .modify_file_permissions(&roles, "f", "yarn", "644")
            .is_err());
    }
}
