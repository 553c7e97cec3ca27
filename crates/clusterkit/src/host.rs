//! Hosts turn shell text into [`Command`]s that run where a role lives.
//!
//! Three variants exist:
//!
//! - SSH hosts run commands through `ssh user@host` and copy files with `scp`
//! - Container hosts run `docker exec <container> bash -c '...'` and copy
//!   with `docker cp`
//! - Local hosts run `bash` in their own working directory and copy with `cp`

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use runkit::{Command, Target, quote};

/// Directory backups of overwritten remote files go to.
pub const BACKUP_DIR: &str = "/tmp/hades_backup";

/// Cluster-wide settings applied to every command a host creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSettings {
    /// Prefix placed before every command, e.g. `sudo -u yarn`
    pub prefix: String,
    /// Commands run before every command, joined with `&&`
    pub hooks: Vec<String>,
    /// Run remote commands in a login shell
    pub login_shell: bool,
}

/// How a host is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    /// A machine reachable over SSH
    Ssh {
        /// Host name or address
        address: String,
        /// Login user
        user: String,
    },
    /// A Docker container on this machine
    Container {
        /// Container name
        container: String,
    },
    /// A directory on this machine standing in for a host
    Local {
        /// Host name used in file names and logs
        name: String,
        /// Directory commands run in
        work_dir: PathBuf,
    },
}

/// The machine (or container) a role runs on.
#[derive(Debug, Clone)]
pub struct Host {
    kind: HostKind,
    settings: Arc<CommandSettings>,
    target: Option<Target>,
}

impl Host {
    fn new(kind: HostKind) -> Self {
        Self {
            kind,
            settings: Arc::default(),
            target: None,
        }
    }

    /// A host reached with `ssh user@address`.
    pub fn ssh(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(HostKind::Ssh {
            address: address.into(),
            user: user.into(),
        })
    }

    /// A Docker container.
    pub fn container(container: impl Into<String>) -> Self {
        Self::new(HostKind::Container {
            container: container.into(),
        })
    }

    /// A local directory acting as a host.
    pub fn local(name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self::new(HostKind::Local {
            name: name.into(),
            work_dir: work_dir.into(),
        })
    }

    pub(crate) fn bind(&mut self, role: &str, settings: Arc<CommandSettings>) {
        self.target = Some(Target::new(role, self.id()));
        self.settings = settings;
    }

    /// How this host is reached.
    pub fn kind(&self) -> &HostKind {
        &self.kind
    }

    /// Address for opening sockets; containers are always `localhost`.
    pub fn address(&self) -> &str {
        match &self.kind {
            HostKind::Ssh { address, .. } => address,
            HostKind::Container { .. } => "localhost",
            HostKind::Local { name, .. } => name,
        }
    }

    /// Identifier used in logs and generated file names.
    pub fn id(&self) -> &str {
        match &self.kind {
            HostKind::Ssh { address, .. } => address,
            HostKind::Container { container } => container,
            HostKind::Local { name, .. } => name,
        }
    }

    /// Login user, empty where none applies.
    pub fn user(&self) -> &str {
        match &self.kind {
            HostKind::Ssh { user, .. } => user,
            _ => "",
        }
    }

    /// A command running `text` on this host, after the cluster prefix and hooks.
    pub fn create_command(&self, text: impl Into<String>) -> Command {
        let text = text.into();
        let settings = &self.settings;
        let cmd = match &self.kind {
            HostKind::Ssh { address, user } => Command::remote(text, user, address)
                .with_prefix(settings.prefix.clone())
                .with_hooks(settings.hooks.clone())
                .login_shell(settings.login_shell),
            HostKind::Container { container } => {
                let inner = Command::new(text)
                    .with_prefix(settings.prefix.clone())
                    .with_hooks(settings.hooks.clone());
                Command::new(format!("docker exec {container} bash -c {}", quote(&inner.script())))
            }
            HostKind::Local { work_dir, .. } => Command::new(text)
                .with_work_dir(work_dir)
                .with_prefix(settings.prefix.clone())
                .with_hooks(settings.hooks.clone()),
        };
        self.attributed(cmd)
    }

    /// A command run on this machine on behalf of the host, e.g. `docker logs`.
    pub fn local_command(&self, text: impl Into<String>) -> Command {
        self.attributed(Command::new(text))
    }

    /// Copy a local file to `dest` on this host.
    pub fn upload(&self, source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Command {
        let (source, dest) = (source.as_ref().display(), dest.as_ref());
        let text = match &self.kind {
            HostKind::Ssh { address, user } => format!("scp {source} {user}@{address}:{}", dest.display()),
            HostKind::Container { container } => format!("docker cp {source} {container}:{}", dest.display()),
            HostKind::Local { work_dir, .. } => format!("cp {source} {}", work_dir.join(dest).display()),
        };
        log::debug!("Uploading local:{source} to {}:{}", self.id(), dest.display());
        self.attributed(Command::new(text))
    }

    /// Fetch `source` from this host.
    ///
    /// `dest` defaults to the current directory; when it is a directory the
    /// remote file name is kept. The returned command records where the file
    /// ends up.
    pub fn download(&self, source: impl AsRef<Path>, dest: Option<&Path>) -> Command {
        let source = source.as_ref();
        let (dest, local_file) = local_target(source, dest);

        let text = match &self.kind {
            HostKind::Ssh { address, user } => {
                format!("scp {user}@{address}:{} {}", source.display(), local_file.display())
            }
            HostKind::Container { container } => {
                format!("docker cp {container}:{} {}", source.display(), local_file.display())
            }
            HostKind::Local { work_dir, .. } => {
                format!("cp {} {}", work_dir.join(source).display(), local_file.display())
            }
        };
        log::debug!("Downloading {}:{} to local:{}", self.id(), source.display(), local_file.display());
        self.attributed(Command::new(text).into_download(dest, local_file))
    }

    /// Save the output of a command run on this machine, e.g. `docker logs`,
    /// as a download named `file_name`. `dest` resolves as in
    /// [`download`](Self::download).
    pub fn download_output(&self, text: &str, file_name: &str, dest: Option<&Path>) -> Command {
        let (dest, local_file) = local_target(Path::new(file_name), dest);
        let text = format!("{text} > {} 2>&1", local_file.display());
        log::debug!("Saving output of {} to local:{}", self.id(), local_file.display());
        self.attributed(Command::new(text).into_download(dest, local_file))
    }

    /// Copy `dest` into [`BACKUP_DIR`] under a timestamped name.
    pub fn make_backup(&self, dest: impl AsRef<Path>) -> Command {
        let dest = dest.as_ref();
        let backup = backup_path(dest, chrono::Utc::now().timestamp());
        self.create_command(format!(
            "mkdir -p {BACKUP_DIR} && cp {} {}",
            dest.display(),
            backup.display()
        ))
    }

    /// List files under `dir` whose name matches `pattern`.
    pub fn find_file(&self, dir: impl AsRef<Path>, pattern: &str) -> Command {
        self.create_command(format!("find {} -name \"{pattern}\"", dir.as_ref().display()))
    }

    fn attributed(&self, cmd: Command) -> Command {
        match &self.target {
            Some(target) => cmd.with_target(target.clone()),
            None => cmd,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Requested destination (defaulting to `.`) and the local file `source` lands in.
fn local_target<'a>(source: &Path, dest: Option<&'a Path>) -> (&'a Path, PathBuf) {
    let dest = dest.unwrap_or_else(|| Path::new("."));
    let local_file = if dest.is_dir() {
        dest.join(source.file_name().unwrap_or(source.as_os_str()))
    } else {
        dest.to_path_buf()
    };
    (dest, local_file)
}

/// `<BACKUP_DIR>/<stem>-<timestamp><suffix>` for a file being overwritten.
pub fn backup_path(dest: &Path, timestamp: i64) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Path::new(BACKUP_DIR).join(format!("{stem}-{timestamp}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use runkit::Shell;

    fn bound(mut host: Host, settings: CommandSettings) -> Host {
        host.bind("nm-1", Arc::new(settings));
        host
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/var/tmp/test.py"), 1_700_000_000),
            PathBuf::from("/tmp/hades_backup/test-1700000000.py")
        );
        assert_eq!(
            backup_path(Path::new("/opt/hadoop/bin/yarn"), 42),
            PathBuf::from("/tmp/hades_backup/yarn-42")
        );
    }

    #[test]
    fn test_ssh_command_applies_settings() {
        let settings = CommandSettings {
            prefix: "sudo -u yarn".to_string(),
            hooks: vec!["kinit -kt yarn.keytab yarn".to_string()],
            login_shell: false,
        };
        let host = bound(Host::ssh("host-1", "systest"), settings);
        let cmd = host.create_command("yarn node -list");

        assert_eq!(cmd.script(), "kinit -kt yarn.keytab yarn && sudo -u yarn yarn node -list");
        assert_eq!(
            cmd.shell(),
            &Shell::Remote {
                user: "systest".to_string(),
                host: "host-1".to_string(),
                login: false,
            }
        );
        assert_eq!(cmd.target().unwrap().to_string(), "[nm-1 | host-1]");
    }

    #[test]
    fn test_container_command_wraps_docker_exec() {
        let settings = CommandSettings {
            prefix: "sudo".to_string(),
            ..CommandSettings::default()
        };
        let host = bound(Host::container("nodemanager1"), settings);
        let cmd = host.create_command("cat /etc/hadoop/yarn-site.xml");

        assert_eq!(
            cmd.text(),
            "docker exec nodemanager1 bash -c 'sudo cat /etc/hadoop/yarn-site.xml'"
        );
        assert_eq!(host.address(), "localhost");
        assert_eq!(host.id(), "nodemanager1");
    }

    #[test]
    fn test_file_transfer_commands() {
        let host = Host::ssh("host-1", "yarn");
        assert_eq!(
            host.upload("/tmp/a.jar", "/opt/hadoop/a.jar").text(),
            "scp /tmp/a.jar yarn@host-1:/opt/hadoop/a.jar"
        );

        let container = Host::container("rm");
        assert_eq!(
            container.upload("yarn-site.xml", "/etc/hadoop/yarn-site.xml").text(),
            "docker cp yarn-site.xml rm:/etc/hadoop/yarn-site.xml"
        );
    }

    #[test]
    fn test_download_into_directory_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::ssh("host-1", "yarn");
        let cmd = host.download("/opt/hadoop/logs/rm.log", Some(dir.path()));

        let download = cmd.download().unwrap();
        assert_eq!(download.local_file, dir.path().join("rm.log"));
        assert_eq!(
            cmd.text(),
            format!("scp yarn@host-1:/opt/hadoop/logs/rm.log {}", dir.path().join("rm.log").display())
        );
    }

    #[test]
    fn test_download_defaults_to_current_dir() {
        let host = Host::container("rm");
        let cmd = host.download("/etc/hadoop/core-site.xml", None);
        assert_eq!(cmd.download().unwrap().local_file, PathBuf::from("./core-site.xml"));
    }

    #[test]
    fn test_download_output_records_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::container("nm1");
        let cmd = host.download_output("docker logs nm1", "nm1.log", Some(dir.path()));

        let local_file = dir.path().join("nm1.log");
        assert_eq!(cmd.download().unwrap().local_file, local_file);
        assert_eq!(cmd.download().unwrap().dest, dir.path());
        assert_eq!(cmd.text(), format!("docker logs nm1 > {} 2>&1", local_file.display()));
    }

    #[test]
    fn test_local_host_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "hello").unwrap();
        let host = Host::local("local-1", dir.path());

        let output = host.create_command("cat data.txt").run().unwrap();
        assert_eq!(output.stdout, vec!["hello"]);

        let out_dir = tempfile::tempdir().unwrap();
        let fetch = host.download("data.txt", Some(out_dir.path()));
        fetch.run().unwrap();
        assert!(out_dir.path().join("data.txt").exists());
    }

    #[test]
    fn test_make_backup_command() {
        let host = Host::ssh("host-1", "yarn");
        let cmd = host.make_backup("/opt/hadoop/share/hadoop/yarn/a.jar");
        assert!(cmd.text().starts_with("mkdir -p /tmp/hades_backup && cp /opt/hadoop/share/hadoop/yarn/a.jar /tmp/hades_backup/a-"));
        assert!(cmd.text().ends_with(".jar"));
    }
}
