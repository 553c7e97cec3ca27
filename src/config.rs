use anyhow::{Context, Result, bail};
use clusterkit::{ClusterSettings, CommandSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_compile_cmd() -> String {
    "mvn clean install -Pdist -DskipTests -Dmaven.javadoc.skip=true".to_string()
}

fn default_modules() -> Vec<String> {
    ["hadoop-common", "hadoop-yarn-server-common", "hadoop-yarn-api"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Process configuration, read from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HadesConfig {
    /// Hadoop source checkout
    pub hadoop_path: String,
    /// Directory compiled module jars are copied to
    pub hadoop_jar_path: String,
    #[serde(default = "default_compile_cmd")]
    pub compile_cmd: String,
    pub cmd_prefix: String,
    pub cmd_hooks: Vec<String>,
    pub login_shell: bool,
    #[serde(default = "default_modules")]
    pub default_modules: Vec<String>,
    pub cluster: ClusterSettings,
}

impl Default for HadesConfig {
    fn default() -> Self {
        Self {
            hadoop_path: String::new(),
            hadoop_jar_path: String::new(),
            compile_cmd: default_compile_cmd(),
            cmd_prefix: String::new(),
            cmd_hooks: Vec::new(),
            login_shell: false,
            default_modules: default_modules(),
            cluster: ClusterSettings::default(),
        }
    }
}

impl HadesConfig {
    /// Load the config at `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file {} does not exist. Create one with 'hades init'",
                path.display()
            );
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid {} format", path.display()))?;
        config.cluster.hadock_path = config.cluster.hadock_path.as_deref().map(expand);
        Ok(config)
    }

    /// Save the config to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content + "\n").with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    /// Settings shared by every command of the cluster
    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            prefix: self.cmd_prefix.clone(),
            hooks: self.cmd_hooks.clone(),
            login_shell: self.login_shell,
        }
    }

    /// Expanded Hadoop checkout path
    pub fn hadoop_dir(&self) -> Result<PathBuf> {
        if self.hadoop_path.trim().is_empty() {
            bail!("hadoopPath is not set in the config");
        }
        Ok(PathBuf::from(expand(&self.hadoop_path)))
    }

    /// Expanded jar directory
    pub fn jar_dir(&self) -> Result<PathBuf> {
        if self.hadoop_jar_path.trim().is_empty() {
            bail!("hadoopJarPath is not set in the config");
        }
        Ok(PathBuf::from(expand(&self.hadoop_jar_path)))
    }
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterkit::ClusterKind;
    use tempfile::TempDir;

    #[test]
    fn test_load_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "hadoopPath": "/src/hadoop",
                "cmdPrefix": "sudo -u yarn",
                "cmdHooks": ["source /etc/profile"],
                "loginShell": true,
                "cluster": { "type": "hadock", "hadockPath": "/work/hadock" }
            }"#,
        )
        .unwrap();

        let config = HadesConfig::load(&path).unwrap();
        assert_eq!(config.hadoop_path, "/src/hadoop");
        assert_eq!(config.cluster.kind, ClusterKind::Hadock);
        assert_eq!(config.cluster.hadock_path.as_deref(), Some("/work/hadock"));
        assert_eq!(config.compile_cmd, default_compile_cmd());
        assert_eq!(config.default_modules.len(), 3);

        let settings = config.command_settings();
        assert_eq!(settings.prefix, "sudo -u yarn");
        assert_eq!(settings.hooks, vec!["source /etc/profile".to_string()]);
        assert!(settings.login_shell);
    }

    #[test]
    fn test_missing_config_mentions_init() {
        let dir = TempDir::new().unwrap();
        let err = HadesConfig::load(&dir.path().join("config.json")).unwrap_err();
        assert!(err.to_string().contains("hades init"));
    }

    #[test]
    fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(HadesConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = HadesConfig::default();
        config.cluster.kind = ClusterKind::Cm;
        config.cluster.cm_host = Some("http://cm-1:7180".to_string());
        config.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"cmHost\""));
        assert_eq!(HadesConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_unset_paths_are_errors() {
        let config = HadesConfig::default();
        assert!(config.hadoop_dir().is_err());
        assert!(config.jar_dir().is_err());

        let config = HadesConfig {
            hadoop_jar_path: "/tmp/jars".to_string(),
            ..HadesConfig::default()
        };
        assert_eq!(config.jar_dir().unwrap(), PathBuf::from("/tmp/jars"));
    }
}
