//! Example YARN applications used to put load on a cluster.

use std::fmt;
use std::path::{Path, PathBuf};

const DISTRIBUTED_SHELL_CLIENT: &str = "org.apache.hadoop.yarn.applications.distributedshell.Client";
const DEFAULT_SHELL_COMMAND: &str = "sleep 100";
const DEFAULT_MAPREDUCE_COMMAND: &str = "pi 16 100000";

/// Locations of the application jars on a host. Globs are expanded by the remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppJars {
    /// Distributed shell client jar
    pub distributed_shell: PathBuf,
    /// MapReduce examples jar
    pub mapreduce_examples: PathBuf,
}

impl AppJars {
    /// Jars of a Hadoop distribution whose `share/hadoop` directory is `share`.
    pub fn under_share(share: &Path) -> Self {
        Self {
            distributed_shell: share.join("yarn/hadoop-yarn-applications-distributedshell*.jar"),
            mapreduce_examples: share.join("mapreduce/hadoop-mapreduce-examples*.jar"),
        }
    }
}

/// An application that can be submitted with the `yarn` CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Application {
    /// Distributed shell running one shell command in a container
    DistributedShell {
        /// Shell command, `sleep 100` when unset
        cmd: Option<String>,
        /// Target queue
        queue: Option<String>,
    },
    /// One of the MapReduce example programs
    MapReduce {
        /// Program and arguments, `pi 16 100000` when unset
        cmd: Option<String>,
        /// Target queue
        queue: Option<String>,
    },
}

impl Application {
    /// Parse an application name as accepted on the command line.
    pub fn from_name(name: &str, cmd: Option<String>, queue: Option<String>) -> Option<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "distributedshell" | "dshell" => Some(Self::DistributedShell { cmd, queue }),
            "mapreduce" | "mr" => Some(Self::MapReduce { cmd, queue }),
            _ => None,
        }
    }

    /// The `yarn` invocation submitting this application.
    pub fn build(&self, jars: &AppJars) -> String {
        match self {
            Self::DistributedShell { cmd, queue } => {
                let mut text = format!(
                    "yarn {DISTRIBUTED_SHELL_CLIENT} -jar {} -shell_command \"{}\"",
                    jars.distributed_shell.display(),
                    cmd.as_deref().unwrap_or(DEFAULT_SHELL_COMMAND)
                );
                if let Some(queue) = queue {
                    text.push_str(&format!(" -queue {queue}"));
                }
                text
            }
            Self::MapReduce { cmd, queue } => {
                let cmd = cmd.as_deref().unwrap_or(DEFAULT_MAPREDUCE_COMMAND);
                let jar = jars.mapreduce_examples.display();
                match (queue, cmd.split_once(' ')) {
                    (Some(queue), Some((program, args))) => {
                        format!("yarn jar {jar} {program} -Dmapreduce.job.queuename={queue} {args}")
                    }
                    (Some(queue), None) => format!("yarn jar {jar} {cmd} -Dmapreduce.job.queuename={queue}"),
                    (None, _) => format!("yarn jar {jar} {cmd}"),
                }
            }
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DistributedShell { .. } => "DistributedShell",
            Self::MapReduce { .. } => "MapReduce",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jars() -> AppJars {
        AppJars::under_share(Path::new("/opt/hadoop/share/hadoop"))
    }

    #[test]
    fn test_distributed_shell_defaults() {
        let app = Application::DistributedShell { cmd: None, queue: None };
        assert_eq!(
            app.build(&jars()),
            "yarn org.apache.hadoop.yarn.applications.distributedshell.Client \
             -jar /opt/hadoop/share/hadoop/yarn/hadoop-yarn-applications-distributedshell*.jar \
             -shell_command \"sleep 100\""
        );
    }

    #[test]
    fn test_distributed_shell_queue() {
        let app = Application::DistributedShell {
            cmd: Some("echo hi".to_string()),
            queue: Some("root.a".to_string()),
        };
        assert!(app.build(&jars()).ends_with("-shell_command \"echo hi\" -queue root.a"));
    }

    #[test]
    fn test_mapreduce() {
        let app = Application::MapReduce { cmd: None, queue: None };
        assert_eq!(
            app.build(&jars()),
            "yarn jar /opt/hadoop/share/hadoop/mapreduce/hadoop-mapreduce-examples*.jar pi 16 100000"
        );

        let app = Application::MapReduce {
            cmd: None,
            queue: Some("default".to_string()),
        };
        assert!(app.build(&jars()).ends_with("examples*.jar pi -Dmapreduce.job.queuename=default 16 100000"));
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(
            Application::from_name("distributed-shell", None, None),
            Some(Application::DistributedShell { .. })
        ));
        assert!(matches!(Application::from_name("MapReduce", None, None), Some(Application::MapReduce { .. })));
        assert!(Application::from_name("spark", None, None).is_none());
    }
}
