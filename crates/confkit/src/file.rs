//! Registry of the Hadoop config files the engine knows how to edit.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Document format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// Hadoop `<configuration>` XML
    Xml,
    /// Java properties (`key=value`)
    Properties,
    /// Shell script sourced by the daemon launchers
    Shell,
}

impl ConfigKind {
    /// Contents used as a base when the file does not exist yet.
    pub fn empty_document(&self) -> &'static str {
        match self {
            Self::Xml => "<configuration>\n</configuration>",
            Self::Properties | Self::Shell => "",
        }
    }
}

/// A known Hadoop config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFile {
    /// `yarn-site.xml`
    YarnSite,
    /// `capacity-scheduler.xml`
    CapacityScheduler,
    /// `core-site.xml`
    CoreSite,
    /// `mapred-site.xml`
    MapredSite,
    /// `ssl-server.xml`
    SslServer,
    /// `ssl-client.xml`
    SslClient,
    /// `log4j.properties`
    Log4jProperties,
    /// `yarn-env.sh`
    YarnEnv,
}

impl ConfigFile {
    /// Every known config file.
    pub const ALL: [Self; 8] = [
        Self::YarnSite,
        Self::CapacityScheduler,
        Self::CoreSite,
        Self::MapredSite,
        Self::SslServer,
        Self::SslClient,
        Self::Log4jProperties,
        Self::YarnEnv,
    ];

    /// File name on disk.
    pub fn name(&self) -> &'static str {
        match self {
            Self::YarnSite => "yarn-site.xml",
            Self::CapacityScheduler => "capacity-scheduler.xml",
            Self::CoreSite => "core-site.xml",
            Self::MapredSite => "mapred-site.xml",
            Self::SslServer => "ssl-server.xml",
            Self::SslClient => "ssl-client.xml",
            Self::Log4jProperties => "log4j.properties",
            Self::YarnEnv => "yarn-env.sh",
        }
    }

    /// Document format.
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Log4jProperties => ConfigKind::Properties,
            Self::YarnEnv => ConfigKind::Shell,
            _ => ConfigKind::Xml,
        }
    }

    /// File name split into stem and extension, e.g. `("yarn-site", "xml")`.
    pub fn split_name(&self) -> (&'static str, &'static str) {
        self.name().rsplit_once('.').unwrap_or((self.name(), ""))
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|file| file.name() == wanted || file.split_name().0 == wanted)
            .ok_or_else(|| Error::UnknownFile(s.to_string()))
    }
}
