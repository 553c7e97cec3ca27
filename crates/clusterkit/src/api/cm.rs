//! Cloudera Manager style REST API.
//!
//! Only the handful of resources the CM backend needs are modelled: clusters,
//! services, roles, hosts, role configuration and restart commands. Responses
//! wrap their payload in an `items` list.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{agent, check, http_address};
use crate::error::Result;

/// Default API version.
pub const DEFAULT_VERSION: &str = "v40";
const DEFAULT_PORT: u16 = 7180;

/// A cluster managed by CM.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCluster {
    /// Cluster identifier used in URLs
    pub name: String,
    /// Human readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A service of a CM cluster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiService {
    /// Service name, e.g. `yarn`
    pub name: String,
    /// Service type, e.g. `YARN`
    #[serde(rename = "type")]
    pub kind: String,
    /// Aggregated health, e.g. `GOOD`
    #[serde(default)]
    pub health_summary: Option<String>,
}

/// Reference from a role to the host it runs on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHostRef {
    /// Host identifier
    pub host_id: String,
    /// Hostname, when the API includes it
    #[serde(default)]
    pub hostname: Option<String>,
}

/// A role of a CM service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRole {
    /// Role name, e.g. `yarn-NODEMANAGER-1a2b`
    pub name: String,
    /// Role type, e.g. `NODEMANAGER`
    #[serde(rename = "type")]
    pub kind: String,
    /// Host of the role
    pub host_ref: ApiHostRef,
}

/// A host known to CM.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHost {
    /// Host identifier
    pub host_id: String,
    /// Hostname
    pub hostname: String,
}

/// One role configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Configuration key
    pub name: String,
    /// Configured value, absent when defaulted
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

/// Client of the CM REST API.
pub struct CmApi {
    agent: ureq::Agent,
    base: String,
    auth: String,
}

impl CmApi {
    /// Connect to `host` (port 7180 unless given) with basic authentication.
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self::with_version(host, username, password, DEFAULT_VERSION)
    }

    /// Like [`new`](Self::new) with an explicit API version such as `v41`.
    pub fn with_version(host: &str, username: &str, password: &str, version: &str) -> Self {
        Self {
            agent: agent(),
            base: format!("{}/api/{version}", http_address(host, DEFAULT_PORT)),
            auth: format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
        }
    }

    /// Base URL of every request.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Every cluster.
    pub fn clusters(&self) -> Result<Vec<ApiCluster>> {
        self.get_items("clusters")
    }

    /// Services of `cluster`.
    pub fn services(&self, cluster: &str) -> Result<Vec<ApiService>> {
        self.get_items(&format!("clusters/{}/services", segment(cluster)))
    }

    /// Roles of `service`.
    pub fn roles(&self, cluster: &str, service: &str) -> Result<Vec<ApiRole>> {
        self.get_items(&format!(
            "clusters/{}/services/{}/roles",
            segment(cluster),
            segment(service)
        ))
    }

    /// Every host.
    pub fn hosts(&self) -> Result<Vec<ApiHost>> {
        self.get_items("hosts")
    }

    /// Configuration of a role.
    pub fn role_config(&self, cluster: &str, service: &str, role: &str) -> Result<Vec<ApiConfig>> {
        self.get_items(&role_config_path(cluster, service, role))
    }

    /// Set configuration entries of a role.
    pub fn update_role_config(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<()> {
        let body = Items {
            items: config
                .iter()
                .map(|(name, value)| ApiConfig {
                    name: name.clone(),
                    value: Some(value.clone()),
                })
                .collect(),
        };
        let url = self.url(&role_config_path(cluster, service, role));
        log::debug!("PUT {url}");
        check(
            self.agent
                .put(&url)
                .header("Authorization", &self.auth)
                .send_json(&body)?,
        )?;
        Ok(())
    }

    /// Restart roles of a service.
    pub fn restart_roles(&self, cluster: &str, service: &str, roles: &[&str]) -> Result<()> {
        let body = Items {
            items: roles.iter().map(|r| (*r).to_string()).collect::<Vec<_>>(),
        };
        let url = self.url(&format!(
            "clusters/{}/services/{}/roleCommands/restart",
            segment(cluster),
            segment(service)
        ));
        log::debug!("POST {url}");
        check(
            self.agent
                .post(&url)
                .header("Authorization", &self.auth)
                .send_json(&body)?,
        )?;
        Ok(())
    }

    /// Restart every service of a cluster.
    pub fn restart_cluster(&self, cluster: &str) -> Result<()> {
        let url = self.url(&format!("clusters/{}/commands/restart", segment(cluster)));
        log::debug!("POST {url}");
        check(self.agent.post(&url).header("Authorization", &self.auth).send_empty()?)?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    fn get_items<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.url(path);
        log::debug!("GET {url}");
        let mut response = check(
            self.agent
                .get(&url)
                .header("Authorization", &self.auth)
                .header("Accept", "application/json")
                .call()?,
        )?;
        let response: Items<T> = response.body_mut().read_json()?;
        Ok(response.items)
    }
}

fn role_config_path(cluster: &str, service: &str, role: &str) -> String {
    format!(
        "clusters/{}/services/{}/roles/{}/config",
        segment(cluster),
        segment(service),
        segment(role)
    )
}

/// Percent-encode the characters that show up in CM cluster names.
fn segment(name: &str) -> String {
    name.replace('%', "%25").replace(' ', "%20").replace('/', "%2F")
}
