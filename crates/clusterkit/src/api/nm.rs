//! NodeManager REST API.

use confkit::{ConfigDocument, ConfigFile, XmlConfig};
use std::collections::BTreeMap;

use super::{SIMPLE_AUTH, agent, check, http_address};
use crate::error::Result;

const DEFAULT_PORT: u16 = 8042;

/// Client of one NodeManager.
pub struct NmApi {
    agent: ureq::Agent,
    base: String,
}

impl NmApi {
    /// Client for the NodeManager at `address` (port 8042 unless given).
    pub fn new(address: &str) -> Self {
        Self {
            agent: agent(),
            base: http_address(address, DEFAULT_PORT),
        }
    }

    /// Base URL of every request.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Effective configuration of the NodeManager.
    pub fn conf(&self) -> Result<BTreeMap<String, String>> {
        let url = format!("{}/conf?{SIMPLE_AUTH}", self.base);
        log::debug!("GET {url}");
        let text = check(self.agent.get(&url).call()?)?.body_mut().read_to_string()?;
        parse_conf(&text)
    }
}

fn parse_conf(text: &str) -> Result<BTreeMap<String, String>> {
    let mut doc = XmlConfig::new(ConfigFile::YarnSite);
    doc.set_raw(text)?;
    Ok(doc.to_dict())
}
