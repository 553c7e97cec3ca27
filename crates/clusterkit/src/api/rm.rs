//! ResourceManager REST API (`ws/v1/cluster`).

use serde::Deserialize;
use serde_json::Value;

use super::{SIMPLE_AUTH, agent, check, http_address};
use crate::api::mutation::MutationRequest;
use crate::api::queue::QueueNode;
use crate::error::{Error, Result};

const PREFIX: &str = "ws/v1/cluster";
const DEFAULT_PORT: u16 = 8088;

/// A NodeManager as listed by the ResourceManager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmNode {
    /// Node id, `host:port`
    pub id: String,
    /// Hostname of the node
    pub node_host_name: String,
    /// Node state, e.g. `RUNNING` or `LOST`
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct NodesResponse {
    nodes: Option<NodeList>,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    node: Vec<RmNode>,
}

/// Client of one ResourceManager.
pub struct RmApi {
    agent: ureq::Agent,
    base: String,
}

impl RmApi {
    /// Client for the ResourceManager at `address` (port 8088 unless given).
    pub fn new(address: &str) -> Self {
        Self {
            agent: agent(),
            base: format!("{}/{PREFIX}", http_address(address, DEFAULT_PORT)),
        }
    }

    /// Base URL of every request.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The `clusterMetrics` object.
    pub fn metrics(&self) -> Result<Value> {
        let mut data = self.get("metrics")?;
        data.get_mut("clusterMetrics")
            .map(Value::take)
            .ok_or_else(|| Error::InvalidResponse("missing clusterMetrics".to_string()))
    }

    /// Raw scheduler information.
    pub fn scheduler(&self) -> Result<Value> {
        self.get("scheduler")
    }

    /// Capacity scheduler queue tree.
    pub fn queues(&self) -> Result<QueueNode> {
        QueueNode::from_scheduler_info(&self.scheduler()?)
    }

    /// NodeManagers known to the ResourceManager.
    pub fn nodes(&self) -> Result<Vec<RmNode>> {
        let url = format!("{}/nodes", self.base);
        log::debug!("GET {url}");
        let mut response = check(self.agent.get(&url).header("Accept", "application/json").call()?)?;
        let response: NodesResponse = response.body_mut().read_json()?;
        Ok(response.nodes.map(|n| n.node).unwrap_or_default())
    }

    /// Apply a scheduler configuration mutation.
    pub fn mutate(&self, request: &MutationRequest) -> Result<()> {
        let url = format!("{}/scheduler-conf?{SIMPLE_AUTH}", self.base);
        let body = request.to_xml(false)?;
        log::debug!("PUT {url}\n{body}");
        check(
            self.agent
                .put(&url)
                .header("Content-Type", "application/xml")
                .send(body.as_str())?,
        )?;
        Ok(())
    }

    fn get(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}/{endpoint}", self.base);
        log::debug!("GET {url}");
        let mut response = check(self.agent.get(&url).header("Accept", "application/json").call()?)?;
        Ok(response.body_mut().read_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::serve_once;

    #[test]
    fn test_base_url() {
        assert_eq!(RmApi::new("resourcemanager").base(), "http://resourcemanager:8088/ws/v1/cluster");
        assert_eq!(RmApi::new("http://rm-1:8090").base(), "http://rm-1:8090/ws/v1/cluster");
    }

    #[test]
    fn test_parse_nodes() {
        let body = r#"{"nodes":{"node":[
            {"id":"nm-1:45454","nodeHostName":"nm-1","state":"RUNNING","rack":"/default-rack"},
            {"id":"nm-2:45454","nodeHostName":"nm-2","state":"LOST"}]}}"#;
        let response: NodesResponse = serde_json::from_str(body).unwrap();
        let nodes = response.nodes.unwrap().node;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].node_host_name, "nm-2");
        assert_eq!(nodes[1].state, "LOST");
    }

    #[test]
    fn test_parse_empty_nodes() {
        let response: NodesResponse = serde_json::from_str(r#"{"nodes":null}"#).unwrap();
        assert!(response.nodes.is_none());
    }

    #[test]
    fn test_error_body_becomes_reason() {
        let address = serve_once("400 Bad Request", "Failed to re-init queues");
        let err = RmApi::new(&address).metrics().unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
        assert!(err.to_string().contains("Failed to re-init queues"));
    }

    #[test]
    fn test_mutation_rejection_carries_reason() {
        let address = serve_once("400 Bad Request", "Failed to re-init queues : queue root.b not found");
        let mut request = MutationRequest::new();
        request.remove_queue("root.b");
        let err = RmApi::new(&address).mutate(&request).unwrap_err();
        assert!(err.to_string().contains("queue root.b not found"));
    }
}
