//! Capacity scheduler queue tree.

use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// One queue of the capacity scheduler hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueNode {
    /// Queue name, e.g. `root` or `default`
    pub name: String,
    /// Configured capacity in percent of the parent
    pub capacity: f64,
    /// Child queues
    pub children: Vec<QueueNode>,
}

impl QueueNode {
    /// Build the tree from the ResourceManager `scheduler` response.
    pub fn from_scheduler_info(data: &Value) -> Result<Self> {
        let root = data
            .pointer("/scheduler/schedulerInfo")
            .ok_or_else(|| Error::InvalidResponse("missing scheduler.schedulerInfo".to_string()))?;
        Self::traverse(root)
    }

    fn traverse(data: &Value) -> Result<Self> {
        let name = data
            .get("queueName")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("queue without queueName".to_string()))?;
        let capacity = data.get("capacity").and_then(Value::as_f64).unwrap_or_default();
        let children = match data.pointer("/queues/queue").and_then(Value::as_array) {
            Some(queues) => queues.iter().map(Self::traverse).collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            name: name.to_string(),
            capacity,
            children,
        })
    }

    /// Number of queues in this subtree, this one included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// Render the subtree with box drawing characters.
    pub fn render_tree(&self) -> String {
        let mut out = format!("{self}\n");
        self.render_children("", &mut out);
        out
    }

    fn render_children(&self, indent: &str, out: &mut String) {
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == self.children.len();
            let (branch, next) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
            out.push_str(&format!("{indent}{branch}{child}\n"));
            child.render_children(&format!("{indent}{next}"), out);
        }
    }
}

impl fmt::Display for QueueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scheduler() -> Value {
        json!({
            "scheduler": {
                "schedulerInfo": {
                    "type": "capacityScheduler",
                    "queueName": "root",
                    "capacity": 100.0,
                    "queues": {
                        "queue": [
                            {"queueName": "default", "capacity": 60.0},
                            {
                                "queueName": "team",
                                "capacity": 40.0,
                                "queues": {"queue": [{"queueName": "etl", "capacity": 100.0}]}
                            }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_queue_tree() {
        let root = QueueNode::from_scheduler_info(&scheduler()).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].children[0].name, "etl");
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn test_render_tree() {
        let root = QueueNode::from_scheduler_info(&scheduler()).unwrap();
        assert_eq!(
            root.render_tree(),
            "root: 100\n├── default: 60\n└── team: 40\n    └── etl: 100\n"
        );
    }

    #[test]
    fn test_missing_scheduler_info() {
        assert!(matches!(
            QueueNode::from_scheduler_info(&json!({})),
            Err(Error::InvalidResponse(_))
        ));
    }
}
