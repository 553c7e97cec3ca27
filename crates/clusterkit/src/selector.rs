//! Role selector expressions.
//!
//! ```text
//! selector := [service-filter] ["/" role-filter]
//! filter   := <type> | name=<name>[&type=<type>] | type=<type>[&name=<name>]
//! ```
//!
//! Types match case-insensitively against the service kind (`yarn`, `hdfs`)
//! or the role kind (`resourcemanager`, `ResourceManager`, ...). An empty
//! selector matches every role; a selector without `/` keeps every role of
//! the matching services.
//!
//! A service must satisfy both `name=` and `type=` of its filter. A role is
//! kept when either its name equals `name=` or its kind matches `type=`, so
//! `name=nm-1&type=ResourceManager` selects `nm-1` as well as every ResourceManager.

use crate::error::{Error, Result};
use crate::types::{Role, Service, Topology};

const DELIMITER: char = '/';
const INNER_DELIMITER: char = '&';
const NAME_FIELD: &str = "name=";
const TYPE_FIELD: &str = "type=";

/// One side of a selector expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Exact name to match, empty for any
    pub name: String,
    /// Type token to match, empty for any
    pub kind: String,
}

impl Fragment {
    fn parse(text: &str) -> Self {
        let text = text.trim();
        let extended = text.contains(INNER_DELIMITER)
            || text.starts_with(NAME_FIELD)
            || text.starts_with(TYPE_FIELD);
        if !extended {
            return Self {
                name: String::new(),
                kind: text.to_string(),
            };
        }

        let mut fragment = Self::default();
        for field in text.split(INNER_DELIMITER) {
            if let Some(name) = field.strip_prefix(NAME_FIELD) {
                fragment.name = name.to_string();
            } else if let Some(kind) = field.strip_prefix(TYPE_FIELD) {
                fragment.kind = kind.to_string();
            }
        }
        fragment
    }

    fn is_empty(&self) -> bool {
        self.name.is_empty() && self.kind.is_empty()
    }

    fn matches_service(&self, service: &Service) -> bool {
        let kind_ok = self.kind.is_empty() || service.kind.token().eq_ignore_ascii_case(&self.kind);
        let name_ok = self.name.is_empty() || service.name == self.name;
        kind_ok && name_ok
    }

    fn matches_role(&self, role: &Role) -> bool {
        self.is_empty()
            || (!self.name.is_empty() && self.name == role.name)
            || (!self.kind.is_empty() && role.kind.matches(&self.kind))
    }
}

/// A parsed selector expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// Filter applied to services
    pub service: Fragment,
    /// Filter applied to the roles of matching services
    pub role: Fragment,
}

impl Selector {
    /// Parse a selector expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Self::default());
        }

        let parts: Vec<&str> = expr.split(DELIMITER).collect();
        match parts.as_slice() {
            [service] => Ok(Self {
                service: Fragment::parse(service),
                role: Fragment::default(),
            }),
            [service, role] => Ok(Self {
                service: Fragment::parse(service),
                role: Fragment::parse(role),
            }),
            _ => Err(Error::Selector(expr.to_string())),
        }
    }

    /// Roles of `topology` matched by this selector, in topology order.
    pub fn select<'a>(&self, topology: &'a Topology) -> Vec<&'a Role> {
        topology
            .services()
            .iter()
            .filter(|service| self.service.matches_service(service))
            .flat_map(|service| topology.roles_of(service))
            .filter(|role| self.role.matches_role(role))
            .collect()
    }
}

/// Parse `expr` and select the matching roles of `topology`.
pub fn select<'a>(expr: &str, topology: &'a Topology) -> Result<Vec<&'a Role>> {
    Ok(Selector::parse(expr)?.select(topology))
}
