use std::collections::HashSet;
use std::fmt;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Client identity as handed out by the connection layer
pub type ClientId = String;

/// Completed fuzzy pattern: `namespace##group@@service`
pub type CompletedPattern = String;

/// Mapping: Service → clients (publishers or exact subscribers)
pub type ServiceClients = DashMap<Service, HashSet<ClientId>>;

/// Mapping: completed pattern → fuzzy subscribers
pub type PatternClients = DashMap<CompletedPattern, HashSet<ClientId>>;

/// Mapping: Service → completed patterns currently matching it
pub type ServicePatterns = DashMap<Service, HashSet<CompletedPattern>>;

/// A discoverable logical service, identified by namespace, group and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Service {
    namespace: String,
    group: String,
    name: String,
}

impl Service {
    pub fn new(namespace: impl Into<String>, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `group@@name`, the form patterns are written against
    pub fn grouped_name(&self) -> String {
        crate::naming::pattern::grouped_name(&self.name, &self.group)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}##{}@@{}", self.namespace, self.group, self.name)
    }
}
