use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::naming::types::{ClientId, CompletedPattern, Service};

/// Address of one published instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstancePublishInfo {
    pub ip: String,
    pub port: u16,
}

impl InstancePublishInfo {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }
}

/// What a client owned at the moment it was released.
///
/// The connection layer owns the live client state; the index only ever sees
/// this snapshot, inside a `ClientRelease` event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSnapshot {
    client_id: ClientId,
    published: HashMap<Service, InstancePublishInfo>,
    subscribed: HashSet<Service>,
    fuzzy_patterns: HashSet<CompletedPattern>,
}

impl ClientSnapshot {
    pub fn new(client_id: impl Into<ClientId>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub fn with_published(mut self, service: Service, instance: InstancePublishInfo) -> Self {
        self.published.insert(service, instance);
        self
    }

    pub fn with_subscribed(mut self, service: Service) -> Self {
        self.subscribed.insert(service);
        self
    }

    pub fn with_fuzzy_pattern(mut self, pattern: impl Into<CompletedPattern>) -> Self {
        self.fuzzy_patterns.insert(pattern.into());
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn published_services(&self) -> impl Iterator<Item = (&Service, &InstancePublishInfo)> {
        self.published.iter()
    }

    pub fn subscribed_services(&self) -> impl Iterator<Item = &Service> {
        self.subscribed.iter()
    }

    pub fn fuzzy_patterns(&self) -> impl Iterator<Item = &CompletedPattern> {
        self.fuzzy_patterns.iter()
    }
}
