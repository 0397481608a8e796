use std::collections::HashSet;

use dashmap::DashMap;
use log::{debug, info};

use crate::error::{ErrorCode, NamingError, Result};
use crate::naming::bus::Subscriber;
use crate::naming::events::{EventKind, NamingEvent};
use crate::naming::types::Service;

/// Read-only view of the services the registry knows about
pub trait ServiceCatalog: Send + Sync {
    /// All services known in `namespace`
    fn list_services(&self, namespace: &str) -> Vec<Service>;

    /// All namespaces holding at least one service
    fn namespaces(&self) -> Vec<String>;
}

/// Catalog kept in memory, namespace → services
#[derive(Default)]
pub struct InMemoryCatalog {
    services: DashMap<String, HashSet<Service>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Returns true if the service was not known yet
    pub fn insert(&self, service: Service) -> bool {
        let added = self.services
            .entry(service.namespace().to_string())
            .or_insert_with(HashSet::new)
            .insert(service.clone());
        if added {
            info!("Catalog learned service {}", service);
        }
        added
    }

    pub fn remove(&self, service: &Service) -> bool {
        let removed = match self.services.get_mut(service.namespace()) {
            Some(mut services) => services.remove(service),
            None => false,
        };
        self.services.remove_if(service.namespace(), |_, services| services.is_empty());
        if removed {
            info!("Catalog dropped service {}", service);
        }
        removed
    }

    pub fn contains(&self, service: &Service) -> bool {
        self.services
            .get(service.namespace())
            .map_or(false, |services| services.contains(service))
    }
}

impl ServiceCatalog for InMemoryCatalog {
    fn list_services(&self, namespace: &str) -> Vec<Service> {
        match self.services.get(namespace) {
            Some(services) => services.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    fn namespaces(&self) -> Vec<String> {
        self.services.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Subscriber for InMemoryCatalog {
    fn name(&self) -> &'static str {
        "InMemoryCatalog"
    }

    fn subscribe_types(&self) -> Vec<EventKind> {
        vec![EventKind::ClientRegisterService]
    }

    fn on_event(&self, event: &NamingEvent) -> Result<()> {
        match event {
            NamingEvent::ClientRegisterService { service, .. } => {
                debug!("Catalog saw register for {}", service);
                self.insert(service.clone());
                Ok(())
            }
            other => Err(NamingError::new(
                ErrorCode::UnexpectedEvent,
                format!("Catalog does not handle {}", other.kind()),
            )),
        }
    }
}
