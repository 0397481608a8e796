use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};

use crate::error::{ErrorCode, NamingError, Result};
use crate::naming::bus::{EventSink, Subscriber};
use crate::naming::catalog::ServiceCatalog;
use crate::naming::client::ClientSnapshot;
use crate::naming::events::{now_millis, DeregisterInstanceTrace, DeregisterReason, EventKind, NamingEvent};
use crate::naming::pattern::{self, FuzzyPattern};
use crate::naming::types::{ClientId, CompletedPattern, PatternClients, Service, ServiceClients, ServicePatterns};

/// Adds `member` under `key`, creating the set if needed.
/// Returns (entry was created, member was new).
fn insert_member<K: Eq + Hash + Clone>(map: &DashMap<K, HashSet<String>>, key: &K, member: &str) -> (bool, bool) {
    let mut created = false;
    let added = map
        .entry(key.clone())
        .or_insert_with(|| {
            created = true;
            HashSet::new()
        })
        .insert(member.to_string());
    (created, added)
}

/// Removes `member` under `key` and drops the set if it is empty by then.
/// The drop re-checks emptiness under the shard lock, so a concurrent insert
/// that refilled the set keeps it alive.
fn remove_member<K: Eq + Hash>(map: &DashMap<K, HashSet<String>>, key: &K, member: &str) -> bool {
    let removed = match map.get_mut(key) {
        Some(mut members) => members.remove(member),
        None => return false,
    };
    map.remove_if(key, |_, members| members.is_empty());
    removed
}

fn members_of<K: Eq + Hash>(map: &DashMap<K, HashSet<String>>, key: &K) -> HashSet<String> {
    map.get(key).map(|members| members.value().clone()).unwrap_or_default()
}

/// Client ↔ service indexes.
///
/// Four independent concurrent maps: publishers and exact subscribers per
/// service, fuzzy subscribers per completed pattern, and the derived reverse
/// index from service to the patterns matching it. A set is never stored
/// empty; a missing key reads as an empty set.
///
/// The reverse index is only refreshed when a service gets its first publisher
/// or a client newly subscribes a pattern. In between it may hold patterns
/// nobody subscribes any more.
pub struct ServiceIndexManager {
    publishers: ServiceClients,
    subscribers: ServiceClients,
    fuzzy_subscribers: PatternClients,
    fuzzy_matches: ServicePatterns,
    catalog: Arc<dyn ServiceCatalog>,
    sink: Arc<dyn EventSink>,
}

impl ServiceIndexManager {
    pub fn new(catalog: Arc<dyn ServiceCatalog>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            publishers: DashMap::new(),
            subscribers: DashMap::new(),
            fuzzy_subscribers: DashMap::new(),
            fuzzy_matches: DashMap::new(),
            catalog,
            sink,
        }
    }

    pub fn clients_registered(&self, service: &Service) -> HashSet<ClientId> {
        members_of(&self.publishers, service)
    }

    pub fn clients_subscribed(&self, service: &Service) -> HashSet<ClientId> {
        members_of(&self.subscribers, service)
    }

    /// Services with at least one exact subscriber
    pub fn subscribed_services(&self) -> Vec<Service> {
        self.subscribers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn fuzzy_match_patterns(&self, service: &Service) -> HashSet<CompletedPattern> {
        members_of(&self.fuzzy_matches, service)
    }

    pub fn all_fuzzy_patterns(&self) -> Vec<CompletedPattern> {
        self.fuzzy_subscribers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn clients_fuzzy_subscribed(&self, pattern: &str) -> HashSet<ClientId> {
        members_of(&self.fuzzy_subscribers, &pattern.to_string())
    }

    /// A client published an instance of `service`
    pub fn register(&self, service: &Service, client_id: &str) {
        if self.add_publisher(service, client_id) {
            self.update_fuzzy_index_for_service(service);
        }
        self.emit(NamingEvent::ServiceChanged {
            service: service.clone(),
            instances_changed: true,
        });
    }

    /// Publisher-index half of [`register`](Self::register). Returns true when
    /// this call created the entry, i.e. the service had no publisher before.
    pub fn add_publisher(&self, service: &Service, client_id: &str) -> bool {
        let (created, added) = insert_member(&self.publishers, service, client_id);
        if created {
            info!("Service {} got its first publisher {}", service, client_id);
        } else if added {
            debug!("Client {} now publishes {}", client_id, service);
        }
        created
    }

    pub fn deregister(&self, service: &Service, client_id: &str) {
        if remove_member(&self.publishers, service, client_id) {
            debug!("Client {} no longer publishes {}", client_id, service);
        }
        self.emit(NamingEvent::ServiceChanged {
            service: service.clone(),
            instances_changed: true,
        });
    }

    pub fn subscribe(&self, service: &Service, client_id: &str) {
        let (_, added) = insert_member(&self.subscribers, service, client_id);
        if added {
            debug!("Client {} subscribed {}", client_id, service);
            self.emit(NamingEvent::ServiceSubscribed {
                service: service.clone(),
                client_id: client_id.to_string(),
            });
        }
    }

    /// Silent on purpose: nothing downstream reacts to a lost subscriber
    pub fn unsubscribe(&self, service: &Service, client_id: &str) {
        if remove_member(&self.subscribers, service, client_id) {
            debug!("Client {} unsubscribed {}", client_id, service);
        }
    }

    /// Indexes the fuzzy subscription; a client new to the pattern gets a
    /// `FuzzySubscribed` event carrying every service matching it right now.
    pub fn fuzzy_subscribe(&self, completed: &str, client_id: &str) -> Result<()> {
        let parsed = FuzzyPattern::parse(completed)?;
        let key = parsed.completed();

        let (_, added) = insert_member(&self.fuzzy_subscribers, &key, client_id);
        if !added {
            debug!("Client {} already fuzzy-subscribes {}", client_id, key);
            return Ok(());
        }

        let matched_services = self.update_fuzzy_index_for_pattern(&parsed);
        info!("Client {} fuzzy-subscribed {} matching {} services", client_id, key, matched_services.len());
        self.emit(NamingEvent::FuzzySubscribed {
            client_id: client_id.to_string(),
            pattern: key,
            matched_services,
        });
        Ok(())
    }

    /// Leaves the reverse index alone; stale patterns are pruned by
    /// [`sweep_empty_service`](Self::sweep_empty_service) or
    /// [`remove_fuzzy_match`](Self::remove_fuzzy_match).
    pub fn cancel_fuzzy_subscribe(&self, completed: &str, client_id: &str) {
        if remove_member(&self.fuzzy_subscribers, &completed.to_string(), client_id) {
            debug!("Client {} cancelled fuzzy subscription {}", client_id, completed);
        }
    }

    /// Drops the publisher entry and the match entry of `service` if the
    /// publisher set is present and empty. Returns whether anything was removed.
    pub fn sweep_empty_service(&self, service: &Service) -> bool {
        if self.publishers.remove_if(service, |_, ids| ids.is_empty()).is_some() {
            self.fuzzy_matches.remove(service);
            info!("Swept empty service {}", service);
            true
        } else {
            false
        }
    }

    pub fn remove_fuzzy_match(&self, service: &Service, completed: &str) -> bool {
        remove_member(&self.fuzzy_matches, service, completed)
    }

    /// Removes everything a released client left behind and traces each of its
    /// published instances.
    pub fn on_client_release(&self, client: &ClientSnapshot, is_native: bool) {
        let client_id = client.client_id();
        info!("Releasing client {} (native: {})", client_id, is_native);

        for service in client.subscribed_services() {
            self.unsubscribe(service, client_id);
        }
        for completed in client.fuzzy_patterns() {
            self.cancel_fuzzy_subscribe(completed, client_id);
        }

        let reason = DeregisterReason::from_native(is_native);
        let timestamp = now_millis();
        for (service, instance) in client.published_services() {
            self.deregister(service, client_id);
            self.emit(NamingEvent::DeregisterInstanceTrace(DeregisterInstanceTrace {
                timestamp,
                namespace: service.namespace().to_string(),
                group: service.group().to_string(),
                name: service.name().to_string(),
                ip: instance.ip.clone(),
                port: instance.port,
                reason,
            }));
        }
    }

    /// Unions every known pattern applying to `service` into its match entry
    pub fn update_fuzzy_index_for_service(&self, service: &Service) -> HashSet<CompletedPattern> {
        let candidates = pattern::filter_by_namespace(service.namespace(), self.all_fuzzy_patterns());
        let matched = pattern::matched_patterns(service.name(), service.group(), candidates);
        if !matched.is_empty() {
            debug!("Service {} matches {} fuzzy patterns", service, matched.len());
            self.fuzzy_matches
                .entry(service.clone())
                .or_insert_with(HashSet::new)
                .extend(matched.iter().cloned());
        }
        matched
    }

    /// Unions `pattern` into the match entry of every catalog service it
    /// matches and returns those services, sorted.
    pub fn update_fuzzy_index_for_pattern(&self, pattern: &FuzzyPattern) -> Vec<Service> {
        let completed = pattern.completed();
        let candidates: Vec<Service> = if pattern.is_namespace_universal() {
            self.catalog
                .namespaces()
                .iter()
                .flat_map(|namespace| self.catalog.list_services(namespace))
                .collect()
        } else {
            self.catalog.list_services(pattern.namespace())
        };

        let mut matched = Vec::new();
        for service in candidates {
            if pattern.matches(&service) {
                insert_member(&self.fuzzy_matches, &service, &completed);
                matched.push(service);
            }
        }
        matched.sort();
        matched
    }

    /// Applies one client operation event
    pub fn handle(&self, event: &NamingEvent) -> Result<()> {
        match event {
            NamingEvent::ClientRegisterService { service, client_id } => self.register(service, client_id),
            NamingEvent::ClientDeregisterService { service, client_id } => self.deregister(service, client_id),
            NamingEvent::ClientSubscribeService { service, client_id } => self.subscribe(service, client_id),
            NamingEvent::ClientUnsubscribeService { service, client_id } => self.unsubscribe(service, client_id),
            NamingEvent::ClientFuzzySubscribe { pattern, client_id } => self.fuzzy_subscribe(pattern, client_id)?,
            NamingEvent::ClientCancelFuzzySubscribe { pattern, client_id } => {
                self.cancel_fuzzy_subscribe(pattern, client_id)
            }
            NamingEvent::ClientRelease { client, is_native } => self.on_client_release(client, *is_native),
            other => {
                return Err(NamingError::new(
                    ErrorCode::UnexpectedEvent,
                    format!("Index does not handle {}", other.kind()),
                ))
            }
        }
        Ok(())
    }

    fn emit(&self, event: NamingEvent) {
        let kind = event.kind();
        if let Err(e) = self.sink.publish(event) {
            warn!("Failed to publish {}: {}", kind, e);
        }
    }
}

impl Subscriber for ServiceIndexManager {
    fn name(&self) -> &'static str {
        "ServiceIndexManager"
    }

    fn subscribe_types(&self) -> Vec<EventKind> {
        EventKind::client_operations()
    }

    fn on_event(&self, event: &NamingEvent) -> Result<()> {
        self.handle(event)
    }
}
