use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::naming::client::ClientSnapshot;
use crate::naming::types::{ClientId, CompletedPattern, Service};

/// Kinds of events carried by the bus, used as the handler table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Client operations
    ClientRegisterService,
    ClientDeregisterService,
    ClientSubscribeService,
    ClientUnsubscribeService,
    ClientFuzzySubscribe,
    ClientCancelFuzzySubscribe,
    ClientRelease,

    // Service events
    ServiceChanged,
    ServiceSubscribed,
    FuzzySubscribed,

    // Trace
    DeregisterInstanceTrace,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientRegisterService => "CLIENT_REGISTER_SERVICE",
            Self::ClientDeregisterService => "CLIENT_DEREGISTER_SERVICE",
            Self::ClientSubscribeService => "CLIENT_SUBSCRIBE_SERVICE",
            Self::ClientUnsubscribeService => "CLIENT_UNSUBSCRIBE_SERVICE",
            Self::ClientFuzzySubscribe => "CLIENT_FUZZY_SUBSCRIBE",
            Self::ClientCancelFuzzySubscribe => "CLIENT_CANCEL_FUZZY_SUBSCRIBE",
            Self::ClientRelease => "CLIENT_RELEASE",
            Self::ServiceChanged => "SERVICE_CHANGED",
            Self::ServiceSubscribed => "SERVICE_SUBSCRIBED",
            Self::FuzzySubscribed => "FUZZY_SUBSCRIBED",
            Self::DeregisterInstanceTrace => "DEREGISTER_INSTANCE_TRACE",
        }
    }

    /// Client operation kinds, the ones the index consumes
    pub fn client_operations() -> Vec<EventKind> {
        vec![
            Self::ClientRegisterService,
            Self::ClientDeregisterService,
            Self::ClientSubscribeService,
            Self::ClientUnsubscribeService,
            Self::ClientFuzzySubscribe,
            Self::ClientCancelFuzzySubscribe,
            Self::ClientRelease,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an instance disappeared without an explicit deregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeregisterReason {
    /// The client was connected to this node
    NativeDisconnected,
    /// The client was synced from another node
    SyncedDisconnected,
}

impl DeregisterReason {
    pub fn from_native(is_native: bool) -> Self {
        if is_native {
            Self::NativeDisconnected
        } else {
            Self::SyncedDisconnected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeDisconnected => "NATIVE_DISCONNECTED",
            Self::SyncedDisconnected => "SYNCED_DISCONNECTED",
        }
    }
}

/// One deregistered instance, emitted when a client is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterInstanceTrace {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub namespace: String,
    pub group: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub reason: DeregisterReason,
}

/// Everything that travels over the bus
#[derive(Debug, Clone)]
pub enum NamingEvent {
    ClientRegisterService { service: Service, client_id: ClientId },
    ClientDeregisterService { service: Service, client_id: ClientId },
    ClientSubscribeService { service: Service, client_id: ClientId },
    ClientUnsubscribeService { service: Service, client_id: ClientId },
    ClientFuzzySubscribe { pattern: CompletedPattern, client_id: ClientId },
    ClientCancelFuzzySubscribe { pattern: CompletedPattern, client_id: ClientId },
    ClientRelease { client: Arc<ClientSnapshot>, is_native: bool },

    ServiceChanged { service: Service, instances_changed: bool },
    ServiceSubscribed { service: Service, client_id: ClientId },
    FuzzySubscribed { client_id: ClientId, pattern: CompletedPattern, matched_services: Vec<Service> },

    DeregisterInstanceTrace(DeregisterInstanceTrace),
}

impl NamingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ClientRegisterService { .. } => EventKind::ClientRegisterService,
            Self::ClientDeregisterService { .. } => EventKind::ClientDeregisterService,
            Self::ClientSubscribeService { .. } => EventKind::ClientSubscribeService,
            Self::ClientUnsubscribeService { .. } => EventKind::ClientUnsubscribeService,
            Self::ClientFuzzySubscribe { .. } => EventKind::ClientFuzzySubscribe,
            Self::ClientCancelFuzzySubscribe { .. } => EventKind::ClientCancelFuzzySubscribe,
            Self::ClientRelease { .. } => EventKind::ClientRelease,
            Self::ServiceChanged { .. } => EventKind::ServiceChanged,
            Self::ServiceSubscribed { .. } => EventKind::ServiceSubscribed,
            Self::FuzzySubscribed { .. } => EventKind::FuzzySubscribed,
            Self::DeregisterInstanceTrace(_) => EventKind::DeregisterInstanceTrace,
        }
    }

    /// Key the bus shards on. Every event a client causes shares its key, so a
    /// client's operations are handled in the order they were published.
    pub fn routing_key(&self) -> String {
        match self {
            Self::ClientRegisterService { client_id, .. }
            | Self::ClientDeregisterService { client_id, .. }
            | Self::ClientSubscribeService { client_id, .. }
            | Self::ClientUnsubscribeService { client_id, .. }
            | Self::ClientFuzzySubscribe { client_id, .. }
            | Self::ClientCancelFuzzySubscribe { client_id, .. }
            | Self::FuzzySubscribed { client_id, .. } => client_id.clone(),
            Self::ClientRelease { client, .. } => client.client_id().to_string(),
            Self::ServiceChanged { service, .. } | Self::ServiceSubscribed { service, .. } => service.to_string(),
            Self::DeregisterInstanceTrace(trace) => format!("{}##{}@@{}", trace.namespace, trace.group, trace.name),
        }
    }
}

/// Current wall clock in milliseconds, 0 if the clock is before the epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_route_by_client_id() {
        let service = Service::new("N", "G", "svc.a");
        let register = NamingEvent::ClientRegisterService { service: service.clone(), client_id: "c1".into() };
        let subscribe = NamingEvent::ClientSubscribeService { service, client_id: "c1".into() };
        let release = NamingEvent::ClientRelease { client: Arc::new(ClientSnapshot::new("c1")), is_native: true };

        assert_eq!(register.routing_key(), "c1");
        assert_eq!(subscribe.routing_key(), "c1");
        assert_eq!(release.routing_key(), "c1");
        assert_eq!(release.kind(), EventKind::ClientRelease);
    }

    #[test]
    fn deregister_reason_follows_native_flag() {
        assert_eq!(DeregisterReason::from_native(true).as_str(), "NATIVE_DISCONNECTED");
        assert_eq!(DeregisterReason::from_native(false).as_str(), "SYNCED_DISCONNECTED");
        assert_eq!(
            serde_json::to_string(&DeregisterReason::NativeDisconnected).unwrap(),
            "\"NATIVE_DISCONNECTED\""
        );
    }
}
