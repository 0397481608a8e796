use log::info;

use crate::error::Result;
use crate::naming::bus::Subscriber;
use crate::naming::events::{EventKind, NamingEvent};

/// Logs what the index tells the rest of the registry
pub struct TraceLogger;

impl Subscriber for TraceLogger {
    fn name(&self) -> &'static str {
        "TraceLogger"
    }

    fn subscribe_types(&self) -> Vec<EventKind> {
        vec![
            EventKind::ServiceChanged,
            EventKind::ServiceSubscribed,
            EventKind::FuzzySubscribed,
            EventKind::DeregisterInstanceTrace,
        ]
    }

    fn on_event(&self, event: &NamingEvent) -> Result<()> {
        match event {
            NamingEvent::ServiceChanged { service, instances_changed } => {
                info!("Service changed: {} (instances changed: {})", service, instances_changed)
            }
            NamingEvent::ServiceSubscribed { service, client_id } => {
                info!("Client {} subscribed {}", client_id, service)
            }
            NamingEvent::FuzzySubscribed { client_id, pattern, matched_services } => {
                info!("Client {} fuzzy-subscribed {} ({} matches)", client_id, pattern, matched_services.len())
            }
            NamingEvent::DeregisterInstanceTrace(trace) => {
                info!("Deregister trace: {}", serde_json::to_string(trace)?)
            }
            other => info!("{}", other.kind()),
        }
        Ok(())
    }
}
