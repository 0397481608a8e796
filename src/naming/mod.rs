pub mod bus;
pub mod catalog;
pub mod client;
pub mod config;
pub mod events;
pub mod handler;
pub mod index;
pub mod pattern;
pub mod trace;
pub mod types;

use std::sync::Arc;

use log::info;

use bus::{EventBus, EventSink};
use catalog::InMemoryCatalog;
use config::NamingConfig;
use handler::FuzzySubscribeRequestHandler;
use index::ServiceIndexManager;
use trace::TraceLogger;

/// A running index node and its collaborators
pub struct NamingNode {
    pub bus: Arc<EventBus>,
    pub catalog: Arc<InMemoryCatalog>,
    pub index: Arc<ServiceIndexManager>,
    pub fuzzy_handler: FuzzySubscribeRequestHandler,
}

impl NamingNode {
    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}

/// Starts the bus and wires catalog, index and request handler onto it.
/// Needs a tokio runtime.
pub fn init(config: &NamingConfig) -> NamingNode {
    let bus = EventBus::start(&config.bus);
    let sink: Arc<dyn EventSink> = bus.clone();

    // the catalog goes first so a register is in the catalog before the index reacts
    let catalog = Arc::new(InMemoryCatalog::new());
    bus.register(catalog.clone());

    let index = Arc::new(ServiceIndexManager::new(catalog.clone(), sink.clone()));
    bus.register(index.clone());
    bus.register(Arc::new(TraceLogger));

    let fuzzy_handler = FuzzySubscribeRequestHandler::new(
        sink,
        config.default_namespace.clone(),
        config.default_group.clone(),
    );

    info!("Naming index {} ready", config.id);
    NamingNode {
        bus,
        catalog,
        index,
        fuzzy_handler,
    }
}
