use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, NamingError, Result};
use crate::naming::config::BusConfig;
use crate::naming::events::{EventKind, NamingEvent};

/// Something that reacts to events of the kinds it declares
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &'static str;

    fn subscribe_types(&self) -> Vec<EventKind>;

    /// Must not block; runs on a bus worker
    fn on_event(&self, event: &NamingEvent) -> Result<()>;
}

/// Fire-and-forget outlet for events
pub trait EventSink: Send + Sync {
    fn publish(&self, event: NamingEvent) -> Result<()>;
}

type HandlerTable = DashMap<EventKind, Vec<Arc<dyn Subscriber>>>;

/// In-process message bus.
///
/// Events are sharded over a fixed pool of workers by their routing key, so
/// events sharing a key are handled in publish order while different keys
/// proceed in parallel. Each worker owns a bounded queue; publishing never
/// waits for room in it.
pub struct EventBus {
    handlers: Arc<HandlerTable>,
    workers: Vec<Sender<NamingEvent>>,
    cancel_token: CancellationToken,
}

impl EventBus {
    /// Spawns the workers on the current tokio runtime
    pub fn start(config: &BusConfig) -> Arc<Self> {
        let handlers: Arc<HandlerTable> = Arc::new(DashMap::new());
        let cancel_token = CancellationToken::new();
        let worker_count = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = mpsc::channel::<NamingEvent>(capacity);
            workers.push(tx);
            tokio::spawn(Self::run_worker(index, rx, handlers.clone(), cancel_token.clone()));
        }
        info!("Event bus started with {} workers (queue capacity {})", worker_count, capacity);

        Arc::new(Self {
            handlers,
            workers,
            cancel_token,
        })
    }

    /// Installs the subscriber for every kind it declares
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) {
        for kind in subscriber.subscribe_types() {
            debug!("Registering {} for {}", subscriber.name(), kind);
            self.handlers.entry(kind).or_insert_with(Vec::new).push(subscriber.clone());
        }
        info!("Subscriber {} registered", subscriber.name());
    }

    pub fn deregister(&self, name: &str) {
        for mut entry in self.handlers.iter_mut() {
            entry.value_mut().retain(|subscriber| subscriber.name() != name);
        }
        self.handlers.retain(|_, subscribers| !subscribers.is_empty());
        info!("Subscriber {} deregistered", name);
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, |subscribers| subscribers.len())
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Stops all workers; queued events are dropped
    pub fn shutdown(&self) {
        info!("Shutting down event bus");
        self.cancel_token.cancel();
    }

    fn worker_for(&self, key: &str) -> &Sender<NamingEvent> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.workers.len() as u64) as usize;
        &self.workers[index]
    }

    async fn run_worker(
        index: usize,
        mut rx: Receiver<NamingEvent>,
        handlers: Arc<HandlerTable>,
        cancel_token: CancellationToken,
    ) {
        debug!("Bus worker {} started", index);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => {
                        dispatch(&handlers, &event);
                    }
                    None => break,
                },
            }
        }
        debug!("Bus worker {} stopped", index);
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: NamingEvent) -> Result<()> {
        if self.is_shutdown() {
            return Err(NamingError::new(
                ErrorCode::EventBusClosed,
                format!("Dropping {} after shutdown", event.kind()),
            ));
        }

        let kind = event.kind();
        let key = event.routing_key();
        match self.worker_for(&key).try_send(event) {
            Ok(()) => {
                debug!("Published {} (key {})", kind, key);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!("Bus queue full, dropping {} (key {})", kind, key);
                Err(NamingError::new(ErrorCode::EventBusFull, format!("Queue full for {}", kind)))
            }
            Err(TrySendError::Closed(_)) => {
                Err(NamingError::new(ErrorCode::EventBusClosed, format!("Worker gone for {}", kind)))
            }
        }
    }
}

/// Hands the event to every subscriber of its kind; returns how many accepted it.
/// A failing or panicking subscriber does not keep the others from running.
fn dispatch(handlers: &HandlerTable, event: &NamingEvent) -> usize {
    let kind = event.kind();
    // clone the list so no shard lock is held while handlers run
    let subscribers = match handlers.get(&kind) {
        Some(subscribers) => subscribers.value().clone(),
        None => {
            debug!("No subscriber for {}", kind);
            return 0;
        }
    };

    let mut handled = 0;
    for subscriber in subscribers.iter() {
        match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
            Ok(Ok(())) => handled += 1,
            Ok(Err(e)) => warn!("{} failed to handle {}: {}", subscriber.name(), kind, e),
            Err(_) => error!("{} panicked while handling {}", subscriber.name(), kind),
        }
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::types::Service;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
    use tokio::time::{timeout, Duration};

    struct Recorder {
        kinds: Vec<EventKind>,
        tx: UnboundedSender<NamingEvent>,
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &'static str {
            "Recorder"
        }

        fn subscribe_types(&self) -> Vec<EventKind> {
            self.kinds.clone()
        }

        fn on_event(&self, event: &NamingEvent) -> Result<()> {
            let _ = self.tx.send(event.clone());
            Ok(())
        }
    }

    struct Failing {
        panic: bool,
    }

    impl Subscriber for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn subscribe_types(&self) -> Vec<EventKind> {
            vec![EventKind::ServiceChanged]
        }

        fn on_event(&self, _event: &NamingEvent) -> Result<()> {
            if self.panic {
                panic!("boom");
            }
            Err(NamingError::new(ErrorCode::HandlerFailed, "nope"))
        }
    }

    fn recorder(kinds: Vec<EventKind>) -> (Arc<Recorder>, UnboundedReceiver<NamingEvent>) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(Recorder { kinds, tx }), rx)
    }

    fn changed(name: &str) -> NamingEvent {
        NamingEvent::ServiceChanged {
            service: Service::new("N", "G", name),
            instances_changed: true,
        }
    }

    async fn next(rx: &mut UnboundedReceiver<NamingEvent>) -> NamingEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("recv")
    }

    #[tokio::test]
    async fn delivers_only_subscribed_kinds() {
        let bus = EventBus::start(&BusConfig::default());
        let (rec, mut rx) = recorder(vec![EventKind::ServiceChanged]);
        bus.register(rec);

        bus.publish(NamingEvent::ServiceSubscribed {
            service: Service::new("N", "G", "x"),
            client_id: "c".into(),
        })
        .unwrap();
        bus.publish(changed("a")).unwrap();

        assert!(matches!(next(&mut rx).await, NamingEvent::ServiceChanged { ref service, .. } if service.name() == "a"));
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn failing_handlers_do_not_starve_others() {
        let bus = EventBus::start(&BusConfig { workers: 1, queue_capacity: 8 });
        bus.register(Arc::new(Failing { panic: false }));
        bus.register(Arc::new(Failing { panic: true }));
        let (rec, mut rx) = recorder(vec![EventKind::ServiceChanged]);
        bus.register(rec);

        bus.publish(changed("a")).unwrap();
        bus.publish(changed("b")).unwrap();

        assert!(matches!(next(&mut rx).await, NamingEvent::ServiceChanged { ref service, .. } if service.name() == "a"));
        assert!(matches!(next(&mut rx).await, NamingEvent::ServiceChanged { ref service, .. } if service.name() == "b"));
    }

    #[tokio::test]
    async fn same_key_keeps_publish_order() {
        let bus = EventBus::start(&BusConfig { workers: 4, queue_capacity: 256 });
        let (rec, mut rx) = recorder(vec![EventKind::ClientRegisterService]);
        bus.register(rec);

        for i in 0..100 {
            bus.publish(NamingEvent::ClientRegisterService {
                service: Service::new("N", "G", format!("svc.{}", i)),
                client_id: "same-client".into(),
            })
            .unwrap();
        }

        for i in 0..100 {
            match next(&mut rx).await {
                NamingEvent::ClientRegisterService { service, .. } => assert_eq!(service.name(), format!("svc.{}", i)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn full_queue_is_reported_without_blocking() {
        // current-thread runtime: the worker cannot drain before we yield
        let bus = EventBus::start(&BusConfig { workers: 1, queue_capacity: 1 });
        bus.publish(changed("a")).unwrap();
        let err = bus.publish(changed("b")).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EventBusFull));
    }

    #[tokio::test]
    async fn publish_after_shutdown_is_rejected() {
        let bus = EventBus::start(&BusConfig::default());
        bus.shutdown();
        assert!(bus.is_shutdown());
        let err = bus.publish(changed("a")).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::EventBusClosed));
    }

    #[tokio::test]
    async fn deregister_removes_handlers() {
        let bus = EventBus::start(&BusConfig::default());
        let (rec, _rx) = recorder(vec![EventKind::ServiceChanged, EventKind::FuzzySubscribed]);
        bus.register(rec);
        assert_eq!(bus.subscriber_count(EventKind::FuzzySubscribed), 1);

        bus.deregister("Recorder");
        assert_eq!(bus.subscriber_count(EventKind::ServiceChanged), 0);
        assert_eq!(bus.subscriber_count(EventKind::FuzzySubscribed), 0);
    }
}
