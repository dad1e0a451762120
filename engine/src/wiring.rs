use std::sync::{Arc, LazyLock, OnceLock};
use std::time::Duration;

use broker::Broker;
use dispatch::Dispatcher;
use hub::{Hub, HubServerProcess, PermissionPredicate, SessionResolver};
use tools::http::http_server::HttpServerProcess;
use wire::Database;

use crate::capability::{BrokerEventPubSub, DeferredEventSink};
use crate::events;
use crate::process::{BrokerProcess, CleanupProcess};

/// Settings the wiring layer needs that don't belong to any single
/// component (§4.F).
pub struct WiringConfig {
    pub notification_dsn: String,
    pub hub_addr: String,
    pub hub_path: String,
    pub local_events: Vec<String>,
    pub broker_loop_pause: Duration,
    pub max_method_call_duration: Duration,
    pub cleanup_interval: Duration,
    pub is_production: bool,
}

/// Everything §4.F assembles: the dispatcher (with the built-in `Event`
/// type registered), the broker, the hub, and the supervised processes
/// that drive them. Handed back so a host can register its own handler
/// types on `dispatcher` before anything starts accepting traffic.
pub struct Wiring {
    pub dispatcher: Arc<Dispatcher>,
    pub broker: Arc<Broker>,
    pub hub: Arc<Hub>,
    pub processes: Vec<Arc<dyn HttpServerProcess>>,
}

/// Assembles the Dynamic RPC Dispatcher, Event Broker and Connection Hub,
/// breaking the broker↔hub cycle with the two narrow capabilities from
/// spec §9 (`EventSink` held by the broker, `EventPubSub` held by the
/// hub), grounded on the teacher's `engine::service::builder` pattern.
///
/// `register_handlers` is the host's chance to add its own
/// [`dispatch::RegisteredType`]s before the dispatcher is frozen (§5:
/// "`RegisteredType` map is written only during init and read-only
/// thereafter") — after `build` returns there is no supported way to
/// register another type.
pub fn build(
    config: WiringConfig,
    db: Database,
    session_resolver: Arc<dyn SessionResolver>,
    permission: Option<PermissionPredicate>,
    register_handlers: impl FnOnce(&mut Dispatcher),
) -> Wiring {
    LazyLock::force(&crate::metrics::METRICS);

    let hub_cell: Arc<OnceLock<Arc<Hub>>> = Arc::new(OnceLock::new());

    let mut dispatcher = Dispatcher::new();
    events::register(&mut dispatcher, Arc::clone(&hub_cell));
    register_handlers(&mut dispatcher);
    let dispatcher = Arc::new(dispatcher);

    let sink = Arc::new(DeferredEventSink(Arc::clone(&hub_cell)));
    let broker = Arc::new(Broker::new(
        config.notification_dsn,
        db.clone(),
        Arc::clone(&dispatcher),
        sink,
        config.local_events,
        config.broker_loop_pause,
    ));

    let event_pub_sub = Arc::new(BrokerEventPubSub(Arc::clone(&broker)));
    let hub = Arc::new(Hub::new(
        Arc::clone(&dispatcher),
        db,
        event_pub_sub,
        session_resolver,
        permission,
        config.max_method_call_duration,
        config.is_production,
    ));
    hub_cell.set(Arc::clone(&hub)).ok();

    let processes: Vec<Arc<dyn HttpServerProcess>> = vec![
        Arc::new(BrokerProcess(Arc::clone(&broker))),
        Arc::new(CleanupProcess::new(Arc::clone(&hub), config.cleanup_interval)),
        Arc::new(HubServerProcess::new(config.hub_addr, config.hub_path, Arc::clone(&hub))),
    ];

    Wiring {
        dispatcher,
        broker,
        hub,
        processes,
    }
}
