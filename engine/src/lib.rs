//! Wiring/Engine (spec §9's "Cyclic references between broker and hub",
//! expanded into §4.F by `SPEC_FULL.md`): assembles the Dynamic RPC
//! Dispatcher, Event Broker and Connection Hub into one running system,
//! registers the built-in `Event.Subscribe`/`Event.Unsubscribe` handler
//! type, and exposes the supervised processes a host runs under
//! `tools::http::http_server::HttpServer`.

mod capability;
mod events;
mod metrics;
mod process;
mod validation;
mod wiring;

pub use capability::{BrokerEventPubSub, DeferredEventSink};
pub use events::EventHandler;
pub use metrics::{METRICS, Metrics};
pub use process::{BrokerProcess, CleanupProcess};
pub use validation::Validatable;
pub use wiring::{Wiring, WiringConfig, build};
