mod broker;
mod capability;
mod command;
mod error;
mod registry;

pub use broker::Broker;
pub use capability::EventSink;
pub use command::Command;
pub use error::BrokerError;
pub use registry::SubscriptionRegistry;
