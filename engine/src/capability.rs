use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use broker::EventSink;
use hub::{EventPubSub, Hub};

/// Bridges the broker's [`EventSink`] capability to the hub's
/// `publish_event`, without either crate depending on the other's concrete
/// type (§9: "Break the cycle with two narrow capabilities"). The hub
/// itself can only be constructed *after* the broker (it needs the
/// broker's [`EventPubSub`] side first), so this indirects through a cell
/// filled in once [`crate::wiring::build`] has both halves.
pub struct DeferredEventSink(pub Arc<OnceLock<Arc<Hub>>>);

#[async_trait]
impl EventSink for DeferredEventSink {
    async fn publish(&self, publisher_id: &str, event_id: &str, payload: serde_json::Value) {
        if let Some(hub) = self.0.get() {
            hub.publish_event(publisher_id, event_id, payload).await;
        }
    }
}

/// Bridges the hub's [`EventPubSub`] capability to the broker's
/// refcounted subscribe/unsubscribe.
pub struct BrokerEventPubSub(pub Arc<broker::Broker>);

impl EventPubSub for BrokerEventPubSub {
    fn add_event(&self, channel: &str) {
        self.0.add_event(channel);
    }

    fn remove_event(&self, channel: &str) {
        self.0.remove_event(channel);
    }
}
