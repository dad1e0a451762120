/// Narrow capability the hub holds to ripple client subscribe/unsubscribe
/// into the Event Broker's refcounts, without depending on the broker's
/// concrete type (§9: "Break the cycle with two narrow capabilities").
pub trait EventPubSub: Send + Sync {
    fn add_event(&self, channel: &str);
    fn remove_event(&self, channel: &str);
}
