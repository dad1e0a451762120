use async_trait::async_trait;

/// Narrow capability the broker holds to deliver non-local notifications
/// onward, without depending on the Connection Hub's concrete type (§9:
/// "Break the cycle with two narrow capabilities").
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, publisher_id: &str, event_id: &str, payload: serde_json::Value);
}
