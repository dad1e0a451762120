use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use wire::ServerFrame;

use crate::capability::EventPubSub;
use crate::error::HubError;

/// A single live socket (§3: "Client"). One session identifier may own
/// several concurrent `Client`s (multiple browser tabs); each keeps its
/// own subscription set, matching `original_source/ws/client.go`.
///
/// `sink` is a `tokio::sync::Mutex`, not `parking_lot`, because every
/// holder spans an `.await` (the write itself) — the per-client write
/// lock from §4.D/§5 ("no two tasks inside `WriteMessage` for the same
/// socket at the same time").
pub struct Client {
    id: String,
    sink: AsyncMutex<SplitSink<WebSocket, Message>>,
    events: SyncMutex<HashSet<String>>,
    event_pub_sub: Arc<dyn EventPubSub>,
    last_activity_ms: AtomicU64,
}

impl Client {
    #[must_use]
    pub fn new(id: impl Into<String>, sink: SplitSink<WebSocket, Message>, event_pub_sub: Arc<dyn EventPubSub>) -> Self {
        Self {
            id: id.into(),
            sink: AsyncMutex::new(sink),
            events: SyncMutex::new(HashSet::new()),
            event_pub_sub,
            last_activity_ms: AtomicU64::new(tools::misc::current_timestamp().as_millis() as u64),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stamps last-activity to now (§4.E step 2, run after every frame read).
    pub fn touch(&self) {
        let now_ms = tools::misc::current_timestamp().as_millis() as u64;
        self.last_activity_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Milliseconds since the UNIX epoch this client last read a frame.
    #[must_use]
    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms.load(Ordering::Relaxed)
    }

    /// Registers `channel` on this client; ripples into the broker's
    /// refcount only on the first registration (§4.D "Subscribe/Unsubscribe").
    pub fn add_event(&self, channel: &str) {
        let mut events = self.events.lock();
        if events.insert(channel.to_owned()) {
            self.event_pub_sub.add_event(channel);
            metrics::counter!("bridge_subscriptions_total", "direction" => "subscribe").increment(1);
        }
    }

    /// Unregisters `channel`; ripples into the broker's refcount only if
    /// it was actually held.
    pub fn remove_event(&self, channel: &str) {
        let mut events = self.events.lock();
        if events.remove(channel) {
            self.event_pub_sub.remove_event(channel);
            metrics::counter!("bridge_subscriptions_total", "direction" => "unsubscribe").increment(1);
        }
    }

    /// Decrements every subscription this client held, called on
    /// connection teardown.
    pub fn remove_all_events(&self) {
        let mut events = self.events.lock();
        for channel in events.drain() {
            self.event_pub_sub.remove_event(&channel);
        }
    }

    #[must_use]
    pub fn has_event(&self, channel: &str) -> bool {
        self.events.lock().contains(channel)
    }

    /// Writes one frame. All writes to this socket are serialized through
    /// `sink`'s lock — the central invariant from §4.D ("no two tasks may
    /// be inside a write on the same socket at the same time").
    pub async fn send_frame(&self, frame: &ServerFrame) -> Result<(), HubError> {
        let text = serde_json::to_string(frame).map_err(|e| HubError::MalformedFrame(e.to_string()))?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_close(&self, code: u16, reason: &'static str) {
        let mut sink = self.sink.lock().await;
        let _ = sink
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
    }

    pub async fn send_ping(&self) -> Result<(), HubError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Ping(Vec::new().into())).await?;
        Ok(())
    }
}
