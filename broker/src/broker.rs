use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dispatch::Dispatcher;
use sqlx::postgres::{PgListener, PgNotification};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use wire::{Database, ServiceContext, Session, split_type_method};

use crate::capability::EventSink;
use crate::command::Command;
use crate::error::BrokerError;
use crate::registry::SubscriptionRegistry;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const DEFAULT_LOOP_PAUSE: Duration = Duration::from_millis(100);

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// The Event Broker (§4.C): owns the dedicated notification connection,
/// the [`SubscriptionRegistry`], and the supervised reconnect loop.
pub struct Broker {
    dsn: String,
    db: Database,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn EventSink>,
    registry: SubscriptionRegistry,
    local_events: HashSet<String>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: AsyncMutex<mpsc::UnboundedReceiver<Command>>,
    loop_pause: Duration,
}

impl Broker {
    #[must_use]
    pub fn new(
        dsn: impl Into<String>,
        db: Database,
        dispatcher: Arc<Dispatcher>,
        sink: Arc<dyn EventSink>,
        local_events: impl IntoIterator<Item = String>,
        loop_pause: Duration,
    ) -> Self {
        let local_events: HashSet<String> = local_events.into_iter().collect();
        let registry = SubscriptionRegistry::seeded_with(local_events.iter().cloned());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            dsn: dsn.into(),
            db,
            dispatcher,
            sink,
            registry,
            local_events,
            commands_tx,
            commands_rx: AsyncMutex::new(commands_rx),
            loop_pause: if loop_pause.is_zero() {
                DEFAULT_LOOP_PAUSE
            } else {
                loop_pause
            },
        }
    }

    /// Increments `channel`'s refcount; on `0→1` enqueues a `LISTEN`.
    pub fn add_event(&self, channel: &str) {
        if self.registry.add(channel) {
            debug!(channel, "broker: first subscriber, enqueuing LISTEN");
            let _ = self.commands_tx.send(Command::Listen(channel.to_owned()));
        }
    }

    /// Decrements `channel`'s refcount; on `1→0` enqueues an `UNLISTEN`.
    pub fn remove_event(&self, channel: &str) {
        if self.registry.remove(channel) {
            debug!(channel, "broker: last subscriber gone, enqueuing UNLISTEN");
            let _ = self.commands_tx.send(Command::Unlisten(channel.to_owned()));
        }
    }

    #[must_use]
    pub fn event_count(&self, channel: &str) -> (usize, bool) {
        self.registry.count(channel)
    }

    #[must_use]
    pub fn total_event_count(&self) -> usize {
        self.registry.total()
    }

    /// Drives the supervised Acquiring → Subscribing → Pumping state
    /// machine until `token` is cancelled. Call once; the `run`/cancel
    /// idiom (rather than bespoke `Serve`/`Shutdown` methods) is what lets
    /// this slot directly into the teacher's `HttpServerProcess` lifecycle
    /// (see DESIGN.md).
    pub async fn run(&self, token: CancellationToken) -> anyhow::Result<()> {
        let mut backoff = INITIAL_BACKOFF;
        let mut commands_rx = self.commands_rx.lock().await;

        loop {
            if token.is_cancelled() {
                return Ok(());
            }

            let mut listener = match PgListener::connect(&self.dsn).await.map_err(BrokerError::Acquire) {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(
                        error = %e,
                        backoff_ms = backoff.as_millis(),
                        "broker: failed to acquire notification connection"
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = next_backoff(backoff);
                    continue;
                }
            };
            backoff = INITIAL_BACKOFF;

            if let Err(e) = self.resubscribe(&mut listener).await {
                warn!(error = %e, "broker: failed to resubscribe after (re)connect");
                continue;
            }
            metrics::counter!("bridge_broker_reconnects_total").increment(1);

            match self.pump(&mut listener, &mut commands_rx, &token).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "broker: notification connection failed, reconnecting");
                }
            }
        }
    }

    async fn resubscribe(&self, listener: &mut PgListener) -> Result<(), BrokerError> {
        for channel in self.registry.snapshot() {
            listener.listen(&channel).await.map_err(BrokerError::Exec)?;
            debug!(channel, "broker: resubscribed after (re)connect");
        }
        Ok(())
    }

    async fn pump(
        &self,
        listener: &mut PgListener,
        commands_rx: &mut mpsc::UnboundedReceiver<Command>,
        token: &CancellationToken,
    ) -> Result<(), BrokerError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                cmd = commands_rx.recv() => {
                    if let Some(cmd) = cmd {
                        self.execute(listener, cmd).await?;
                    }
                }
                notification = listener.recv() => {
                    match notification {
                        Ok(n) => self.handle_notification(n).await,
                        Err(e) => return Err(BrokerError::Exec(e)),
                    }
                }
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                () = tokio::time::sleep(self.loop_pause) => {}
            }
        }
    }

    async fn execute(&self, listener: &mut PgListener, cmd: Command) -> Result<(), BrokerError> {
        match cmd {
            Command::Listen(channel) => listener.listen(&channel).await.map_err(BrokerError::Exec),
            Command::Unlisten(channel) => listener.unlisten(&channel).await.map_err(BrokerError::Exec),
        }
    }

    async fn handle_notification(&self, notification: PgNotification) {
        let channel = notification.channel().to_owned();
        let payload = notification.payload().to_owned();

        debug!(channel, payload, "broker: received notification");

        if self.local_events.contains(&channel) {
            self.dispatch_local(&channel, &payload).await;
            return;
        }

        let value: serde_json::Value = if payload.is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&payload) {
                Ok(v) => v,
                Err(e) => {
                    error!(channel, error = %e, "broker: malformed JSON payload from database");
                    metrics::counter!("bridge_notifications_total", "outcome" => "dropped").increment(1);
                    return;
                }
            }
        };

        metrics::counter!("bridge_notifications_total", "outcome" => "delivered").increment(1);
        self.sink.publish("", &channel, value).await;
    }

    async fn dispatch_local(&self, channel: &str, payload: &str) {
        let Some((type_name, method_name)) = split_type_method(channel) else {
            error!(channel, "broker: local event channel missing a Type.Method dot");
            return;
        };

        let document: serde_json::Value = if payload.is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    error!(channel, error = %e, "broker: malformed local-event payload");
                    return;
                }
            }
        };

        let params = match codec::unmarshal_params(&document) {
            Ok(params) => params,
            Err(e) => {
                error!(channel, error = %e, "broker: malformed local-event params");
                return;
            }
        };

        // The broker is not authenticated on anyone's behalf; it dispatches
        // with its own unscoped context (§4.C).
        let ctx = ServiceContext::new(self.db.clone(), Session::new(String::new(), serde_json::Value::Null), String::new());

        if let Err(e) = self.dispatcher.call(type_name, method_name, &params, ctx).await {
            error!(channel, %type_name, %method_name, error = %e, "broker: local event dispatch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use codec::{ParamType, ParameterDescriptor};
    use dispatch::{Handler, Invoke, MethodDescriptor, MethodOutput, RegisteredType};

    use super::*;

    struct NoopSink;

    #[async_trait::async_trait]
    impl EventSink for NoopSink {
        async fn publish(&self, _publisher_id: &str, _event_id: &str, _payload: serde_json::Value) {}
    }

    fn test_broker() -> Broker {
        let db = Database::new(sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap());
        Broker::new(
            "postgres://localhost/test",
            db,
            Arc::new(Dispatcher::new()),
            Arc::new(NoopSink),
            Vec::<String>::new(),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn reverse_order_unsubscribe_emits_one_listen_and_one_unlisten() {
        let broker = test_broker();
        let mut commands_rx = broker.commands_rx.lock().await;

        broker.add_event("X"); // A subscribes: 0→1
        broker.add_event("X"); // B subscribes: no-op
        broker.add_event("X"); // C subscribes: no-op
        broker.remove_event("X"); // C unsubscribes: no-op
        broker.remove_event("X"); // B unsubscribes: no-op
        broker.remove_event("X"); // A unsubscribes: 1→0

        let mut received = Vec::new();
        while let Ok(cmd) = commands_rx.try_recv() {
            received.push(cmd);
        }

        assert_eq!(
            received,
            vec![Command::Listen("X".to_owned()), Command::Unlisten("X".to_owned())]
        );
    }

    #[test]
    fn backoff_doubles_from_100ms_and_caps_at_60s() {
        let mut backoff = INITIAL_BACKOFF;
        let mut seen = vec![backoff];
        for _ in 0..12 {
            backoff = next_backoff(backoff);
            seen.push(backoff);
        }

        assert_eq!(seen[0], Duration::from_millis(100));
        assert_eq!(seen[1], Duration::from_millis(200));
        assert_eq!(seen[2], Duration::from_millis(400));
        assert_eq!(*seen.last().unwrap(), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn local_events_start_with_refcount_one_and_no_queued_command() {
        let db = Database::new(sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap());
        let broker = Broker::new(
            "postgres://localhost/test",
            db,
            Arc::new(Dispatcher::new()),
            Arc::new(NoopSink),
            vec!["Ping.Run".to_owned()],
            Duration::from_millis(1),
        );

        assert_eq!(broker.event_count("Ping.Run"), (1, true));
        assert_eq!(broker.total_event_count(), 1);

        let mut commands_rx = broker.commands_rx.lock().await;
        assert!(commands_rx.try_recv().is_err());
    }

    #[derive(Default)]
    struct NoopHandler;

    impl Handler for NoopHandler {
        fn set_database(&mut self, _db: Database) {}
        fn set_session(&mut self, _session: Session) {}
        fn set_query_id(&mut self, _query_id: String) {}
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct CountingSink(AtomicUsize);

    #[async_trait::async_trait]
    impl EventSink for CountingSink {
        async fn publish(&self, _publisher_id: &str, _event_id: &str, _payload: serde_json::Value) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// §8 end-to-end scenario 1: a local event channel is dispatched
    /// straight to its registered handler, never through the sink.
    #[tokio::test]
    async fn local_event_dispatch_invokes_handler_with_no_fan_out() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_in_closure = Arc::clone(&seen);
        let run: Invoke = Arc::new(move |_handler, params| {
            let seen = Arc::clone(&seen_in_closure);
            Box::pin(async move {
                let name = String::try_from(params.into_iter().next().expect("name")).unwrap();
                seen.lock().unwrap().push(name);
                Ok(MethodOutput::Empty)
            })
        });

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            "Ping",
            RegisteredType::new(
                || Box::new(NoopHandler),
                vec![MethodDescriptor {
                    name: "Run",
                    params: vec![ParameterDescriptor::new(ParamType::String)],
                    invoke: run,
                }],
            ),
        );

        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let db = Database::new(sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap());
        let broker = Broker::new(
            "postgres://localhost/test",
            db,
            Arc::new(dispatcher),
            Arc::clone(&sink) as Arc<dyn EventSink>,
            vec!["Ping.Run".to_owned()],
            Duration::from_millis(1),
        );

        broker.dispatch_local("Ping.Run", r#"{"n":"alice"}"#).await;

        assert_eq!(*seen.lock().unwrap(), vec!["alice".to_owned()]);
        assert_eq!(sink.0.load(Ordering::SeqCst), 0, "local events must not fan out through the sink");
    }
}
