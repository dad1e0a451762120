use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use dispatch::Dispatcher;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use wire::{Database, ServerError, ServerFrame, Session, split_type_method};

use crate::capability::EventPubSub;
use crate::client::Client;
use crate::directory::ClientDirectory;
use crate::error::HubError;
use crate::session::SessionResolver;

const DEFAULT_MAX_METHOD_CALL_DURATION: Duration = Duration::from_secs(60);

/// Predicate consulted before every dispatch (§4.E step 6): `(session,
/// "Type.Method") -> allowed`.
pub type PermissionPredicate = Arc<dyn Fn(&Session, &str) -> bool + Send + Sync>;

/// The Connection Hub (§4.D): owns the `ClientDirectory`, fans events out,
/// and runs the per-connection request loop.
pub struct Hub {
    directory: ClientDirectory,
    dispatcher: Arc<Dispatcher>,
    db: Database,
    event_pub_sub: Arc<dyn EventPubSub>,
    session_resolver: Arc<dyn SessionResolver>,
    permission: Option<PermissionPredicate>,
    max_method_call_duration: Duration,
    is_production: bool,
    /// Request context for the owning `HttpServerProcess`, wired in by
    /// [`crate::server_process::HubServerProcess`] once its `run` starts
    /// (it doesn't exist at `Hub::new` time). §4.D: "Spawn a cancellation
    /// watcher that closes the socket when the request context ends."
    shutdown: OnceLock<CancellationToken>,
}

impl Hub {
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        db: Database,
        event_pub_sub: Arc<dyn EventPubSub>,
        session_resolver: Arc<dyn SessionResolver>,
        permission: Option<PermissionPredicate>,
        max_method_call_duration: Duration,
        is_production: bool,
    ) -> Self {
        Self {
            directory: ClientDirectory::new(),
            dispatcher,
            db,
            event_pub_sub,
            session_resolver,
            permission,
            max_method_call_duration: if max_method_call_duration.is_zero() {
                DEFAULT_MAX_METHOD_CALL_DURATION
            } else {
                max_method_call_duration
            },
            is_production,
            shutdown: OnceLock::new(),
        }
    }

    /// Wires in the token whose cancellation should close every live socket
    /// promptly, ahead of `axum`'s graceful-shutdown drain. Set once, by the
    /// process driving this hub.
    pub fn set_shutdown_token(&self, token: CancellationToken) {
        let _ = self.shutdown.set(token);
    }

    /// Axum handler for the upgrade route. Resolves the session before
    /// upgrading; fails the handshake with `401` if none is found (§4.D
    /// "resolve session, fail Unauthenticated if absent").
    pub async fn handshake(self: Arc<Self>, ws: WebSocketUpgrade, headers: HeaderMap) -> Response {
        let Some(session) = self.session_resolver.resolve(&headers) else {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        };

        ws.on_upgrade(move |socket| async move {
            self.serve_connection(socket, session).await;
        })
    }

    async fn serve_connection(self: Arc<Self>, socket: WebSocket, session: Session) {
        let client_id = session.id().to_owned();
        let (sink, mut stream) = socket.split();
        let client = Arc::new(Client::new(client_id.clone(), sink, Arc::clone(&self.event_pub_sub)));

        self.directory.insert(&client_id, Arc::clone(&client));
        debug!(client_id, "hub: client connected");
        metrics::gauge!("bridge_active_clients").increment(1);

        loop {
            let message = if let Some(token) = self.shutdown.get() {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!(client_id, "hub: shutdown requested, closing connection");
                        break;
                    }
                    message = stream.next() => message,
                }
            } else {
                stream.next().await
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    client.touch();
                    self.handle_frame(&client, &session, &text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Binary(_))) => {
                    warn!(client_id, "hub: dropping unsupported binary frame");
                }
                Some(Err(e)) => {
                    warn!(client_id, error = %e, "hub: read failed, closing connection");
                    break;
                }
            }
        }

        self.directory.remove(&client_id, &client);
        client.remove_all_events();
        metrics::gauge!("bridge_active_clients").decrement(1);
        debug!(client_id, "hub: client disconnected");
    }

    async fn handle_frame(&self, client: &Arc<Client>, session: &Session, text: &str) {
        let frame: wire::ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                let error = ServerError {
                    code: wire::ErrorCode::BadRequest,
                    message: format!("malformed frame: {e}"),
                };
                let _ = client.send_frame(&ServerFrame::response_error(String::new(), error)).await;
                return;
            }
        };

        // §4.E step 4: `f` must contain exactly one dot — unlike the local
        // event channel splitter (`wire::split_type_method`, first-dot-only,
        // also used by the broker for DB channel names), an RPC method name
        // with more than one dot is rejected outright rather than split.
        if frame.f.matches('.').count() != 1 {
            let error = ServerError {
                code: wire::ErrorCode::BadRequest,
                message: format!("malformed method name: {:?}", frame.f),
            };
            let _ = client.send_frame(&ServerFrame::response_error(frame.q, error)).await;
            return;
        }

        let Some((type_name, method_name)) = split_type_method(&frame.f) else {
            let error = ServerError {
                code: wire::ErrorCode::BadRequest,
                message: format!("malformed method name: {:?}", frame.f),
            };
            let _ = client.send_frame(&ServerFrame::response_error(frame.q, error)).await;
            return;
        };

        if let Some(permission) = &self.permission {
            if !permission(session, &frame.f) {
                client
                    .send_close(axum::extract::ws::close_code::POLICY, "method is not allowed")
                    .await;
                return;
            }
        }

        let params = match codec::unmarshal_params(&frame.p) {
            Ok(params) => params,
            Err(e) => {
                let error = ServerError {
                    code: wire::ErrorCode::BadRequest,
                    message: e.to_string(),
                };
                let _ = client.send_frame(&ServerFrame::response_error(frame.q, error)).await;
                return;
            }
        };

        let ctx = wire::ServiceContext::new(self.db.clone(), session.clone(), frame.q.clone());

        let outcome = tokio::time::timeout(
            self.max_method_call_duration,
            self.dispatcher.call(type_name, method_name, &params, ctx),
        )
        .await;

        let outcome_label = match &outcome {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        metrics::counter!(
            "bridge_rpc_calls_total",
            "type" => type_name.to_owned(),
            "method" => method_name.to_owned(),
            "outcome" => outcome_label,
        )
        .increment(1);

        let reply = match outcome {
            Ok(Ok(output)) => ServerFrame::response(frame.q, output.into_payload()),
            Ok(Err(e)) => {
                let (code, message) = e.unwrap_for_wire(self.is_production);
                ServerFrame::response_error(
                    frame.q,
                    ServerError {
                        code,
                        message: message.unwrap_or_default(),
                    },
                )
            }
            Err(_) => ServerFrame::response_error(
                frame.q,
                ServerError {
                    code: wire::ErrorCode::RequestTimeout,
                    message: "method call exceeded its deadline".to_owned(),
                },
            ),
        };

        if let Err(e) = client.send_frame(&reply).await {
            warn!(client_id = client.id(), error = %e, "hub: failed to send reply");
        }
    }

    /// Ripples a client's `Subscribe` across every live socket sharing its
    /// session id, matching `original_source/ws/server.go`'s
    /// `SubscribeToEvent` (keyed by session id, not by one socket).
    pub fn subscribe_to_event(&self, session_id: &str, event_id: &str) {
        for client in self.directory.snapshot_by_id(session_id) {
            client.add_event(event_id);
        }
    }

    pub fn unsubscribe_from_event(&self, session_id: &str, event_id: &str) {
        for client in self.directory.snapshot_by_id(session_id) {
            client.remove_event(event_id);
        }
    }

    /// Fans `payload` out to every client subscribed to `event_id`, except
    /// `publisher_id` (§4.D "PublishEvent").
    pub async fn publish_event(&self, publisher_id: &str, event_id: &str, payload: serde_json::Value) {
        let frame = ServerFrame::event(event_id, payload);
        let targets = self.directory.snapshot_subscribers(event_id, publisher_id);

        for client in targets {
            if let Err(e) = client.send_frame(&frame).await {
                warn!(client_id = client.id(), error = %e, "hub: publish write failed, dropping client");
                self.directory.remove(client.id(), &client);
                client.remove_all_events();
            }
        }
    }

    /// Sends `frame` to every socket owned by `client_id` (§4.D
    /// "SendMessageToClientID").
    pub async fn send_message_to_client_id(&self, client_id: &str, frame: &ServerFrame) -> Result<(), HubError> {
        let targets = self.directory.snapshot_by_id(client_id);
        if targets.is_empty() {
            return Err(HubError::ClientNotFound(client_id.to_owned()));
        }

        for client in targets {
            if let Err(e) = client.send_frame(frame).await {
                warn!(client_id, error = %e, "hub: send failed, dropping client");
                self.directory.remove(client_id, &client);
                client.remove_all_events();
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn has_client(&self, client_id: &str) -> bool {
        self.directory.contains_id(client_id)
    }

    /// Closes every live socket with a close frame, bounded per-socket by a
    /// 2-second timeout (§4.D "Shutdown").
    pub async fn shutdown(&self) {
        for client in self.directory.snapshot_all() {
            let _ = tokio::time::timeout(
                Duration::from_secs(2),
                client.send_close(axum::extract::ws::close_code::NORMAL, "WSServer shutting down"),
            )
            .await;
        }
    }

    /// One pass of the cleanup watchdog: ping every socket, drop the ones
    /// that fail, compact empty slots (§4.D "Optional cleanup").
    pub async fn cleanup_pass(&self) {
        for client in self.directory.snapshot_all() {
            if client.send_ping().await.is_err() {
                warn!(client_id = client.id(), "hub: closing stale socket during cleanup");
                self.directory.remove(client.id(), &client);
                client.remove_all_events();
            }
        }
        self.directory.compact();
    }
}

/// End-to-end tests driving a real `axum::serve` instance with
/// `tokio-tungstenite` clients, grounded on §8's "End-to-end scenarios"
/// (2: fan-out with publisher exclusion, 4: arity mismatch, 5: per-call
/// deadline).
#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::routing::get;
    use dispatch::{Handler, HandlerError, Invoke, MethodDescriptor, MethodOutput, RegisteredType};
    use codec::{ParamType, ParameterDescriptor};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    use super::*;

    fn test_db() -> Database {
        Database::new(sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap())
    }

    /// Resolves whatever session id a test client sends in `x-session-id`.
    struct HeaderEchoResolver;

    impl SessionResolver for HeaderEchoResolver {
        fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
            let id = headers.get("x-session-id")?.to_str().ok()?;
            Some(Session::new(id.to_owned(), serde_json::Value::Null))
        }
    }

    #[derive(Default)]
    struct CountingEventPubSub {
        adds: AtomicUsize,
        removes: AtomicUsize,
    }

    impl EventPubSub for CountingEventPubSub {
        fn add_event(&self, _channel: &str) {
            self.adds.fetch_add(1, Ordering::SeqCst);
        }

        fn remove_event(&self, _channel: &str) {
            self.removes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Echo;

    impl Handler for Echo {
        fn set_database(&mut self, _db: Database) {}
        fn set_session(&mut self, _session: Session) {}
        fn set_query_id(&mut self, _query_id: String) {}
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    /// Registers `Foo.Bar(ctx, a: i32, b: string)` and `Slow.Run(ctx)`
    /// (sleeps past any reasonable deadline) for the e2e tests below.
    fn test_dispatcher() -> Arc<Dispatcher> {
        let mut dispatcher = Dispatcher::new();

        let bar: Invoke = Arc::new(|_handler, params| {
            Box::pin(async move {
                let mut it = params.into_iter();
                let a = i32::try_from(it.next().expect("a")).map_err(|e| HandlerError::Internal(e.into()))?;
                let b = String::try_from(it.next().expect("b")).map_err(|e| HandlerError::Internal(e.into()))?;
                Ok(MethodOutput::Single(json!({ "a": a, "b": b })))
            })
        });
        dispatcher.register(
            "Foo",
            RegisteredType::new(
                || Box::new(Echo),
                vec![MethodDescriptor {
                    name: "Bar",
                    params: vec![
                        ParameterDescriptor::new(ParamType::Int(codec::IntWidth::W32)),
                        ParameterDescriptor::new(ParamType::String),
                    ],
                    invoke: bar,
                }],
            ),
        );

        let slow: Invoke = Arc::new(|_handler, _params| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(MethodOutput::Empty)
            })
        });
        dispatcher.register(
            "Slow",
            RegisteredType::new(
                || Box::new(Echo),
                vec![MethodDescriptor {
                    name: "Run",
                    params: vec![],
                    invoke: slow,
                }],
            ),
        );

        Arc::new(dispatcher)
    }

    async fn spawn_test_hub(hub: Arc<Hub>) -> String {
        let router = Router::new()
            .route(
                "/ws",
                get(|State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade, headers: HeaderMap| async move {
                    hub.handshake(ws, headers).await
                }),
            )
            .with_state(hub);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service()).await.unwrap();
        });

        format!("ws://{addr}/ws")
    }

    async fn connect(url: &str, session_id: &str) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
        let mut request = url.into_client_request().unwrap();
        request
            .headers_mut()
            .insert("x-session-id", session_id.parse().unwrap());
        let (stream, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        stream
    }

    #[tokio::test]
    async fn fan_out_excludes_the_publisher() {
        let pub_sub = Arc::new(CountingEventPubSub::default());
        let hub = Arc::new(Hub::new(
            Arc::new(Dispatcher::new()),
            test_db(),
            pub_sub,
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let hub_for_subs = Arc::clone(&hub);
        let url = spawn_test_hub(hub).await;

        let mut a = connect(&url, "A").await;
        let mut b = connect(&url, "B").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        hub_for_subs.subscribe_to_event("A", "Feed.Update");
        hub_for_subs.subscribe_to_event("B", "Feed.Update");
        hub_for_subs.publish_event("A", "Feed.Update", json!({"x": 1})).await;

        let msg = tokio::time::timeout(Duration::from_secs(2), b.next())
            .await
            .expect("B should receive the event")
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["event_id"], "Feed.Update");
        assert_eq!(frame["payload"], json!({"x": 1}));
        assert!(frame["error"].is_null());

        let nothing = tokio::time::timeout(Duration::from_millis(200), a.next()).await;
        assert!(nothing.is_err(), "publisher must not receive its own publication");
    }

    /// DESIGN.md Open Question (ii): exclusion is by session id, so every
    /// tab sharing the publisher's session is excluded, not just the
    /// originating socket.
    #[tokio::test]
    async fn fan_out_excludes_every_socket_of_the_publishing_session() {
        let pub_sub = Arc::new(CountingEventPubSub::default());
        let hub = Arc::new(Hub::new(
            Arc::new(Dispatcher::new()),
            test_db(),
            pub_sub,
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let hub_for_subs = Arc::clone(&hub);
        let url = spawn_test_hub(hub).await;

        // two tabs under the same session id, plus an unrelated session.
        let mut a_tab1 = connect(&url, "A").await;
        let mut a_tab2 = connect(&url, "A").await;
        let mut b = connect(&url, "B").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        hub_for_subs.subscribe_to_event("A", "Feed.Update");
        hub_for_subs.subscribe_to_event("B", "Feed.Update");
        hub_for_subs.publish_event("A", "Feed.Update", json!({"x": 1})).await;

        let msg = tokio::time::timeout(Duration::from_secs(2), b.next())
            .await
            .expect("B should receive the event")
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["event_id"], "Feed.Update");

        let nothing1 = tokio::time::timeout(Duration::from_millis(200), a_tab1.next()).await;
        assert!(nothing1.is_err(), "tab 1 of the publishing session must not receive its own publication");
        let nothing2 = tokio::time::timeout(Duration::from_millis(200), a_tab2.next()).await;
        assert!(nothing2.is_err(), "tab 2 of the publishing session must not receive its own publication either");
    }

    #[tokio::test]
    async fn arity_mismatch_replies_with_bad_request_and_keeps_connection_open() {
        let hub = Arc::new(Hub::new(
            test_dispatcher(),
            test_db(),
            Arc::new(CountingEventPubSub::default()),
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let url = spawn_test_hub(hub).await;
        let mut client = connect(&url, "C").await;

        client
            .send(WsMessage::Text(r#"{"f":"Foo.Bar","q":"q1","p":{"a":1}}"#.into()))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["event_id"], "Response");
        assert_eq!(frame["query_id"], "q1");
        assert_eq!(frame["error"]["code"], "BAD_REQUEST");

        // connection remains open: a second, well-formed call still gets a reply.
        client
            .send(WsMessage::Text(r#"{"f":"Foo.Bar","q":"q2","p":{"a":1,"b":"hi"}}"#.into()))
            .await
            .unwrap();
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["query_id"], "q2");
        assert!(frame["error"].is_null());
        assert_eq!(frame["payload"], json!({"a": 1, "b": "hi"}));
    }

    /// §4.E step 4: `f` with more than one dot is rejected outright, not
    /// split on the first dot the way `wire::split_type_method` would for a
    /// local-event channel name.
    #[tokio::test]
    async fn method_name_with_more_than_one_dot_is_rejected() {
        let hub = Arc::new(Hub::new(
            test_dispatcher(),
            test_db(),
            Arc::new(CountingEventPubSub::default()),
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let url = spawn_test_hub(hub).await;
        let mut client = connect(&url, "C2").await;

        client
            .send(WsMessage::Text(r#"{"f":"Feed.Update.V2","q":"q1","p":{}}"#.into()))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn per_call_deadline_times_out_without_closing_the_connection() {
        let hub = Arc::new(Hub::new(
            test_dispatcher(),
            test_db(),
            Arc::new(CountingEventPubSub::default()),
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_millis(50),
            false,
        ));
        let url = spawn_test_hub(hub).await;
        let mut client = connect(&url, "D").await;

        client
            .send(WsMessage::Text(r#"{"f":"Slow.Run","q":"q1","p":{}}"#.into()))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsMessage::Text(text) = msg else { panic!("expected text frame") };
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["error"]["code"], "REQUEST_TIMEOUT");
    }

    #[tokio::test]
    async fn handshake_without_a_resolvable_session_is_rejected() {
        let hub = Arc::new(Hub::new(
            Arc::new(Dispatcher::new()),
            test_db(),
            Arc::new(CountingEventPubSub::default()),
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let url = spawn_test_hub(hub).await;

        let request = url.into_client_request().unwrap();
        let err = tokio_tungstenite::connect_async(request).await.unwrap_err();
        match err {
            tokio_tungstenite::tungstenite::Error::Http(resp) => {
                assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected an HTTP 401 rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_ripple_into_event_pub_sub_exactly_once() {
        let pub_sub = Arc::new(CountingEventPubSub::default());
        let hub = Arc::new(Hub::new(
            Arc::new(Dispatcher::new()),
            test_db(),
            Arc::clone(&pub_sub) as Arc<dyn EventPubSub>,
            Arc::new(HeaderEchoResolver),
            None,
            Duration::from_secs(1),
            false,
        ));
        let hub_for_subs = Arc::clone(&hub);
        let url = spawn_test_hub(hub).await;

        let _client = connect(&url, "E").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // double-add / double-remove are no-ops (§4.D): only the first
        // subscribe and the last unsubscribe should reach the capability.
        hub_for_subs.subscribe_to_event("E", "X");
        hub_for_subs.subscribe_to_event("E", "X");
        assert_eq!(pub_sub.adds.load(Ordering::SeqCst), 1);

        hub_for_subs.unsubscribe_from_event("E", "X");
        hub_for_subs.unsubscribe_from_event("E", "X");
        assert_eq!(pub_sub.removes.load(Ordering::SeqCst), 1);

        // no live client under this id: a no-op, not an error.
        hub_for_subs.subscribe_to_event("nobody-connected", "Y");
        assert_eq!(pub_sub.adds.load(Ordering::SeqCst), 1);
    }
}
