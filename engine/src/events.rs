use std::any::Any;
use std::sync::{Arc, OnceLock};

use codec::{ParamType, ParameterDescriptor};
use dispatch::{Handler, HandlerError, Invoke, MethodDescriptor, MethodOutput, RegisteredType};
use hub::Hub;
use wire::{Database, Session};

/// The built-in `Event` handler type (§4.F, grounded on
/// `original_source/services/event.go`'s `EventService`): exposes
/// `Subscribe`/`Unsubscribe`, mutating the calling client's subscription
/// set and rippling into the broker's refcounts through the hub.
#[derive(Default)]
pub struct EventHandler {
    session: Option<Session>,
}

impl Handler for EventHandler {
    fn set_database(&mut self, _db: Database) {}

    fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn set_query_id(&mut self, _query_id: String) {}

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn events_from_param(value: codec::ParamValue) -> Result<Vec<String>, HandlerError> {
    let json: serde_json::Value = value
        .try_into()
        .map_err(|e: codec::CodecError| HandlerError::validation(e.to_string()))?;
    serde_json::from_value(json).map_err(|e| HandlerError::validation(format!("expected an array of event ids: {e}")))
}

/// Registers the `Event` type's `Subscribe`/`Unsubscribe` methods against
/// `dispatcher`. `hub_cell` is filled in by [`crate::wiring::build`] once
/// the hub exists; both methods are no-ops (rather than a crash) if called
/// before that, which can only happen if a handler is dispatched before
/// `build` returns.
pub fn register(dispatcher: &mut dispatch::Dispatcher, hub_cell: Arc<OnceLock<Arc<Hub>>>) {
    let subscribe_hub = Arc::clone(&hub_cell);
    let subscribe: Invoke = Arc::new(move |handler, params| {
        let hub_cell = Arc::clone(&subscribe_hub);
        Box::pin(async move {
            let this = handler.as_any_mut().downcast_mut::<EventHandler>().expect("EventHandler");
            let session = this.session.clone().ok_or_else(|| HandlerError::validation("no session"))?;
            let events = events_from_param(params.into_iter().next().expect("one param"))?;

            if let Some(hub) = hub_cell.get() {
                for event in &events {
                    hub.subscribe_to_event(session.id(), event);
                }
            }
            Ok(MethodOutput::Empty)
        })
    });

    let unsubscribe_hub = Arc::clone(&hub_cell);
    let unsubscribe: Invoke = Arc::new(move |handler, params| {
        let hub_cell = Arc::clone(&unsubscribe_hub);
        Box::pin(async move {
            let this = handler.as_any_mut().downcast_mut::<EventHandler>().expect("EventHandler");
            let session = this.session.clone().ok_or_else(|| HandlerError::validation("no session"))?;
            let events = events_from_param(params.into_iter().next().expect("one param"))?;

            if let Some(hub) = hub_cell.get() {
                for event in &events {
                    hub.unsubscribe_from_event(session.id(), event);
                }
            }
            Ok(MethodOutput::Empty)
        })
    });

    dispatcher.register(
        "Event",
        RegisteredType::new(
            || Box::new(EventHandler::default()),
            vec![
                MethodDescriptor {
                    name: "Subscribe",
                    params: vec![ParameterDescriptor::new(ParamType::Array)],
                    invoke: subscribe,
                },
                MethodDescriptor {
                    name: "Unsubscribe",
                    params: vec![ParameterDescriptor::new(ParamType::Array)],
                    invoke: unsubscribe,
                },
            ],
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch::Dispatcher;
    use wire::ServiceContext;

    fn test_db() -> Database {
        Database::new(sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap())
    }

    #[tokio::test]
    async fn subscribe_before_hub_is_wired_is_a_harmless_no_op() {
        let hub_cell: Arc<OnceLock<Arc<Hub>>> = Arc::new(OnceLock::new());
        let mut dispatcher = Dispatcher::new();
        register(&mut dispatcher, hub_cell);

        let ctx = ServiceContext::new(test_db(), Session::new("s1", serde_json::Value::Null), "q1");
        let params = vec![r#"["Feed.Update"]"#.to_owned()];
        let out = dispatcher.call("Event", "Subscribe", &params, ctx).await.unwrap();
        assert_eq!(out, MethodOutput::Empty);
    }

    #[tokio::test]
    async fn malformed_events_param_is_a_validation_error() {
        let hub_cell: Arc<OnceLock<Arc<Hub>>> = Arc::new(OnceLock::new());
        let mut dispatcher = Dispatcher::new();
        register(&mut dispatcher, hub_cell);

        let ctx = ServiceContext::new(test_db(), Session::new("s1", serde_json::Value::Null), "q1");
        let params = vec![r#"{"not":"an array"}"#.to_owned()];
        let err = dispatcher.call("Event", "Subscribe", &params, ctx).await.unwrap_err();
        assert!(matches!(err, dispatch::DispatchError::Coercion(_)));
    }
}
