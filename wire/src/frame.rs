use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Client → server frame: `{"f": "<Type>.<Method>", "q": "<opaque>", "p": <object>}`.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub f: String,
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_payload")]
    pub p: serde_json::Value,
}

fn default_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Server → client frame. `event_id` is `"Response"` for RPC replies,
/// otherwise the event channel name.
#[derive(Debug, Serialize)]
pub struct ServerFrame {
    pub event_id: String,
    pub query_id: String,
    pub payload: Option<serde_json::Value>,
    pub error: Option<ServerError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServerFrame {
    #[must_use]
    pub fn response(query_id: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            event_id: "Response".to_owned(),
            query_id: query_id.into(),
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn response_error(query_id: impl Into<String>, error: ServerError) -> Self {
        Self {
            event_id: "Response".to_owned(),
            query_id: query_id.into(),
            payload: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn event(event_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: event_id.into(),
            query_id: String::new(),
            payload: Some(payload),
            error: None,
        }
    }
}
