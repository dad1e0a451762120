use axum::http::HeaderMap;
use wire::Session;

/// Resolves a [`Session`] from the upgrade request, supplied by the host
/// (§3: "a `SessionResolver` capability the host supplies").
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Reference resolver grounded on `original_source/middleware/session.go`'s
/// cookie/bearer lookup: a session cookie takes priority, falling back to
/// an `Authorization: Bearer <token>` header. The raw token becomes the
/// session id verbatim, with no claims attached.
///
/// This is not a production session store — it performs no validation,
/// expiry, or signature check. It exists so the crate is runnable and
/// testable standalone; hosts are expected to supply their own
/// [`SessionResolver`] backed by a real session/identity system.
pub struct HeaderSessionResolver {
    cookie_name: String,
}

impl HeaderSessionResolver {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl Default for HeaderSessionResolver {
    fn default() -> Self {
        Self::new("session_id")
    }
}

impl SessionResolver for HeaderSessionResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        if let Some(id) = extract_cookie(headers, &self.cookie_name) {
            return Some(Session::new(id, serde_json::Value::Null));
        }
        if let Some(id) = extract_bearer(headers) {
            return Some(Session::new(id, serde_json::Value::Null));
        }
        None
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer")).then(|| token.to_owned())
}
