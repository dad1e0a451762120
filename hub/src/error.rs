/// Hub-internal failures (§7 taxonomy: `Unauthenticated`, `PolicyDenied`,
/// `TransportError`, plus the hub-local `ClientNotFound`).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No session could be resolved at handshake time. Aborts the
    /// connection before a `Client` is ever constructed.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The configured permission predicate denied the call. Aborts the
    /// connection with a policy-violation close frame.
    #[error("method {type_name}.{method_name} is not allowed")]
    PolicyDenied { type_name: String, method_name: String },

    /// A socket read or write failed outside of the normal close
    /// handshake. Aborts the connection.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// `SendMessageToClientID` found no live socket under that id.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}
