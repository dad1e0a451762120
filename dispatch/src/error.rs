use wire::ErrorCode;

/// An error produced by a registered method's own body. Carries enough to
/// implement §7's three-way unwrap rule without the dispatcher needing to
/// know anything about the handler's concrete error type.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Opts into exposing a specific wire code and message (grounded on
    /// `wire::PublicError`).
    #[error("{message}")]
    Public { code: ErrorCode, message: String },
    /// A validation failure: code is always `VALIDATION_FAILED`, message
    /// always crosses the wire.
    #[error("validation failed: {message}")]
    Validation { message: String },
    /// Anything else. Message is redacted on the wire unless the server is
    /// running in non-production mode.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn public(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Public {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Implements §7's three-way unwrap rule.
    #[must_use]
    pub fn unwrap_for_wire(&self, is_production: bool) -> (ErrorCode, Option<String>) {
        match self {
            Self::Public { code, message } => (code.clone(), Some(message.clone())),
            Self::Validation { message } => (ErrorCode::ValidationFailed, Some(message.clone())),
            Self::Internal(e) => {
                if is_production {
                    (ErrorCode::InternalError, None)
                } else {
                    (ErrorCode::InternalError, Some(e.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("type {0:?} is not registered")]
    TypeNotRegistered(String),

    #[error("method {type_name}.{method_name} not found")]
    MethodNotFound {
        type_name: String,
        method_name: String,
    },

    #[error("arity mismatch: expected {expected} parameter(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Coercion(#[from] codec::CodecError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Shapes any dispatch-time error into a wire error code + message,
    /// matching §7's propagation table: only `HandlerError` ever goes
    /// through the three-way unwrap; everything else the dispatcher itself
    /// raised is a malformed-request condition.
    #[must_use]
    pub fn unwrap_for_wire(&self, is_production: bool) -> (ErrorCode, Option<String>) {
        match self {
            Self::Handler(e) => e.unwrap_for_wire(is_production),
            Self::TypeNotRegistered(_) | Self::MethodNotFound { .. } | Self::ArityMismatch { .. } => {
                (ErrorCode::BadRequest, Some(self.to_string()))
            }
            Self::Coercion(e) => (ErrorCode::BadRequest, Some(e.to_string())),
        }
    }
}
