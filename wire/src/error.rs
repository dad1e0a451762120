use serde::{Serialize, Serializer};

/// The closed error-code set from the wire contract, with an escape hatch
/// for application-defined codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownError,
    InternalError,
    BadRequest,
    RequestTimeout,
    ValidationFailed,
    NoSession,
    NotAllowed,
    /// Application-defined code, crossed through verbatim.
    Other(String),
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NoSession => "NO_SESSION",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::Other(code) => code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An error a registered method may opt into exposing on the wire.
/// Anything that doesn't implement this gets redacted per §7 unless the
/// server is running in non-production mode.
pub trait PublicError: std::error::Error + Send + Sync + 'static {
    fn code(&self) -> ErrorCode;
}
