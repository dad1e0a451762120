use crate::param_type::ParamType;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("cannot coerce {value:?} to {target:?}: {reason}")]
    Coercion {
        target: ParamType,
        value: String,
        reason: String,
    },
}
