//! Parameter Codec (spec §4.B): turns a client's JSON payload into an
//! ordered sequence of positional string carriers, then coerces each
//! carrier into a typed [`ParamValue`] per its declared [`ParameterDescriptor`].

mod coerce;
mod error;
mod param_type;
mod param_value;
mod unmarshal;

pub use coerce::{coerce, coerce_or_null};
pub use error::CodecError;
pub use param_type::{FloatWidth, IntWidth, ParamType, ParameterDescriptor};
pub use param_value::ParamValue;
pub use unmarshal::unmarshal_params;
