//! Shared wire types and domain identities for the event bridge.
//!
//! This crate has no behavior of its own: it is the vocabulary `codec`,
//! `dispatch`, `broker` and `hub` all speak so that none of them need to
//! depend on each other just to pass a session or an error code around.

mod channel;
mod database;
mod error;
mod frame;
mod service_context;
mod session;

pub use channel::split_type_method;
pub use database::Database;
pub use error::{ErrorCode, PublicError};
pub use frame::{ClientFrame, ServerError, ServerFrame};
pub use service_context::ServiceContext;
pub use session::Session;
