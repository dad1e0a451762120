//! Dynamic RPC Dispatcher (spec §4.A): a name-indexed registry of handler
//! types, invoked by `(typeName, methodName, paramStrings)` plus a
//! per-call [`wire::ServiceContext`].
//!
//! Per §9's static-implementation note, there is no runtime reflection
//! here: [`RegisteredType`] is a frozen table built once at process init,
//! and each [`registry::MethodDescriptor`] carries a generated invoker
//! closure rather than a reflected method call.

mod error;
mod handler;
mod output;
mod registry;

pub use error::{DispatchError, HandlerError};
pub use handler::Handler;
pub use output::MethodOutput;
pub use registry::{BoxFuture, Dispatcher, Invoke, MethodDescriptor, RegisteredType};
