//! Connection Hub (spec §4.D): accepts socket upgrades, maintains the
//! [`directory::ClientDirectory`], fans events out under the serialized
//! write discipline from §5, and runs the per-connection request loop
//! (§4.E) inline in its websocket handler.

mod capability;
mod client;
mod directory;
mod error;
mod hub;
mod server_process;
mod session;

pub use capability::EventPubSub;
pub use client::Client;
pub use directory::ClientDirectory;
pub use error::HubError;
pub use hub::{Hub, PermissionPredicate};
pub use server_process::HubServerProcess;
pub use session::{HeaderSessionResolver, SessionResolver};
