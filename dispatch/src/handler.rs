use std::any::Any;

use wire::{Database, Session};

/// Capability set a registered handler type must provide so the dispatcher
/// can build and inject a [`wire::ServiceContext`] without knowing the
/// concrete type (§9: "a small capability set `{set_database, set_session,
/// set_query_id}`").
pub trait Handler: Any + Send + Sync {
    fn set_database(&mut self, db: Database);
    fn set_session(&mut self, session: Session);
    fn set_query_id(&mut self, query_id: String);

    /// Lets the per-method invoke closure downcast back to the concrete
    /// type before calling the real async method.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
