use crate::database::Database;
use crate::session::Session;

/// Per-call injection bundle: database handle, session handle, and the
/// opaque query id echoed back on the response frame. Created fresh for
/// every RPC call and handed to the dispatcher, which injects its pieces
/// onto the constructed handler before invoking the method.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    db: Database,
    session: Session,
    query_id: String,
}

impl ServiceContext {
    #[must_use]
    pub fn new(db: Database, session: Session, query_id: impl Into<String>) -> Self {
        Self {
            db,
            session,
            query_id: query_id.into(),
        }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }
}
