/// Handle to the pool used by handler methods for their own queries.
///
/// Distinct from the Event Broker's dedicated notification connection
/// (§4.C: "own exactly one database connection dedicated to
/// notifications") — that connection is never shared with request
/// handling.
#[derive(Clone, Debug)]
pub struct Database(sqlx::PgPool);

impl Database {
    #[must_use]
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self(pool)
    }

    #[must_use]
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.0
    }
}
