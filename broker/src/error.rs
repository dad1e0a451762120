/// Never crosses the wire (§7: "DbAcquireFailed and DbExecFailed inside
/// the broker trigger reconnection, never client-visible"); it only
/// drives the supervision loop's Acquiring/Pumping transitions.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to acquire notification connection: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("notification connection execution failed: {0}")]
    Exec(#[source] sqlx::Error),
}
