use std::time::Duration;

/// Milliseconds since the UNIX epoch.
///
/// # Panics
/// Panics if the system clock is set before the epoch.
#[must_use]
pub fn current_timestamp() -> Duration {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time went backwards")
}
