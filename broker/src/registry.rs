use std::collections::HashMap;

use parking_lot::Mutex;

/// Reference-counted channel subscriptions (§3: "SubscriptionRegistry").
///
/// Invariants: a count is strictly positive while its entry is present; an
/// entry exists iff at least one live subscriber (client or local
/// consumer) requires it; `0→1`/`1→0` transitions are atomic with respect
/// to concurrent callers because the whole read-modify-write happens
/// under one [`parking_lot::Mutex`] lock.
#[derive(Default)]
pub struct SubscriptionRegistry {
    counts: Mutex<HashMap<String, usize>>,
}

impl SubscriptionRegistry {
    /// Seeds local events at refcount 1 so the broker `LISTEN`s on them
    /// even with zero subscribers (§4.C).
    #[must_use]
    pub fn seeded_with(local_events: impl IntoIterator<Item = String>) -> Self {
        let counts = local_events.into_iter().map(|channel| (channel, 1)).collect();
        Self {
            counts: Mutex::new(counts),
        }
    }

    /// Increments the refcount for `channel`. Returns `true` iff this call
    /// caused the `0→1` transition.
    pub fn add(&self, channel: &str) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(channel) {
            Some(count) => {
                *count += 1;
                false
            }
            None => {
                counts.insert(channel.to_owned(), 1);
                true
            }
        }
    }

    /// Decrements the refcount for `channel`. Returns `true` iff this call
    /// caused the `1→0` transition (the entry is removed).
    pub fn remove(&self, channel: &str) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(channel) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(channel);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn count(&self, channel: &str) -> (usize, bool) {
        let counts = self.counts.lock();
        counts.get(channel).map_or((0, false), |count| (*count, true))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.lock().len()
    }

    /// All channels currently subscribed, for resubscribing after a
    /// reconnect (§4.C "Subscribing").
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.counts.lock().keys().cloned().collect()
    }
}
