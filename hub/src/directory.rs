use std::sync::Arc;

use dashmap::DashMap;

use crate::client::Client;

/// Mapping from client identifier (== session identifier) to its live
/// sockets (§3: "ClientDirectory"). Backed by `DashMap` rather than a
/// single `RwLock<HashMap<...>>`: reads (fan-out snapshots) dominate
/// writes, and sharded locking keeps a slow fan-out from stalling joins on
/// unrelated keys — the same tradeoff the teacher's stack makes for its
/// other concurrent per-key maps.
#[derive(Default)]
pub struct ClientDirectory {
    clients: DashMap<String, Vec<Arc<Client>>>,
}

impl ClientDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `client` under `client_id`'s slot.
    pub fn insert(&self, client_id: &str, client: Arc<Client>) {
        self.clients.entry(client_id.to_owned()).or_default().push(client);
    }

    /// Removes `client` from its slot, matching by identity (`Arc::ptr_eq`)
    /// rather than by id alone, since multiple sockets may share an id.
    /// Deletes the slot entirely once empty.
    pub fn remove(&self, client_id: &str, client: &Arc<Client>) {
        let Some(mut entry) = self.clients.get_mut(client_id) else {
            return;
        };
        entry.retain(|c| !Arc::ptr_eq(c, client));
        let is_empty = entry.is_empty();
        drop(entry);
        if is_empty {
            self.clients.remove(client_id);
        }
    }

    /// Snapshot of every client under `client_id`, for `SendMessageToClientID`.
    #[must_use]
    pub fn snapshot_by_id(&self, client_id: &str) -> Vec<Arc<Client>> {
        self.clients.get(client_id).map(|entry| entry.clone()).unwrap_or_default()
    }

    /// Snapshot of every client, across every slot, subscribed to `event_id`
    /// and not matching `publisher_id` (§4.D "PublishEvent").
    #[must_use]
    pub fn snapshot_subscribers(&self, event_id: &str, publisher_id: &str) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .flat_map(|entry| entry.value().clone())
            .filter(|client| client.id() != publisher_id && client.has_event(event_id))
            .collect()
    }

    /// Snapshot of every live socket, for shutdown and the cleanup watchdog.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<Arc<Client>> {
        self.clients.iter().flat_map(|entry| entry.value().clone()).collect()
    }

    pub fn compact(&self) {
        self.clients.retain(|_, clients| !clients.is_empty());
    }

    #[must_use]
    pub fn contains_id(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }
}
