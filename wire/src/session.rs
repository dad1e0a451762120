/// A resolved session identity, handed to the core by its host.
///
/// The core never authenticates anyone; it only carries whatever identity
/// its host already resolved (session store, JWT, whatever). `id` doubles
/// as the client identifier (§3: "a stable client identifier (equal to
/// session identifier)").
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    claims: serde_json::Value,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>, claims: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            claims,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn claims(&self) -> &serde_json::Value {
        &self.claims
    }
}
