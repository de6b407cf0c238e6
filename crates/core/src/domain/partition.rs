use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub String);

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The isolation boundary scoping intent visibility and history.
///
/// A partition is keyed by the stable external identity reported by the IM
/// channel (its open-id). The credential is the API key poll-driven consumers
/// and producers authenticate with. Partitions are soft-disabled, never
/// deleted; disabling hides the credential from resolution but keeps the
/// partition's intents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credential: String,
    pub notify_enabled: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partition {
    /// Build a partition for a newly verified external identity with a fresh
    /// credential.
    pub fn new(
        id: PartitionId,
        display_name: impl Into<String>,
        avatar_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar_url,
            credential: generate_credential(),
            notify_enabled: false,
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Generate an API key in the `uk_<32 hex chars>` format.
pub fn generate_credential() -> String {
    use std::fmt::Write;

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut key = String::with_capacity(3 + bytes.len() * 2);
    key.push_str("uk_");
    for byte in bytes {
        let _ = write!(key, "{byte:02x}");
    }
    key
}
