use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use askbridge_core::domain::intent::{Intent, IntentId};
use askbridge_core::domain::partition::{Partition, PartitionId};
use askbridge_core::domain::relay::RelayProfile;

pub mod intent;
pub mod memory;
pub mod partition;
pub mod relay_config;

pub use intent::SqlIntentRepository;
pub use memory::{
    InMemoryIntentRepository, InMemoryPartitionRepository, InMemoryRelayConfigRepository,
};
pub use partition::SqlPartitionRepository;
pub use relay_config::SqlRelayConfigRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable record of intents, the single source of truth for their lifecycle.
///
/// Status transitions go through `complete`/`dismiss`, which are atomic
/// compare-and-swap updates: of two racing transitions on the same id exactly
/// one returns `true`. Reads never block writers of unrelated intents.
#[async_trait]
pub trait IntentRepository: Send + Sync {
    async fn create(&self, intent: &Intent) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<Intent>, RepositoryError>;

    /// Pending intents in creation order. `None` scopes to the public
    /// partition (owner IS NULL), never to all partitions.
    async fn list_pending(
        &self,
        owner: Option<&PartitionId>,
    ) -> Result<Vec<Intent>, RepositoryError>;

    /// Newest pending intent for a partition, used to match inbound relay
    /// replies.
    async fn latest_pending_for_owner(
        &self,
        owner: &PartitionId,
    ) -> Result<Option<Intent>, RepositoryError>;

    /// CAS transition Pending → Completed. Returns whether this call won the
    /// transition; `false` means the intent is missing or already terminal.
    async fn complete(
        &self,
        id: &IntentId,
        answer: &str,
        answer_image: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// CAS transition Pending → Dismissed, same contract as `complete`.
    async fn dismiss(
        &self,
        id: &IntentId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Terminal intents, newest completed first.
    async fn list_terminal(
        &self,
        owner: Option<&PartitionId>,
        limit: u32,
    ) -> Result<Vec<Intent>, RepositoryError>;

    /// Delete the given ids, terminal rows only. Returns the removed count.
    async fn delete_terminal(&self, ids: &[IntentId]) -> Result<u64, RepositoryError>;

    /// Retention sweep target: evict terminal intents completed before the
    /// horizon. Pending intents are never touched regardless of age.
    async fn purge_terminal_older_than(
        &self,
        horizon: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PartitionRepository: Send + Sync {
    /// Create on first verified external identity; on conflict refresh the
    /// display profile while preserving credential, flags, and created_at.
    async fn upsert(&self, partition: &Partition) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &PartitionId) -> Result<Option<Partition>, RepositoryError>;

    /// Credential lookup used by the resolver; disabled partitions are not
    /// returned.
    async fn find_active_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Partition>, RepositoryError>;

    async fn rotate_credential(
        &self,
        id: &PartitionId,
        credential: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn set_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn set_notify_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn list(
        &self,
        include_disabled: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Partition>, RepositoryError>;
}

/// Persisted relay credentials. Saving bumps the monotonically increasing
/// version so the supervisor can tag listener instances with the config they
/// were started under.
#[async_trait]
pub trait RelayConfigRepository: Send + Sync {
    async fn load(&self) -> Result<Option<RelayProfile>, RepositoryError>;

    async fn save(&self, app_id: &str, app_secret: &str) -> Result<RelayProfile, RepositoryError>;
}
