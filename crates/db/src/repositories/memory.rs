use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use askbridge_core::domain::intent::{Intent, IntentId};
use askbridge_core::domain::partition::{Partition, PartitionId};
use askbridge_core::domain::relay::RelayProfile;

use super::{
    IntentRepository, PartitionRepository, RelayConfigRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryIntentRepository {
    intents: RwLock<HashMap<String, Intent>>,
}

#[async_trait::async_trait]
impl IntentRepository for InMemoryIntentRepository {
    async fn create(&self, intent: &Intent) -> Result<(), RepositoryError> {
        let mut intents = self.intents.write().await;
        intents.insert(intent.id.0.clone(), intent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<Intent>, RepositoryError> {
        let intents = self.intents.read().await;
        Ok(intents.get(&id.0).cloned())
    }

    async fn list_pending(
        &self,
        owner: Option<&PartitionId>,
    ) -> Result<Vec<Intent>, RepositoryError> {
        let intents = self.intents.read().await;
        let mut pending: Vec<Intent> = intents
            .values()
            .filter(|intent| !intent.status.is_terminal() && intent.owner.as_ref() == owner)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn latest_pending_for_owner(
        &self,
        owner: &PartitionId,
    ) -> Result<Option<Intent>, RepositoryError> {
        let pending = self.list_pending(Some(owner)).await?;
        Ok(pending.into_iter().last())
    }

    async fn complete(
        &self,
        id: &IntentId,
        answer: &str,
        answer_image: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents.get_mut(&id.0) else {
            return Ok(false);
        };
        Ok(intent
            .complete(answer, answer_image.map(str::to_owned), completed_at)
            .is_ok())
    }

    async fn dismiss(
        &self,
        id: &IntentId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents.get_mut(&id.0) else {
            return Ok(false);
        };
        Ok(intent.dismiss(completed_at).is_ok())
    }

    async fn list_terminal(
        &self,
        owner: Option<&PartitionId>,
        limit: u32,
    ) -> Result<Vec<Intent>, RepositoryError> {
        let intents = self.intents.read().await;
        let mut terminal: Vec<Intent> = intents
            .values()
            .filter(|intent| intent.status.is_terminal() && intent.owner.as_ref() == owner)
            .cloned()
            .collect();
        terminal.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        terminal.truncate(limit as usize);
        Ok(terminal)
    }

    async fn delete_terminal(&self, ids: &[IntentId]) -> Result<u64, RepositoryError> {
        let mut intents = self.intents.write().await;
        let mut removed = 0;
        for id in ids {
            let is_terminal =
                intents.get(&id.0).map(|intent| intent.status.is_terminal()).unwrap_or(false);
            if is_terminal {
                intents.remove(&id.0);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_terminal_older_than(
        &self,
        horizon: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut intents = self.intents.write().await;
        let before = intents.len();
        intents.retain(|_, intent| {
            !(intent.status.is_terminal()
                && intent.completed_at.map(|at| at < horizon).unwrap_or(false))
        });
        Ok((before - intents.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryPartitionRepository {
    partitions: RwLock<HashMap<String, Partition>>,
}

#[async_trait::async_trait]
impl PartitionRepository for InMemoryPartitionRepository {
    async fn upsert(&self, partition: &Partition) -> Result<(), RepositoryError> {
        let mut partitions = self.partitions.write().await;
        match partitions.get_mut(&partition.id.0) {
            Some(existing) => {
                existing.display_name = partition.display_name.clone();
                if partition.avatar_url.is_some() {
                    existing.avatar_url = partition.avatar_url.clone();
                }
                existing.updated_at = partition.updated_at;
            }
            None => {
                partitions.insert(partition.id.0.clone(), partition.clone());
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &PartitionId) -> Result<Option<Partition>, RepositoryError> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(&id.0).cloned())
    }

    async fn find_active_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Partition>, RepositoryError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .values()
            .find(|partition| partition.credential == credential && !partition.disabled)
            .cloned())
    }

    async fn rotate_credential(
        &self,
        id: &PartitionId,
        credential: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut partitions = self.partitions.write().await;
        match partitions.get_mut(&id.0) {
            Some(partition) => {
                partition.credential = credential.to_owned();
                partition.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut partitions = self.partitions.write().await;
        match partitions.get_mut(&id.0) {
            Some(partition) => {
                partition.disabled = !enabled;
                partition.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_notify_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut partitions = self.partitions.write().await;
        match partitions.get_mut(&id.0) {
            Some(partition) => {
                partition.notify_enabled = enabled;
                partition.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(
        &self,
        include_disabled: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Partition>, RepositoryError> {
        let partitions = self.partitions.read().await;
        let mut listed: Vec<Partition> = partitions
            .values()
            .filter(|partition| include_disabled || !partition.disabled)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed.into_iter().skip(offset as usize).take(limit as usize).collect())
    }
}

#[derive(Default)]
pub struct InMemoryRelayConfigRepository {
    profile: RwLock<Option<RelayProfile>>,
}

#[async_trait::async_trait]
impl RelayConfigRepository for InMemoryRelayConfigRepository {
    async fn load(&self) -> Result<Option<RelayProfile>, RepositoryError> {
        let profile = self.profile.read().await;
        Ok(profile.clone())
    }

    async fn save(&self, app_id: &str, app_secret: &str) -> Result<RelayProfile, RepositoryError> {
        let mut profile = self.profile.write().await;
        let version = profile.as_ref().map(|existing| existing.version + 1).unwrap_or(1);
        let saved = RelayProfile::new(app_id, app_secret, version);
        *profile = Some(saved.clone());
        Ok(saved)
    }
}
