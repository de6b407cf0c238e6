use std::sync::Arc;

use askbridge_core::domain::partition::PartitionId;
use askbridge_db::repositories::PartitionRepository;

use crate::errors::EngineError;

/// Where an inbound request lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionKey {
    /// No credential supplied: the public/anonymous bucket.
    Public,
    Tenant(PartitionId),
}

/// Maps an inbound credential (or its absence) to a partition key.
///
/// Both the polling gateway and the producer create path go through this:
/// no credential means public, an unknown or disabled credential is an auth
/// failure, and a valid active credential scopes the caller to its partition.
#[derive(Clone)]
pub struct RoutingKeyResolver {
    partitions: Arc<dyn PartitionRepository>,
}

impl RoutingKeyResolver {
    pub fn new(partitions: Arc<dyn PartitionRepository>) -> Self {
        Self { partitions }
    }

    pub async fn resolve(&self, credential: Option<&str>) -> Result<PartitionKey, EngineError> {
        let Some(credential) = credential else {
            return Ok(PartitionKey::Public);
        };

        match self.partitions.find_active_by_credential(credential).await? {
            Some(partition) => Ok(PartitionKey::Tenant(partition.id)),
            None => Err(EngineError::Auth),
        }
    }

    /// `resolve`, flattened to the owner column shape: `None` is public.
    pub async fn resolve_owner(
        &self,
        credential: Option<&str>,
    ) -> Result<Option<PartitionId>, EngineError> {
        Ok(match self.resolve(credential).await? {
            PartitionKey::Public => None,
            PartitionKey::Tenant(id) => Some(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use askbridge_core::domain::partition::{Partition, PartitionId};
    use askbridge_db::repositories::{InMemoryPartitionRepository, PartitionRepository};

    use super::{PartitionKey, RoutingKeyResolver};
    use crate::errors::EngineError;

    async fn resolver_with_partition() -> (RoutingKeyResolver, Partition) {
        let partitions = Arc::new(InMemoryPartitionRepository::default());
        let partition = Partition::new(PartitionId("ou_abc".into()), "Dana", None, Utc::now());
        partitions.upsert(&partition).await.expect("upsert");
        (RoutingKeyResolver::new(partitions), partition)
    }

    #[tokio::test]
    async fn absent_credential_resolves_to_public() {
        let (resolver, _) = resolver_with_partition().await;

        let key = resolver.resolve(None).await.expect("resolve");
        assert_eq!(key, PartitionKey::Public);
        assert_eq!(resolver.resolve_owner(None).await.expect("owner"), None);
    }

    #[tokio::test]
    async fn valid_credential_resolves_to_its_partition() {
        let (resolver, partition) = resolver_with_partition().await;

        let key = resolver.resolve(Some(&partition.credential)).await.expect("resolve");
        assert_eq!(key, PartitionKey::Tenant(partition.id));
    }

    #[tokio::test]
    async fn unknown_credential_is_an_auth_failure() {
        let (resolver, _) = resolver_with_partition().await;

        let error = resolver.resolve(Some("uk_does_not_exist")).await.expect_err("must fail");
        assert!(matches!(error, EngineError::Auth));
    }

    #[tokio::test]
    async fn disabled_credential_is_an_auth_failure() {
        let partitions = Arc::new(InMemoryPartitionRepository::default());
        let partition = Partition::new(PartitionId("ou_off".into()), "Off", None, Utc::now());
        partitions.upsert(&partition).await.expect("upsert");
        partitions.set_enabled(&partition.id, false, Utc::now()).await.expect("disable");

        let resolver = RoutingKeyResolver::new(partitions);
        let error =
            resolver.resolve(Some(&partition.credential)).await.expect_err("must fail");
        assert!(matches!(error, EngineError::Auth));
    }
}
