use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use askbridge_core::domain::partition::PartitionId;
use askbridge_db::repositories::{IntentRepository, PartitionRepository};
use askbridge_relay::listener::{IngestError, IngestOutcome, ReplyIngest};

use crate::errors::EngineError;
use crate::lifecycle::IntentLifecycle;

/// Bridges inbound relay replies into the lifecycle engine.
///
/// The sender is matched by external identity (the partition id the IM
/// channel reports), never by API credential. The reply resolves the
/// partition's most recent pending intent; with several questions in flight
/// this heuristic can misroute, so the matched id is logged for diagnosis.
pub struct LifecycleReplyIngest {
    partitions: Arc<dyn PartitionRepository>,
    intents: Arc<dyn IntentRepository>,
    lifecycle: Arc<IntentLifecycle>,
}

impl LifecycleReplyIngest {
    pub fn new(
        partitions: Arc<dyn PartitionRepository>,
        intents: Arc<dyn IntentRepository>,
        lifecycle: Arc<IntentLifecycle>,
    ) -> Self {
        Self { partitions, intents, lifecycle }
    }
}

#[async_trait]
impl ReplyIngest for LifecycleReplyIngest {
    async fn ingest_reply(
        &self,
        sender_id: &str,
        reply_text: &str,
    ) -> Result<IngestOutcome, IngestError> {
        let partition = self
            .partitions
            .find_by_id(&PartitionId(sender_id.to_owned()))
            .await
            .map_err(|error| IngestError::Failed(error.to_string()))?;
        let Some(partition) = partition else {
            return Ok(IngestOutcome::Unmatched);
        };

        let latest = self
            .intents
            .latest_pending_for_owner(&partition.id)
            .await
            .map_err(|error| IngestError::Failed(error.to_string()))?;
        let Some(intent) = latest else {
            return Ok(IngestOutcome::Unmatched);
        };

        info!(
            sender_id = %sender_id,
            intent_id = %intent.id,
            "matched relay reply to most recent pending intent"
        );

        match self.lifecycle.complete(&intent.id, reply_text, None).await {
            Ok(()) => Ok(IngestOutcome::Completed { intent_id: intent.id.0 }),
            // Another channel resolved it between the lookup and our CAS.
            Err(EngineError::NotFound) => Ok(IngestOutcome::Unmatched),
            Err(error) => Err(IngestError::Failed(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use askbridge_core::domain::intent::{Intent, IntentStatus};
    use askbridge_core::domain::partition::{Partition, PartitionId};
    use askbridge_db::repositories::{
        InMemoryIntentRepository, InMemoryPartitionRepository, IntentRepository,
        PartitionRepository,
    };
    use askbridge_relay::listener::{IngestOutcome, ReplyIngest};

    use super::LifecycleReplyIngest;
    use crate::lifecycle::{IntentLifecycle, LifecycleSettings, NoopNotifier};

    struct Harness {
        intents: Arc<InMemoryIntentRepository>,
        partitions: Arc<InMemoryPartitionRepository>,
        ingest: LifecycleReplyIngest,
    }

    fn harness() -> Harness {
        let intents = Arc::new(InMemoryIntentRepository::default());
        let partitions = Arc::new(InMemoryPartitionRepository::default());
        let lifecycle = Arc::new(IntentLifecycle::new(
            intents.clone(),
            partitions.clone(),
            Arc::new(NoopNotifier),
            LifecycleSettings::default(),
        ));
        let ingest =
            LifecycleReplyIngest::new(partitions.clone(), intents.clone(), lifecycle);
        Harness { intents, partitions, ingest }
    }

    async fn add_partition(harness: &Harness, id: &str) -> Partition {
        let partition = Partition::new(PartitionId(id.to_owned()), id, None, Utc::now());
        harness.partitions.upsert(&partition).await.expect("upsert");
        partition
    }

    #[tokio::test]
    async fn reply_completes_the_most_recent_pending_intent() {
        let harness = harness();
        let partition = add_partition(&harness, "ou_sender").await;

        let older = Intent::new(
            "older",
            None,
            Some(partition.id.clone()),
            Utc::now() - chrono::Duration::from_std(Duration::from_secs(60)).expect("duration"),
        );
        let newer = Intent::new("newer", None, Some(partition.id.clone()), Utc::now());
        harness.intents.create(&older).await.expect("older");
        harness.intents.create(&newer).await.expect("newer");

        let outcome = harness
            .ingest
            .ingest_reply("ou_sender", "this answers the newer one")
            .await
            .expect("ingest");

        assert_eq!(outcome, IngestOutcome::Completed { intent_id: newer.id.0.clone() });

        let stored = harness.intents.find_by_id(&newer.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, IntentStatus::Completed);
        assert_eq!(stored.answer.as_deref(), Some("this answers the newer one"));

        let untouched =
            harness.intents.find_by_id(&older.id).await.expect("find").expect("exists");
        assert_eq!(untouched.status, IntentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_sender_is_unmatched() {
        let harness = harness();

        let outcome =
            harness.ingest.ingest_reply("ou_stranger", "hello?").await.expect("ingest");

        assert_eq!(outcome, IngestOutcome::Unmatched);
    }

    #[tokio::test]
    async fn sender_without_pending_intents_is_unmatched() {
        let harness = harness();
        add_partition(&harness, "ou_idle").await;

        let outcome =
            harness.ingest.ingest_reply("ou_idle", "unsolicited").await.expect("ingest");

        assert_eq!(outcome, IngestOutcome::Unmatched);
    }
}
