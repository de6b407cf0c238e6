use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use askbridge_core::config::EngineConfig;
use askbridge_core::domain::intent::{Intent, IntentId};
use askbridge_core::domain::partition::PartitionId;
use askbridge_db::repositories::{IntentRepository, PartitionRepository};

use crate::errors::EngineError;
use crate::resolver::RoutingKeyResolver;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification port. Delivery is strictly best-effort: the
/// lifecycle logs and swallows failures, so an implementation never has to.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &PartitionId, intent: &Intent) -> Result<(), NotifyError>;
}

#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _recipient: &PartitionId, _intent: &Intent) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleSettings {
    pub answer_timeout: Duration,
    pub wait_poll_interval: Duration,
    pub retention_max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            answer_timeout: Duration::from_secs(3_000),
            wait_poll_interval: Duration::from_secs(1),
            retention_max_age: Duration::from_secs(3 * 24 * 3_600),
            sweep_interval: Duration::from_secs(3_600),
        }
    }
}

impl LifecycleSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            answer_timeout: Duration::from_secs(config.answer_timeout_secs),
            wait_poll_interval: Duration::from_millis(config.wait_poll_interval_ms),
            retention_max_age: Duration::from_secs(u64::from(config.retention_days) * 24 * 3_600),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub question: String,
    pub image: Option<String>,
    pub credential: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub intent_id: IntentId,
    pub answer: Option<String>,
    pub answer_image: Option<String>,
    pub timed_out: bool,
}

/// Orchestrates intent creation and resolution against the store.
///
/// Producers block in `submit` up to the configured timeout; transitions
/// arriving through any channel wake them via a per-intent `Notify`, with a
/// fixed-interval store re-check as fallback. Intent deletion happens only
/// here: the retention sweep and explicit history deletion, both restricted
/// to terminal rows.
pub struct IntentLifecycle {
    intents: Arc<dyn IntentRepository>,
    partitions: Arc<dyn PartitionRepository>,
    notifier: Arc<dyn Notifier>,
    resolver: RoutingKeyResolver,
    watchers: Mutex<HashMap<String, Arc<Notify>>>,
    settings: LifecycleSettings,
}

impl IntentLifecycle {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        partitions: Arc<dyn PartitionRepository>,
        notifier: Arc<dyn Notifier>,
        settings: LifecycleSettings,
    ) -> Self {
        let resolver = RoutingKeyResolver::new(partitions.clone());
        Self {
            intents,
            partitions,
            notifier,
            resolver,
            watchers: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Explicit history deletion. Terminal intents only; pending ids in the
    /// batch are ignored. Deletion of intents happens here and in the sweep,
    /// nowhere else.
    pub async fn delete_history(&self, ids: &[IntentId]) -> Result<u64, EngineError> {
        Ok(self.intents.delete_terminal(ids).await?)
    }

    /// Create an intent and wait (bounded) for a human to resolve it.
    ///
    /// On timeout the intent stays pending and resolvable later; the caller
    /// gets `timed_out = true` instead of an error.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, EngineError> {
        let owner = self.resolver.resolve_owner(request.credential.as_deref()).await?;

        let intent = Intent::new(request.question, request.image, owner, Utc::now());
        self.intents.create(&intent).await?;
        info!(
            intent_id = %intent.id,
            owner = intent.owner.as_ref().map(|id| id.0.as_str()).unwrap_or("public"),
            "intent created"
        );

        self.spawn_notification(&intent).await;

        self.wait_for_resolution(&intent.id, self.settings.answer_timeout).await
    }

    /// Fire-and-forget relay notification for owners that opted in. Failure
    /// never reaches the producer: the intent is already pollable.
    async fn spawn_notification(&self, intent: &Intent) {
        let Some(owner_id) = intent.owner.clone() else {
            return;
        };

        match self.partitions.find_by_id(&owner_id).await {
            Ok(Some(partition)) if partition.notify_enabled => {
                let notifier = self.notifier.clone();
                let intent = intent.clone();
                tokio::spawn(async move {
                    if let Err(error) = notifier.notify(&owner_id, &intent).await {
                        warn!(
                            intent_id = %intent.id,
                            error = %error,
                            "relay notification failed; intent remains pollable"
                        );
                    }
                });
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    intent_id = %intent.id,
                    error = %error,
                    "owner lookup for notification failed"
                );
            }
        }
    }

    /// Block until the intent reaches a terminal state or the timeout lapses.
    pub async fn wait_for_resolution(
        &self,
        id: &IntentId,
        timeout: Duration,
    ) -> Result<SubmitOutcome, EngineError> {
        let notify = self.register_watcher(id).await;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.intents.find_by_id(id).await {
                Ok(Some(intent)) if intent.status.is_terminal() => {
                    self.remove_watcher(id).await;
                    return Ok(SubmitOutcome {
                        intent_id: id.clone(),
                        answer: intent.answer,
                        answer_image: intent.answer_image,
                        timed_out: false,
                    });
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    self.remove_watcher(id).await;
                    return Err(EngineError::NotFound);
                }
                Err(error) => {
                    self.remove_watcher(id).await;
                    return Err(error.into());
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                self.remove_watcher(id).await;
                info!(intent_id = %id, "producer wait timed out; intent stays pending");
                return Ok(SubmitOutcome {
                    intent_id: id.clone(),
                    answer: None,
                    answer_image: None,
                    timed_out: true,
                });
            }

            // Wake on transition, or re-check the store after the poll
            // interval in case the wake was missed.
            let wait_slice = self.settings.wait_poll_interval.min(deadline - now);
            let _ = tokio::time::timeout(wait_slice, notify.notified()).await;
        }
    }

    /// CAS transition to Completed. `NotFound` covers both a missing id and a
    /// lost race against another transition.
    pub async fn complete(
        &self,
        id: &IntentId,
        answer: &str,
        answer_image: Option<&str>,
    ) -> Result<(), EngineError> {
        let won = self.intents.complete(id, answer, answer_image, Utc::now()).await?;
        if !won {
            return Err(EngineError::NotFound);
        }

        info!(intent_id = %id, "intent completed");
        self.wake_waiter(id).await;
        Ok(())
    }

    /// CAS transition to Dismissed, same contract as `complete`.
    pub async fn dismiss(&self, id: &IntentId) -> Result<(), EngineError> {
        let won = self.intents.dismiss(id, Utc::now()).await?;
        if !won {
            return Err(EngineError::NotFound);
        }

        info!(intent_id = %id, "intent dismissed");
        self.wake_waiter(id).await;
        Ok(())
    }

    /// Evict terminal intents older than the retention horizon. Pending
    /// intents are never eligible.
    pub async fn sweep_once(&self) -> Result<u64, EngineError> {
        let max_age = chrono::Duration::seconds(self.settings.retention_max_age.as_secs() as i64);
        let horizon = Utc::now() - max_age;
        Ok(self.intents.purge_terminal_older_than(horizon).await?)
    }

    /// Periodic retention sweep. The caller owns the handle and aborts it on
    /// shutdown.
    pub fn spawn_retention_sweep(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(count) => {
                        info!(count, "retention sweep evicted terminal intents");
                    }
                    Err(error) => {
                        warn!(error = %error, "retention sweep failed");
                    }
                }
            }
        })
    }

    async fn register_watcher(&self, id: &IntentId) -> Arc<Notify> {
        let mut watchers = self.watchers.lock().await;
        watchers.entry(id.0.clone()).or_insert_with(|| Arc::new(Notify::new())).clone()
    }

    async fn remove_watcher(&self, id: &IntentId) {
        self.watchers.lock().await.remove(&id.0);
    }

    // notify_one stores a permit when the producer is between its store
    // re-check and the next notified().await, so the wake cannot be lost.
    async fn wake_waiter(&self, id: &IntentId) {
        let notify = self.watchers.lock().await.get(&id.0).cloned();
        if let Some(notify) = notify {
            notify.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use askbridge_core::domain::intent::{Intent, IntentStatus};
    use askbridge_core::domain::partition::{Partition, PartitionId};
    use askbridge_db::repositories::{
        InMemoryIntentRepository, InMemoryPartitionRepository, IntentRepository,
        PartitionRepository,
    };

    use super::{
        IntentLifecycle, LifecycleSettings, NoopNotifier, Notifier, NotifyError, SubmitRequest,
    };
    use crate::errors::EngineError;

    #[derive(Default)]
    struct RecordingNotifier {
        deliveries: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            recipient: &PartitionId,
            intent: &Intent,
        ) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("transport unavailable".to_owned()));
            }
            self.deliveries
                .lock()
                .await
                .push((recipient.0.clone(), intent.question.clone()));
            Ok(())
        }
    }

    fn fast_settings() -> LifecycleSettings {
        LifecycleSettings {
            answer_timeout: Duration::from_millis(80),
            wait_poll_interval: Duration::from_millis(10),
            retention_max_age: Duration::from_secs(3 * 24 * 3_600),
            sweep_interval: Duration::from_secs(3_600),
        }
    }

    struct Harness {
        intents: Arc<InMemoryIntentRepository>,
        partitions: Arc<InMemoryPartitionRepository>,
        lifecycle: Arc<IntentLifecycle>,
    }

    fn harness_with(notifier: Arc<dyn Notifier>, settings: LifecycleSettings) -> Harness {
        let intents = Arc::new(InMemoryIntentRepository::default());
        let partitions = Arc::new(InMemoryPartitionRepository::default());
        let lifecycle = Arc::new(IntentLifecycle::new(
            intents.clone(),
            partitions.clone(),
            notifier,
            settings,
        ));
        Harness { intents, partitions, lifecycle }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(NoopNotifier), fast_settings())
    }

    fn anonymous_request(question: &str) -> SubmitRequest {
        SubmitRequest { question: question.to_owned(), image: None, credential: None }
    }

    #[tokio::test]
    async fn submit_times_out_and_the_intent_stays_pending() {
        let harness = harness();

        let outcome =
            harness.lifecycle.submit(anonymous_request("anyone there?")).await.expect("submit");

        assert!(outcome.timed_out);
        assert_eq!(outcome.answer, None);

        let stored = harness
            .intents
            .find_by_id(&outcome.intent_id)
            .await
            .expect("find")
            .expect("intent survives the timeout");
        assert_eq!(stored.status, IntentStatus::Pending);
    }

    #[tokio::test]
    async fn late_reply_after_timeout_still_succeeds() {
        let harness = harness();

        let outcome =
            harness.lifecycle.submit(anonymous_request("anyone there?")).await.expect("submit");
        assert!(outcome.timed_out);

        harness
            .lifecycle
            .complete(&outcome.intent_id, "here now", None)
            .await
            .expect("late reply lands on the pending intent");

        let stored = harness
            .intents
            .find_by_id(&outcome.intent_id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, IntentStatus::Completed);
        assert_eq!(stored.answer.as_deref(), Some("here now"));
    }

    #[tokio::test]
    async fn reply_during_the_wait_wakes_the_producer() {
        let harness = harness_with(
            Arc::new(NoopNotifier),
            LifecycleSettings {
                answer_timeout: Duration::from_secs(30),
                wait_poll_interval: Duration::from_secs(30),
                ..fast_settings()
            },
        );

        let lifecycle = harness.lifecycle.clone();
        let replier = tokio::spawn(async move {
            // Let the producer get into its wait first.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let pending = lifecycle.intents.list_pending(None).await.expect("pending");
            lifecycle.complete(&pending[0].id, "yes", None).await.expect("complete");
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            harness.lifecycle.submit(anonymous_request("ship it?")),
        )
        .await
        .expect("the notify wake must beat the 30s poll interval")
        .expect("submit");

        assert!(!outcome.timed_out);
        assert_eq!(outcome.answer.as_deref(), Some("yes"));
        replier.await.expect("replier");
    }

    #[tokio::test]
    async fn second_transition_reports_not_found() {
        let harness = harness();

        let outcome = harness.lifecycle.submit(anonymous_request("Q")).await.expect("submit");
        harness.lifecycle.complete(&outcome.intent_id, "A", None).await.expect("first wins");

        let dismiss_err = harness
            .lifecycle
            .dismiss(&outcome.intent_id)
            .await
            .expect_err("second transition must lose");
        assert!(matches!(dismiss_err, EngineError::NotFound));

        let reply_err = harness
            .lifecycle
            .complete(&outcome.intent_id, "B", None)
            .await
            .expect_err("repeat reply must lose");
        assert!(matches!(reply_err, EngineError::NotFound));
    }

    #[tokio::test]
    async fn unknown_credential_is_rejected_before_any_state_change() {
        let harness = harness();

        let error = harness
            .lifecycle
            .submit(SubmitRequest {
                question: "Q".to_owned(),
                image: None,
                credential: Some("uk_bogus".to_owned()),
            })
            .await
            .expect_err("must fail");

        assert!(matches!(error, EngineError::Auth));
        assert!(harness.intents.list_pending(None).await.expect("pending").is_empty());
    }

    async fn notify_enabled_partition(harness: &Harness) -> Partition {
        let partition = Partition::new(PartitionId("ou_notify".into()), "N", None, Utc::now());
        harness.partitions.upsert(&partition).await.expect("upsert");
        harness
            .partitions
            .set_notify_enabled(&partition.id, true, Utc::now())
            .await
            .expect("enable notify");
        partition
    }

    #[tokio::test]
    async fn opted_in_owners_get_a_relay_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let harness = harness_with(notifier.clone(), fast_settings());
        let partition = notify_enabled_partition(&harness).await;

        harness
            .lifecycle
            .submit(SubmitRequest {
                question: "notify me".to_owned(),
                image: None,
                credential: Some(partition.credential.clone()),
            })
            .await
            .expect("submit");

        let deliveries = notifier.deliveries.lock().await;
        assert_eq!(
            deliveries.as_slice(),
            &[("ou_notify".to_owned(), "notify me".to_owned())]
        );
    }

    #[tokio::test]
    async fn notification_failure_never_fails_the_submit() {
        let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
        let harness = harness_with(notifier, fast_settings());
        let partition = notify_enabled_partition(&harness).await;

        let outcome = harness
            .lifecycle
            .submit(SubmitRequest {
                question: "notify me".to_owned(),
                image: None,
                credential: Some(partition.credential.clone()),
            })
            .await
            .expect("submit succeeds despite delivery failure");

        assert!(outcome.timed_out);
        let pending =
            harness.intents.list_pending(Some(&partition.id)).await.expect("pending");
        assert_eq!(pending.len(), 1, "the intent is still pollable");
    }

    #[tokio::test]
    async fn sweep_uses_the_configured_horizon() {
        let harness = harness();

        let old = Intent::new("old", None, None, Utc::now());
        let fresh = Intent::new("fresh", None, None, Utc::now());
        harness.intents.create(&old).await.expect("old");
        harness.intents.create(&fresh).await.expect("fresh");
        harness
            .intents
            .complete(&old.id, "a", None, Utc::now() - chrono::Duration::days(10))
            .await
            .expect("complete old");
        harness
            .intents
            .complete(&fresh.id, "b", None, Utc::now())
            .await
            .expect("complete fresh");

        let evicted = harness.lifecycle.sweep_once().await.expect("sweep");

        assert_eq!(evicted, 1);
        assert!(harness.intents.find_by_id(&old.id).await.expect("old").is_none());
        assert!(harness.intents.find_by_id(&fresh.id).await.expect("fresh").is_some());
    }
}
