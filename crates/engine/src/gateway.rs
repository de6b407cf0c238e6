use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use askbridge_core::domain::intent::{Intent, IntentId};
use askbridge_db::repositories::IntentRepository;

use crate::errors::EngineError;
use crate::lifecycle::IntentLifecycle;
use crate::resolver::RoutingKeyResolver;

/// What a poll-driven consumer sees for an unresolved intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingIntent {
    pub intent_id: IntentId,
    pub question: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Intent> for PendingIntent {
    fn from(intent: Intent) -> Self {
        Self {
            intent_id: intent.id,
            question: intent.question,
            image: intent.image,
            created_at: intent.created_at,
        }
    }
}

/// Read/write surface for poll-driven consumers.
///
/// `poll` and `history` are idempotent snapshot reads scoped by the caller's
/// credential; `reply` and `dismiss` are single-shot delegations into the
/// lifecycle. Any number of concurrent pollers may observe the same pending
/// set - only a transition call mutates state.
pub struct PollingGateway {
    resolver: RoutingKeyResolver,
    lifecycle: Arc<IntentLifecycle>,
    intents: Arc<dyn IntentRepository>,
}

impl PollingGateway {
    pub fn new(
        resolver: RoutingKeyResolver,
        lifecycle: Arc<IntentLifecycle>,
        intents: Arc<dyn IntentRepository>,
    ) -> Self {
        Self { resolver, lifecycle, intents }
    }

    pub async fn poll(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<PendingIntent>, EngineError> {
        let owner = self.resolver.resolve_owner(credential).await?;
        let pending = self.intents.list_pending(owner.as_ref()).await?;
        Ok(pending.into_iter().map(PendingIntent::from).collect())
    }

    pub async fn reply(
        &self,
        id: &IntentId,
        answer: &str,
        image: Option<&str>,
    ) -> Result<(), EngineError> {
        self.lifecycle.complete(id, answer, image).await
    }

    pub async fn dismiss(&self, id: &IntentId) -> Result<(), EngineError> {
        self.lifecycle.dismiss(id).await
    }

    /// Terminal intents for the caller's partition, newest completed first.
    pub async fn history(
        &self,
        credential: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Intent>, EngineError> {
        let owner = self.resolver.resolve_owner(credential).await?;
        Ok(self.intents.list_terminal(owner.as_ref(), limit).await?)
    }

    /// Remove terminal intents by id. Pending ids in the batch are ignored.
    pub async fn delete_history(&self, ids: &[IntentId]) -> Result<u64, EngineError> {
        self.lifecycle.delete_history(ids).await
    }
}
