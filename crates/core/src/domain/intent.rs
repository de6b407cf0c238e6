use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::partition::PartitionId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentId(pub String);

impl IntentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Short prefix used in log lines and relay notifications.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl std::fmt::Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Completed,
    Dismissed,
}

impl IntentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Dismissed => "dismissed",
        }
    }
}

/// A single question submitted by a producer, awaiting human resolution.
///
/// Status moves exactly once from `Pending` to a terminal state; a terminal
/// intent is immutable until the retention sweep evicts it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub question: String,
    pub image: Option<String>,
    pub status: IntentStatus,
    pub owner: Option<PartitionId>,
    pub answer: Option<String>,
    pub answer_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Intent {
    pub fn new(
        question: impl Into<String>,
        image: Option<String>,
        owner: Option<PartitionId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IntentId::generate(),
            question: question.into(),
            image,
            status: IntentStatus::Pending,
            owner,
            answer: None,
            answer_image: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn complete(
        &mut self,
        answer: impl Into<String>,
        answer_image: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidIntentTransition { from: self.status });
        }
        self.answer = Some(answer.into());
        self.answer_image = answer_image;
        self.status = IntentStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn dismiss(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidIntentTransition { from: self.status });
        }
        self.status = IntentStatus::Dismissed;
        self.completed_at = Some(at);
        Ok(())
    }
}
