use chrono::{DateTime, Utc};
use sqlx::Row;

use askbridge_core::domain::intent::{Intent, IntentId, IntentStatus};
use askbridge_core::domain::partition::PartitionId;

use super::{IntentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlIntentRepository {
    pool: DbPool,
}

impl SqlIntentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> IntentStatus {
    match s {
        "completed" => IntentStatus::Completed,
        "dismissed" => IntentStatus::Dismissed,
        _ => IntentStatus::Pending,
    }
}

fn row_to_intent(row: &sqlx::sqlite::SqliteRow) -> Result<Intent, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let question: String =
        row.try_get("question").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let image: Option<String> =
        row.try_get("image").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let answer: Option<String> =
        row.try_get("answer").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let answer_image: Option<String> =
        row.try_get("answer_image").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let owner_id: Option<String> =
        row.try_get("owner_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completed_at_str: Option<String> =
        row.try_get("completed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;
    let completed_at = completed_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Intent {
        id: IntentId(id),
        question,
        image,
        status: parse_status(&status_str),
        owner: owner_id.map(PartitionId),
        answer,
        answer_image,
        created_at,
        completed_at,
    })
}

const INTENT_COLUMNS: &str = "id, question, image, answer, answer_image, status, owner_id, \
                              created_at, completed_at";

#[async_trait::async_trait]
impl IntentRepository for SqlIntentRepository {
    async fn create(&self, intent: &Intent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO intents (id, question, image, answer, answer_image, status, owner_id,
                                  created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&intent.id.0)
        .bind(&intent.question)
        .bind(&intent.image)
        .bind(&intent.answer)
        .bind(&intent.answer_image)
        .bind(intent.status.as_str())
        .bind(intent.owner.as_ref().map(|owner| owner.0.as_str()))
        .bind(intent.created_at.to_rfc3339())
        .bind(intent.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<Intent>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {INTENT_COLUMNS} FROM intents WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_intent(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(
        &self,
        owner: Option<&PartitionId>,
    ) -> Result<Vec<Intent>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(owner) = owner {
            sqlx::query(&format!(
                "SELECT {INTENT_COLUMNS} FROM intents
                 WHERE status = 'pending' AND owner_id = ?
                 ORDER BY created_at ASC"
            ))
            .bind(&owner.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {INTENT_COLUMNS} FROM intents
                 WHERE status = 'pending' AND owner_id IS NULL
                 ORDER BY created_at ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_intent).collect::<Result<Vec<_>, _>>()
    }

    async fn latest_pending_for_owner(
        &self,
        owner: &PartitionId,
    ) -> Result<Option<Intent>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM intents
             WHERE status = 'pending' AND owner_id = ?
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(&owner.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_intent(r)?)),
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        id: &IntentId,
        answer: &str,
        answer_image: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE intents
             SET answer = ?, answer_image = ?, status = 'completed', completed_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(answer)
        .bind(answer_image)
        .bind(completed_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn dismiss(
        &self,
        id: &IntentId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE intents
             SET status = 'dismissed', completed_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(completed_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_terminal(
        &self,
        owner: Option<&PartitionId>,
        limit: u32,
    ) -> Result<Vec<Intent>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(owner) = owner {
            sqlx::query(&format!(
                "SELECT {INTENT_COLUMNS} FROM intents
                 WHERE status IN ('completed', 'dismissed') AND owner_id = ?
                 ORDER BY completed_at DESC
                 LIMIT ?"
            ))
            .bind(&owner.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {INTENT_COLUMNS} FROM intents
                 WHERE status IN ('completed', 'dismissed') AND owner_id IS NULL
                 ORDER BY completed_at DESC
                 LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_intent).collect::<Result<Vec<_>, _>>()
    }

    async fn delete_terminal(&self, ids: &[IntentId]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM intents
             WHERE status IN ('completed', 'dismissed') AND id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn purge_terminal_older_than(
        &self,
        horizon: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM intents
             WHERE status IN ('completed', 'dismissed') AND completed_at < ?",
        )
        .bind(horizon.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
