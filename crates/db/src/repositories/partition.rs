use chrono::{DateTime, Utc};
use sqlx::Row;

use askbridge_core::domain::partition::{Partition, PartitionId};

use super::{PartitionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPartitionRepository {
    pool: DbPool,
}

impl SqlPartitionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_partition(row: &sqlx::sqlite::SqliteRow) -> Result<Partition, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let display_name: String =
        row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let avatar_url: Option<String> =
        row.try_get("avatar_url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let credential: String =
        row.try_get("credential").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notify_enabled: bool =
        row.try_get("notify_enabled").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let disabled: bool =
        row.try_get("disabled").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("updated_at: {e}")))?;

    Ok(Partition {
        id: PartitionId(id),
        display_name,
        avatar_url,
        credential,
        notify_enabled,
        disabled,
        created_at,
        updated_at,
    })
}

const PARTITION_COLUMNS: &str =
    "id, display_name, avatar_url, credential, notify_enabled, disabled, created_at, updated_at";

#[async_trait::async_trait]
impl PartitionRepository for SqlPartitionRepository {
    async fn upsert(&self, partition: &Partition) -> Result<(), RepositoryError> {
        // Re-verification of a known identity refreshes the profile only;
        // credential, flags, and created_at belong to the existing row.
        sqlx::query(
            "INSERT INTO partitions (id, display_name, avatar_url, credential, notify_enabled,
                                     disabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 avatar_url = COALESCE(excluded.avatar_url, avatar_url),
                 updated_at = excluded.updated_at",
        )
        .bind(&partition.id.0)
        .bind(&partition.display_name)
        .bind(&partition.avatar_url)
        .bind(&partition.credential)
        .bind(partition.notify_enabled)
        .bind(partition.disabled)
        .bind(partition.created_at.to_rfc3339())
        .bind(partition.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PartitionId) -> Result<Option<Partition>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PARTITION_COLUMNS} FROM partitions WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_partition(r)?)),
            None => Ok(None),
        }
    }

    async fn find_active_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Partition>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PARTITION_COLUMNS} FROM partitions WHERE credential = ? AND disabled = 0"
        ))
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_partition(r)?)),
            None => Ok(None),
        }
    }

    async fn rotate_credential(
        &self,
        id: &PartitionId,
        credential: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE partitions SET credential = ?, updated_at = ? WHERE id = ?")
                .bind(credential)
                .bind(updated_at.to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE partitions SET disabled = ?, updated_at = ? WHERE id = ?")
            .bind(!enabled)
            .bind(updated_at.to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_notify_enabled(
        &self,
        id: &PartitionId,
        enabled: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE partitions SET notify_enabled = ?, updated_at = ? WHERE id = ?")
                .bind(enabled)
                .bind(updated_at.to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        include_disabled: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Partition>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if include_disabled {
            sqlx::query(&format!(
                "SELECT {PARTITION_COLUMNS} FROM partitions
                 ORDER BY created_at DESC
                 LIMIT ? OFFSET ?"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {PARTITION_COLUMNS} FROM partitions
                 WHERE disabled = 0
                 ORDER BY created_at DESC
                 LIMIT ? OFFSET ?"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_partition).collect::<Result<Vec<_>, _>>()
    }
}
