use sqlx::Row;

use askbridge_core::domain::relay::RelayProfile;

use super::{RelayConfigRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRelayConfigRepository {
    pool: DbPool,
}

impl SqlRelayConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<RelayProfile, RepositoryError> {
    let app_id: String =
        row.try_get("app_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let app_secret: String =
        row.try_get("app_secret").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i64 =
        row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(RelayProfile::new(app_id, app_secret, version))
}

#[async_trait::async_trait]
impl RelayConfigRepository for SqlRelayConfigRepository {
    async fn load(&self) -> Result<Option<RelayProfile>, RepositoryError> {
        let row = sqlx::query("SELECT app_id, app_secret, version FROM relay_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, app_id: &str, app_secret: &str) -> Result<RelayProfile, RepositoryError> {
        sqlx::query(
            "INSERT INTO relay_config (id, app_id, app_secret, version)
             VALUES (1, ?, ?, 1)
             ON CONFLICT(id) DO UPDATE SET
                 app_id = excluded.app_id,
                 app_secret = excluded.app_secret,
                 version = version + 1",
        )
        .bind(app_id)
        .bind(app_secret)
        .execute(&self.pool)
        .await?;

        let saved = self.load().await?;
        saved.ok_or_else(|| {
            RepositoryError::Decode("relay_config row missing immediately after save".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::SqlRelayConfigRepository;
    use crate::repositories::RelayConfigRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn load_returns_none_before_first_save() {
        let pool = setup().await;
        let repo = SqlRelayConfigRepository::new(pool);

        let loaded = repo.load().await.expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn first_save_starts_the_version_at_one() {
        let pool = setup().await;
        let repo = SqlRelayConfigRepository::new(pool);

        let saved = repo.save("cli_a1b2", "secret-1").await.expect("save");

        assert_eq!(saved.app_id, "cli_a1b2");
        assert_eq!(saved.app_secret.expose_secret(), "secret-1");
        assert_eq!(saved.version, 1);
    }

    #[tokio::test]
    async fn every_save_bumps_the_version() {
        let pool = setup().await;
        let repo = SqlRelayConfigRepository::new(pool);

        repo.save("cli_a1b2", "secret-1").await.expect("first save");
        let second = repo.save("cli_a1b2", "secret-2").await.expect("second save");
        let third = repo.save("cli_zz99", "secret-2").await.expect("third save");

        assert_eq!(second.version, 2);
        assert_eq!(third.version, 3);
        assert_eq!(third.app_id, "cli_zz99");
    }
}
