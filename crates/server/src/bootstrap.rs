use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use askbridge_core::config::{AppConfig, ConfigError, LoadOptions};
use askbridge_db::repositories::{
    IntentRepository, PartitionRepository, RelayConfigRepository, RepositoryError,
    SqlIntentRepository, SqlPartitionRepository, SqlRelayConfigRepository,
};
use askbridge_db::{connect_with_settings, migrations, DbPool};
use askbridge_engine::{
    IntentLifecycle, LifecycleReplyIngest, LifecycleSettings, PollingGateway, RelayNotifier,
    RoutingKeyResolver,
};
use askbridge_relay::{
    NoopTransportFactory, RelayHandle, RelaySupervisor, RestartPolicy, TransportFactory,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub lifecycle: Arc<IntentLifecycle>,
    pub gateway: Arc<PollingGateway>,
    pub supervisor: Arc<RelaySupervisor>,
    pub relay_config: Arc<dyn RelayConfigRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("store access failed during bootstrap: {0}")]
    Store(#[from] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let intents: Arc<dyn IntentRepository> = Arc::new(SqlIntentRepository::new(db_pool.clone()));
    let partitions: Arc<dyn PartitionRepository> =
        Arc::new(SqlPartitionRepository::new(db_pool.clone()));
    let relay_config: Arc<dyn RelayConfigRepository> =
        Arc::new(SqlRelayConfigRepository::new(db_pool.clone()));

    // First start with configured relay credentials seeds the persisted
    // profile; after that the store (and its version counter) is
    // authoritative.
    if let (Some(app_id), Some(app_secret)) = (&config.relay.app_id, &config.relay.app_secret) {
        if relay_config.load().await?.is_none() {
            let profile = relay_config.save(app_id, app_secret.expose_secret()).await?;
            info!(
                event_name = "system.bootstrap.relay_profile_seeded",
                config_version = profile.version,
                "seeded relay credentials from configuration"
            );
        }
    }

    let relay_handle = RelayHandle::new();
    let lifecycle = Arc::new(IntentLifecycle::new(
        intents.clone(),
        partitions.clone(),
        Arc::new(RelayNotifier::new(relay_handle.clone())),
        LifecycleSettings::from_config(&config.engine),
    ));
    let ingest = Arc::new(LifecycleReplyIngest::new(
        partitions.clone(),
        intents.clone(),
        lifecycle.clone(),
    ));
    let restart_policy = RestartPolicy {
        max_retries: config.relay.restart_max_retries,
        base_delay_ms: config.relay.restart_base_delay_ms,
        max_delay_ms: config.relay.restart_max_delay_ms,
    };
    let supervisor = Arc::new(RelaySupervisor::with_handle(
        relay_handle,
        transport_factory(),
        ingest,
        restart_policy,
    ));
    let gateway = Arc::new(PollingGateway::new(
        RoutingKeyResolver::new(partitions.clone()),
        lifecycle.clone(),
        intents.clone(),
    ));

    Ok(Application { config, db_pool, lifecycle, gateway, supervisor, relay_config })
}

/// The concrete IM provider transport plugs in here. The default build wires
/// the noop transport so the rest of the system runs without provider
/// credentials; deployments supply a real implementation.
fn transport_factory() -> Arc<dyn TransportFactory> {
    Arc::new(NoopTransportFactory)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use askbridge_core::config::{ConfigOverrides, LoadOptions};
    use askbridge_engine::SubmitRequest;

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                answer_timeout_secs: Some(2),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_an_invalid_database_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://nope".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap must fail").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_create_poll_reply_history() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('intents', 'partitions', 'relay_config')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected foundation tables to be available after bootstrap");
        assert_eq!(table_count, 3, "bootstrap should expose the baseline tables");

        // Producer asks; a consumer replies through the gateway while the
        // producer's bounded wait is still open.
        let lifecycle = app.lifecycle.clone();
        let producer = tokio::spawn(async move {
            lifecycle
                .submit(SubmitRequest {
                    question: "Ship it?".to_string(),
                    image: None,
                    credential: None,
                })
                .await
        });

        let mut pending = Vec::new();
        for _ in 0..100 {
            pending = app.gateway.poll(None).await.expect("poll");
            if !pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pending.len(), 1, "the producer's question must become pollable");

        app.gateway.reply(&pending[0].intent_id, "yes", None).await.expect("reply");

        let outcome = producer.await.expect("join").expect("submit");
        assert!(!outcome.timed_out);
        assert_eq!(outcome.answer.as_deref(), Some("yes"));

        let history = app.gateway.history(None, 10).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "Ship it?");
        assert_eq!(history[0].answer.as_deref(), Some("yes"));

        app.db_pool.close().await;
    }
}
