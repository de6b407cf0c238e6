mod bootstrap;
mod health;
mod routes;

use anyhow::Result;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use askbridge_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use askbridge_core::config::LogFormat;

    let level = config.logging.level.parse().unwrap_or(tracing::Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(level);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    // Retention sweep runs for the life of the process; the only deleter of
    // intents.
    let sweep = app.lifecycle.clone().spawn_retention_sweep();

    match app.relay_config.load().await {
        Ok(Some(profile)) => {
            info!(
                event_name = "system.server.relay_starting",
                config_version = profile.version,
                "starting relay listener from persisted profile"
            );
            app.supervisor.start(profile).await;
        }
        Ok(None) => {
            info!(
                event_name = "system.server.relay_unconfigured",
                "relay credentials not configured; listener stays stopped"
            );
        }
        Err(error) => {
            warn!(
                event_name = "system.server.relay_profile_error",
                error = %error,
                "could not load the relay profile; listener stays stopped"
            );
        }
    }

    let state = routes::AppState {
        gateway: app.gateway.clone(),
        lifecycle: app.lifecycle.clone(),
        supervisor: app.supervisor.clone(),
        relay_config: app.relay_config.clone(),
        producer_api_key: app
            .config
            .engine
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_owned()),
    };
    let router = routes::router(state)
        .merge(health::router(app.db_pool.clone(), app.supervisor.handle()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        bind_address = %address,
        "askbridge-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    info!(event_name = "system.server.stopping", "askbridge-server stopping");
    app.supervisor.stop().await;
    sweep.abort();

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
