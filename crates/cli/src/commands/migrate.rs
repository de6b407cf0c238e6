use askbridge_core::config::{AppConfig, LoadOptions};
use askbridge_db::{connect_with_settings, migrations};

use crate::commands::{block_on, CommandOutput};

pub fn run() -> CommandOutput {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandOutput::failed(2, format!("migrate: configuration issue: {error}"));
        }
    };

    let applied = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("could not open `{}`: {error}", config.database.url))?;

        let result = migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migration failed: {error}"));
        pool.close().await;
        result
    });

    match applied {
        Ok(Ok(())) => CommandOutput::ok(vec![format!(
            "migrate: schema is up to date at `{}`",
            config.database.url
        )]),
        Ok(Err(message)) | Err(message) => {
            CommandOutput::failed(3, format!("migrate: {message}"))
        }
    }
}
