use std::time::Duration;

use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Open a SQLite pool with the session pragmas every connection needs.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| Box::pin(apply_session_pragmas(conn)));

    options.connect(database_url).await
}

/// WAL lets pollers keep reading while a transition commits; the busy
/// timeout queues contending writers instead of surfacing SQLITE_BUSY to
/// the caller.
async fn apply_session_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    const SESSION_PRAGMAS: [&str; 4] = [
        "PRAGMA journal_mode = WAL",
        "PRAGMA synchronous = NORMAL",
        "PRAGMA foreign_keys = ON",
        "PRAGMA busy_timeout = 5000",
    ];

    for pragma in SESSION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}
