use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use askbridge_db::DbPool;
use askbridge_relay::RelayHandle;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    relay: RelayHandle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: Vec<ComponentHealth>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, relay: RelayHandle) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, relay })
}

/// Readiness gates on the store only. The relay listener is reported for
/// observability but a stopped or crashed listener does not make the
/// poll/reply surface unavailable.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_component(&state.db_pool).await;
    let relay = relay_component(&state.relay).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        components: vec![database, relay],
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_component(pool: &DbPool) -> ComponentHealth {
    let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await;
    match probe {
        Ok(_) => ComponentHealth {
            component: "database",
            status: "ready".to_owned(),
            detail: "probe query succeeded".to_owned(),
        },
        Err(error) => ComponentHealth {
            component: "database",
            status: "degraded".to_owned(),
            detail: format!("probe query failed: {error}"),
        },
    }
}

async fn relay_component(relay: &RelayHandle) -> ComponentHealth {
    let status = relay.status().await;
    let detail = match (&status.last_error, status.config_version) {
        (Some(error), _) => error.clone(),
        (None, Some(version)) => format!("listener on config version {version}"),
        (None, None) => "listener never started".to_owned(),
    };

    ComponentHealth {
        component: "relay",
        status: status.state.as_str().to_owned(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use askbridge_db::connect_with_settings;
    use askbridge_relay::RelayHandle;

    use crate::health::{health, HealthState};

    async fn state_with_pool(close: bool) -> HealthState {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        if close {
            pool.close().await;
        }
        HealthState { db_pool: pool, relay: RelayHandle::new() }
    }

    #[tokio::test]
    async fn ready_when_the_store_is_reachable_even_with_the_relay_stopped() {
        let (status, Json(payload)) = health(State(state_with_pool(false).await)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");

        let relay = payload
            .components
            .iter()
            .find(|component| component.component == "relay")
            .expect("relay component reported");
        assert_eq!(relay.status, "stopped");
    }

    #[tokio::test]
    async fn degraded_when_the_store_is_unreachable() {
        let (status, Json(payload)) = health(State(state_with_pool(true).await)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");

        let database = payload
            .components
            .iter()
            .find(|component| component.component == "database")
            .expect("database component reported");
        assert_eq!(database.status, "degraded");
    }
}
