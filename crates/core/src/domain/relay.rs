use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Lifecycle of the IM relay listener connection.
///
/// `Stopped → Starting → Running → {Crashed, Stopped}`. The listener itself
/// never leaves `Crashed`; only the supervisor restarts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayConnectionState {
    Stopped,
    Starting,
    Running,
    Crashed,
}

impl RelayConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Crashed => "crashed",
        }
    }
}

/// Snapshot reported by the relay supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    pub state: RelayConnectionState,
    pub last_error: Option<String>,
    pub config_version: Option<i64>,
}

impl RelayStatus {
    pub fn stopped() -> Self {
        Self { state: RelayConnectionState::Stopped, last_error: None, config_version: None }
    }
}

/// Relay credentials plus the monotonically increasing version they were
/// persisted under.
///
/// The version is how the supervisor detects staleness: every saved change
/// bumps it, and a listener instance is tagged with the version it was
/// started with. There is no mutable global configuration.
#[derive(Clone, Debug)]
pub struct RelayProfile {
    pub app_id: String,
    pub app_secret: SecretString,
    pub version: i64,
}

impl RelayProfile {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>, version: i64) -> Self {
        let app_secret: String = app_secret.into();
        Self { app_id: app_id.into(), app_secret: app_secret.into(), version }
    }
}
