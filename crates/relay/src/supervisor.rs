use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use askbridge_core::domain::relay::{RelayConnectionState, RelayProfile, RelayStatus};

use crate::listener::{PumpEnd, RelayListener, ReplyIngest};
use crate::transport::{NoopRelayTransport, RelayTransport, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RestartPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Builds a fresh transport for each listener instance, so a restart never
/// reuses connection state from the instance it replaces.
pub trait TransportFactory: Send + Sync {
    fn build(&self, profile: &RelayProfile) -> Arc<dyn RelayTransport>;
}

#[derive(Default)]
pub struct NoopTransportFactory;

impl TransportFactory for NoopTransportFactory {
    fn build(&self, _profile: &RelayProfile) -> Arc<dyn RelayTransport> {
        Arc::new(NoopRelayTransport)
    }
}

/// Cheap cloneable view of the supervised relay: current status plus the
/// active instance's transport for outbound pushes. Handed to collaborators
/// that must not own the supervisor itself.
#[derive(Clone)]
pub struct RelayHandle {
    status: Arc<RwLock<RelayStatus>>,
    active_transport: Arc<RwLock<Option<Arc<dyn RelayTransport>>>>,
}

impl Default for RelayHandle {
    fn default() -> Self {
        Self {
            status: Arc::new(RwLock::new(RelayStatus::stopped())),
            active_transport: Arc::new(RwLock::new(None)),
        }
    }
}

impl RelayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self) -> RelayStatus {
        self.status.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.status.read().await.state == RelayConnectionState::Running
    }

    /// Outbound delivery through the active instance's transport. Fails when
    /// no instance is running.
    pub async fn push_message(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let state = self.status.read().await.state;
        if state != RelayConnectionState::Running {
            return Err(TransportError::Push(format!("relay is {}", state.as_str())));
        }

        let transport = self.active_transport.read().await.clone();
        match transport {
            Some(transport) => transport.push_message(recipient, text).await,
            None => Err(TransportError::Push("relay transport not available".to_owned())),
        }
    }

    async fn set_state(
        &self,
        state: RelayConnectionState,
        last_error: Option<String>,
        version: i64,
    ) {
        let mut status = self.status.write().await;
        status.state = state;
        status.last_error = last_error;
        status.config_version = Some(version);
    }

    async fn set_stopped(&self) {
        let mut status = self.status.write().await;
        status.state = RelayConnectionState::Stopped;
        status.last_error = None;
    }

    async fn set_active(&self, transport: Arc<dyn RelayTransport>) {
        *self.active_transport.write().await = Some(transport);
    }

    async fn clear_active(&self) {
        *self.active_transport.write().await = None;
    }
}

struct ListenerInstance {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the relay listener lifecycle.
///
/// At most one listener instance is active at any time: `start` is a no-op
/// while an instance is alive, and `restart` fully awaits the old instance's
/// shutdown before spawning the replacement, tagged with the new profile's
/// config version. A crashed instance is restarted with bounded exponential
/// backoff; when retries run out the status stays `Crashed` until an operator
/// restart.
pub struct RelaySupervisor {
    factory: Arc<dyn TransportFactory>,
    ingest: Arc<dyn ReplyIngest>,
    restart_policy: RestartPolicy,
    instance: Mutex<Option<ListenerInstance>>,
    handle: RelayHandle,
}

impl RelaySupervisor {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        ingest: Arc<dyn ReplyIngest>,
        restart_policy: RestartPolicy,
    ) -> Self {
        Self::with_handle(RelayHandle::new(), factory, ingest, restart_policy)
    }

    /// Build around an externally created handle, so outbound-push
    /// collaborators can be wired up before the supervisor exists.
    pub fn with_handle(
        handle: RelayHandle,
        factory: Arc<dyn TransportFactory>,
        ingest: Arc<dyn ReplyIngest>,
        restart_policy: RestartPolicy,
    ) -> Self {
        Self { factory, ingest, restart_policy, instance: Mutex::new(None), handle }
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Spawn a listener instance for the given profile. Idempotent: returns
    /// `false` without side effects while an instance is alive.
    pub async fn start(&self, profile: RelayProfile) -> bool {
        let mut instance = self.instance.lock().await;
        if let Some(existing) = instance.as_ref() {
            if !existing.handle.is_finished() {
                info!(
                    config_version = profile.version,
                    "relay listener already running; start ignored"
                );
                return false;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = SuperviseTask {
            factory: self.factory.clone(),
            ingest: self.ingest.clone(),
            policy: self.restart_policy.clone(),
            handle: self.handle.clone(),
            profile,
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(task.run());
        *instance = Some(ListenerInstance { shutdown_tx, handle });
        true
    }

    /// Stop the active instance and wait until its task has fully exited, so
    /// no background work survives the call.
    pub async fn stop(&self) {
        let taken = self.instance.lock().await.take();
        if let Some(instance) = taken {
            let _ = instance.shutdown_tx.send(true);
            if let Err(error) = instance.handle.await {
                warn!(error = %error, "relay supervise task ended abnormally during stop");
            }
        }

        self.handle.set_stopped().await;
    }

    /// Replace the active instance with one tagged by the new profile's
    /// config version. The old instance is fully shut down first.
    pub async fn restart(&self, profile: RelayProfile) -> bool {
        info!(config_version = profile.version, "restarting relay listener");
        self.stop().await;
        self.start(profile).await
    }

    pub async fn status(&self) -> RelayStatus {
        self.handle.status().await
    }

    pub async fn is_running(&self) -> bool {
        self.handle.is_running().await
    }

    pub async fn push_message(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        self.handle.push_message(recipient, text).await
    }
}

struct SuperviseTask {
    factory: Arc<dyn TransportFactory>,
    ingest: Arc<dyn ReplyIngest>,
    policy: RestartPolicy,
    handle: RelayHandle,
    profile: RelayProfile,
    shutdown: watch::Receiver<bool>,
}

impl SuperviseTask {
    async fn run(mut self) {
        let version = self.profile.version;
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown.borrow() {
                self.handle.set_stopped().await;
                return;
            }

            self.handle.set_state(RelayConnectionState::Starting, None, version).await;
            let transport = self.factory.build(&self.profile);
            self.handle.set_active(transport.clone()).await;

            match transport.connect().await {
                Ok(()) => {
                    info!(config_version = version, "relay listener connected");
                    self.handle.set_state(RelayConnectionState::Running, None, version).await;

                    let listener = RelayListener::new(transport.clone(), self.ingest.clone());
                    match listener.pump(self.shutdown.clone()).await {
                        Ok(PumpEnd::ShutdownRequested) => {
                            self.handle.clear_active().await;
                            self.handle.set_stopped().await;
                            return;
                        }
                        Ok(PumpEnd::StreamClosed) => {
                            self.record_crash("relay stream closed unexpectedly".to_owned(), version)
                                .await;
                        }
                        Err(error) => {
                            self.record_crash(error.to_string(), version).await;
                        }
                    }
                }
                Err(error) => {
                    self.record_crash(error.to_string(), version).await;
                }
            }
            self.handle.clear_active().await;

            if attempt >= self.policy.max_retries {
                warn!(
                    max_retries = self.policy.max_retries,
                    config_version = version,
                    "relay restart retries exhausted; listener stays crashed"
                );
                return;
            }

            let delay = self.policy.backoff(attempt);
            attempt += 1;
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "relay listener crashed; scheduling restart"
            );

            tokio::select! {
                biased;

                _ = async { let _ = self.shutdown.wait_for(|stop| *stop).await; } => {
                    self.handle.set_stopped().await;
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn record_crash(&self, error: String, version: i64) {
        warn!(error = %error, config_version = version, "relay listener crashed");
        self.handle.set_state(RelayConnectionState::Crashed, Some(error), version).await;
    }
}
