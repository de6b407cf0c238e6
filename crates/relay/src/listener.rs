use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::transport::{InboundMessage, RelayEvent, RelayTransport, TransportError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("reply ingest failed: {0}")]
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The reply resolved an intent.
    Completed { intent_id: String },
    /// The sender has no pending intent; the reply is dropped.
    Unmatched,
}

/// Port bridging inbound relay replies into the lifecycle engine. The sender
/// is the external identity reported by the channel, not an API credential.
#[async_trait]
pub trait ReplyIngest: Send + Sync {
    async fn ingest_reply(
        &self,
        sender_id: &str,
        reply_text: &str,
    ) -> Result<IngestOutcome, IngestError>;
}

#[derive(Default)]
pub struct NoopReplyIngest;

#[async_trait]
impl ReplyIngest for NoopReplyIngest {
    async fn ingest_reply(
        &self,
        _sender_id: &str,
        _reply_text: &str,
    ) -> Result<IngestOutcome, IngestError> {
        Ok(IngestOutcome::Unmatched)
    }
}

/// Why a pump loop ended without a transport error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpEnd {
    /// The supervisor asked the listener to stop.
    ShutdownRequested,
    /// The provider closed the event stream; the supervisor treats this as a
    /// crash because nobody asked for it.
    StreamClosed,
}

/// Event pump over an already-connected transport.
///
/// A single bad message or failed ingest never ends the pump; only shutdown,
/// stream close, or a transport failure does. The listener holds no restart
/// logic - that belongs to the supervisor.
pub struct RelayListener {
    transport: Arc<dyn RelayTransport>,
    ingest: Arc<dyn ReplyIngest>,
}

impl RelayListener {
    pub fn new(transport: Arc<dyn RelayTransport>, ingest: Arc<dyn ReplyIngest>) -> Self {
        Self { transport, ingest }
    }

    pub async fn pump(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PumpEnd, TransportError> {
        loop {
            // Biased toward the shutdown signal so a stop request wins over a
            // simultaneously ready event. `wait_for` also fires when the stop
            // was sent before this iteration subscribed.
            tokio::select! {
                biased;

                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                    if let Err(error) = self.transport.disconnect().await {
                        warn!(error = %error, "relay disconnect failed during shutdown");
                    }
                    return Ok(PumpEnd::ShutdownRequested);
                }
                event = self.transport.next_event() => {
                    let Some(event) = event? else {
                        info!("relay event stream closed by the provider");
                        return Ok(PumpEnd::StreamClosed);
                    };

                    match event {
                        RelayEvent::Message(message) => self.handle_message(&message).await,
                        RelayEvent::Unsupported { event_type } => {
                            debug!(event_type = %event_type, "ignoring unsupported relay event");
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: &InboundMessage) {
        let reply_text = extract_reply_text(message);

        match self.ingest.ingest_reply(&message.sender_id, &reply_text).await {
            Ok(IngestOutcome::Completed { intent_id }) => {
                info!(
                    sender_id = %message.sender_id,
                    intent_id = %intent_id,
                    "relay reply resolved an intent"
                );
            }
            Ok(IngestOutcome::Unmatched) => {
                warn!(
                    sender_id = %message.sender_id,
                    "no pending intent for relay sender; reply dropped"
                );
            }
            Err(error) => {
                warn!(
                    sender_id = %message.sender_id,
                    error = %error,
                    "reply ingest failed; continuing relay loop"
                );
            }
        }
    }
}

/// Pull the human-readable reply out of a wire message. Text payloads arrive
/// as `{"text": "..."}`; anything unparseable falls back to the raw content,
/// and non-text types collapse to a placeholder.
pub fn extract_reply_text(message: &InboundMessage) -> String {
    if message.message_type == "text" {
        serde_json::from_str::<serde_json::Value>(&message.content)
            .ok()
            .and_then(|value| value.get("text").and_then(|text| text.as_str()).map(str::to_owned))
            .unwrap_or_else(|| message.content.clone())
    } else {
        format!("[{} message]", message.message_type)
    }
}
