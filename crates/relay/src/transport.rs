use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("relay failed to connect: {0}")]
    Connect(String),
    #[error("relay read failed: {0}")]
    Receive(String),
    #[error("relay push failed: {0}")]
    Push(String),
    #[error("relay disconnect failed: {0}")]
    Disconnect(String),
}

/// An inbound message from the push channel. `content` carries the provider's
/// wire payload; for text messages that is the JSON `{"text": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub message_type: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    Message(InboundMessage),
    Unsupported { event_type: String },
}

/// Port over the IM provider's long-lived connection.
///
/// `next_event` returning `None` means the provider closed the stream
/// cleanly; an `Err` is an unexpected transport failure. `push_message` is
/// the outbound side and does not require the event stream to be open.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_event(&self) -> Result<Option<RelayEvent>, TransportError>;
    async fn push_message(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopRelayTransport;

#[async_trait]
impl RelayTransport for NoopRelayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<RelayEvent>, TransportError> {
        Ok(None)
    }

    async fn push_message(&self, _recipient: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
