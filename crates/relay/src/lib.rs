//! IM relay - supervised push-channel connection
//!
//! This crate maintains connectivity to the external instant-messaging
//! channel:
//! - **Transport** (`transport`) - port over the provider's long-lived push
//!   connection and message API
//! - **Listener** (`listener`) - event pump that turns inbound messages into
//!   reply ingestion
//! - **Supervisor** (`supervisor`) - owns the listener instance: idempotent
//!   start, fully-awaited stop, config-versioned restart, bounded
//!   auto-restart with exponential backoff
//!
//! # Architecture
//!
//! ```text
//! push channel → RelayTransport → RelayListener → ReplyIngest → lifecycle
//!                      ↑
//!               RelaySupervisor (state machine: Stopped → Starting →
//!                                Running → {Crashed, Stopped})
//! ```
//!
//! The listener never restarts itself; on any unexpected disconnect the run
//! ends and the supervisor decides whether to bring up a replacement
//! instance. At most one instance is ever active for overlapping
//! configurations.

pub mod listener;
pub mod supervisor;
pub mod transport;

pub use listener::{IngestError, IngestOutcome, NoopReplyIngest, RelayListener, ReplyIngest};
pub use supervisor::{
    NoopTransportFactory, RelayHandle, RelaySupervisor, RestartPolicy, TransportFactory,
};
pub use transport::{InboundMessage, NoopRelayTransport, RelayEvent, RelayTransport, TransportError};
