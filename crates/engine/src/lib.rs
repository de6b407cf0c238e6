//! Intent routing and lifecycle engine.
//!
//! Ties the store, the resolver, and the relay together:
//! - `resolver` maps inbound credentials to partition keys
//! - `lifecycle` creates and resolves intents, runs the producer's bounded
//!   wait and the retention sweep
//! - `gateway` is the read/write surface for poll-driven consumers
//! - `ingest` bridges inbound relay replies into the lifecycle
//! - `notify` pushes outbound notifications through the relay supervisor

pub mod errors;
pub mod gateway;
pub mod ingest;
pub mod lifecycle;
pub mod notify;
pub mod resolver;

pub use errors::EngineError;
pub use gateway::{PendingIntent, PollingGateway};
pub use ingest::LifecycleReplyIngest;
pub use lifecycle::{
    IntentLifecycle, LifecycleSettings, NoopNotifier, Notifier, NotifyError, SubmitOutcome,
    SubmitRequest,
};
pub use notify::RelayNotifier;
pub use resolver::{PartitionKey, RoutingKeyResolver};
