pub mod config;
pub mod domain;
pub mod errors;

pub use domain::intent::{Intent, IntentId, IntentStatus};
pub use domain::partition::{generate_credential, Partition, PartitionId};
pub use domain::relay::{RelayConnectionState, RelayProfile, RelayStatus};
pub use errors::DomainError;
