pub mod intent;
pub mod partition;
pub mod relay;
