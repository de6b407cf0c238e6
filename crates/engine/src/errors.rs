use thiserror::Error;

use askbridge_db::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The intent is missing or already terminal. This is also what the
    /// losing side of a racing transition observes - a lost compare-and-swap
    /// is indistinguishable from a resolved intent.
    #[error("intent not found or already resolved")]
    NotFound,
    /// Invalid or disabled credential; nothing was changed.
    #[error("invalid or disabled credential")]
    Auth,
    /// Persistent storage failed; propagated as a hard failure, never
    /// silently retried.
    #[error(transparent)]
    Store(#[from] RepositoryError),
}
