use thiserror::Error;

/// Typed storage failures. Repository functions return `anyhow::Result`; callers
/// that need to branch on a failure use `err.downcast_ref::<StoreError>()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage is not configured")]
    Unconfigured,
    #[error("sequence {0} not found")]
    SequenceNotFound(String),
    #[error("contact {0} not found")]
    ContactNotFound(String),
    #[error("unknown channel {0:?}")]
    InvalidChannel(String),
}
