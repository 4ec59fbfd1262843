use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(String),

    #[error("block already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
