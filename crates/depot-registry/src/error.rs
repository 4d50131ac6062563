use depot_types::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("image already exists: {0}")]
    AlreadyExists(String),

    #[error("image already has a pending operation: {0}")]
    AlreadyPending(String),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("permission denied: write access required")]
    PermissionDenied,

    #[error("image references {missing} absent object(s), first: {first}")]
    MissingObjects { missing: usize, first: Digest },

    #[error("store error: {0}")]
    Store(#[from] depot_store::StoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
