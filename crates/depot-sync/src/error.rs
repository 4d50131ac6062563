use depot_types::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("image not found upstream: {0}")]
    ImageNotFound(String),

    #[error("{} object(s) rejected by remote store", .0.len())]
    RejectedObjects(Vec<Digest>),

    #[error("protocol error: {0}")]
    Protocol(#[from] depot_protocol::ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] depot_registry::RegistryError),

    #[error("store error: {0}")]
    Store(#[from] depot_store::StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
