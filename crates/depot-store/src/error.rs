use depot_types::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt data: expected digest {expected}, computed {computed}")]
    CorruptData { expected: Digest, computed: Digest },

    #[error("object not found: {0}")]
    NotFound(Digest),

    #[error("objects reader exhausted: all requested objects already read")]
    ReaderExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
