use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("MakeDirectory update carries no directory payload")]
    MissingDirectory,

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
