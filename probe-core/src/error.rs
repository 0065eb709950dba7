use thiserror::Error;

use crate::domain::HashKind;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("journal {} is locked by another process", .0.display())]
    Locked(std::path::PathBuf),

    #[error("no file record with id {0}")]
    RecordNotFound(u64),

    #[error("no artifact with id {0}")]
    ArtifactNotFound(u64),

    /// A write-through did not reach the store; the cached record was left as it was.
    #[error("persisting file {file_id} failed: {reason}")]
    Persistence { file_id: u64, reason: String },

    #[error("unsupported hash kind: {0}")]
    InvalidHashKind(String),

    #[error("unknown file status: {0}")]
    InvalidStatus(String),

    #[error("invalid {kind} digest: {reason}")]
    InvalidDigest { kind: HashKind, reason: String },

    #[error("unknown artifact type: {0}")]
    UnknownArtifactType(String),

    #[error("bad artifact filter: {0}")]
    Query(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ProbeError>;
