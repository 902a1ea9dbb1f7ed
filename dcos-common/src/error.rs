use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid zip archive: {0}")]
    Archive(String),

    #[error("archive entry {0:?} points outside the plugin directory")]
    UnsafePath(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}
