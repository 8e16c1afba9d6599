use std::{io, path::PathBuf};

/// Errors raised by the connection vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("connection '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// The durable write failed. In-memory state has already moved forward.
    #[error("failed to persist vault to {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("vault file {path:?} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decrypt password for connection {id}: {reason}")]
    Decryption { id: String, reason: String },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid vault key: {0}")]
    InvalidKey(String),
}

impl VaultError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VaultError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
