use std::{fmt, time::Duration};

use etcdman_storage::VaultError;

/// Stable error categories shown to callers of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Unavailable,
    Timeout,
    Persistence,
    Decryption,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Persistence => "persistence_error",
            ErrorKind::Decryption => "decryption_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A central error enum for sessions and key-space operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("connection '{0}' is not connected")]
    NotConnected(String),

    #[error("{0}")]
    NotFound(String),

    /// A transaction guard did not hold; nothing was written.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("revision {0} has been compacted")]
    Compacted(i64),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProfileNotFound(_) | Error::NotConnected(_) | Error::NotFound(_) => {
                ErrorKind::NotFound
            }
            Error::Compacted(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Vault(e) => match e {
                VaultError::NotFound(_) => ErrorKind::NotFound,
                VaultError::Validation(_) | VaultError::InvalidKey(_) => ErrorKind::Validation,
                VaultError::Decryption { .. } => ErrorKind::Decryption,
                VaultError::Persistence { .. }
                | VaultError::Corrupt { .. }
                | VaultError::Encryption(_) => ErrorKind::Persistence,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
