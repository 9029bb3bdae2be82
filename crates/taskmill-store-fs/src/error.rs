//! Error types for filesystem store operations.

use thiserror::Error;

/// Errors that can occur during `FsStore` operations.
#[derive(Error, Debug)]
pub enum FsStoreError {
    /// The vault root does not exist or is not a directory.
    #[error("Vault root is not a directory: {0}")]
    InvalidRoot(String),

    /// A note path escaped the vault root or was otherwise malformed.
    #[error("Invalid note path: {0}")]
    InvalidPath(String),

    /// The note does not exist in the vault.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// Directory walking failed.
    #[error("Vault walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other unclassified error.
    #[error("Other error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for FsStoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
