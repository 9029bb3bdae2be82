//! Note storage abstraction consumed by the extraction pipeline.
//!
//! The trait is synchronous; the pipeline bridges it onto the blocking
//! thread pool so content retrieval stays a cooperative suspension point.

use anyhow::{Error, Result, anyhow};
use std::sync::Arc;

use taskmill_core::note::NoteMetadata;
use taskmill_store_fs::{FsStore, FsStoreError};

/// Read-only access to a collection of notes.
///
/// Implementations must be cheap to call repeatedly: `metadata` is expected
/// to serve a cached structural index, re-deriving it only when the note
/// changed.
pub trait NoteStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;

    /// Enumerate every note path in the collection.
    ///
    /// # Errors
    /// Returns a store-specific error when enumeration fails.
    fn list_notes(&self) -> Result<Vec<String>, Self::Error>;

    /// Fetch the structural metadata of a note.
    ///
    /// # Errors
    /// Returns a store-specific error when the note cannot be indexed.
    fn metadata(&self, path: &str) -> Result<Arc<NoteMetadata>, Self::Error>;

    /// Read the raw content of a note.
    ///
    /// # Errors
    /// Returns a store-specific error when the note cannot be read.
    fn read_note(&self, path: &str) -> Result<String, Self::Error>;
}

impl NoteStore for FsStore {
    type Error = FsStoreError;

    fn list_notes(&self) -> Result<Vec<String>, Self::Error> {
        Self::list_notes(self)
    }

    fn metadata(&self, path: &str) -> Result<Arc<NoteMetadata>, Self::Error> {
        Self::metadata(self, path)
    }

    fn read_note(&self, path: &str) -> Result<String, Self::Error> {
        Self::read_note(self, path)
    }
}

/// Enumerate notes on the blocking pool.
pub(crate) async fn list_notes_async<S>(store: &Arc<S>) -> Result<Vec<String>>
where
    S: NoteStore + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.list_notes().map_err(Into::into))
        .await
        .map_err(|err| anyhow!("note listing task failed: {err}"))?
}

/// Fetch a note's metadata on the blocking pool.
pub(crate) async fn load_metadata<S>(store: &Arc<S>, path: &str) -> Result<Arc<NoteMetadata>>
where
    S: NoteStore + 'static,
{
    let store = Arc::clone(store);
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || store.metadata(&path).map_err(Into::into))
        .await
        .map_err(|err| anyhow!("metadata task failed: {err}"))?
}

/// Fetch a note's metadata and raw content on the blocking pool.
pub(crate) async fn load_note<S>(
    store: &Arc<S>,
    path: &str,
) -> Result<(Arc<NoteMetadata>, String)>
where
    S: NoteStore + 'static,
{
    let store = Arc::clone(store);
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || {
        let meta = store.metadata(&path).map_err(Into::into)?;
        let content = store.read_note(&path).map_err(Into::into)?;
        Ok::<_, Error>((meta, content))
    })
    .await
    .map_err(|err| anyhow!("note load task failed: {err}"))?
}
