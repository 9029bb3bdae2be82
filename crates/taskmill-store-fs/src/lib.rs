//! Filesystem-backed note storage for taskmill.
//!
//! A vault is a plain directory of Markdown files. The store enumerates
//! notes, serves raw content, and maintains a per-note structural index
//! cached by modification time.

pub mod error;
pub mod index;

pub use error::FsStoreError;
pub use index::index_note;

use ignore::WalkBuilder;
use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tracing::debug;

use taskmill_core::note::NoteMetadata;

const INDEX_CACHE_CAPACITY: usize = 512;

struct CachedIndex {
    modified: SystemTime,
    meta: Arc<NoteMetadata>,
}

/// Storage rooted at a vault directory.
pub struct FsStore {
    root: PathBuf,
    index_cache: Mutex<LruCache<String, CachedIndex>>,
}

impl FsStore {
    /// Open a store over the given vault root.
    ///
    /// # Errors
    /// Returns an error if the root does not exist or is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, FsStoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FsStoreError::InvalidRoot(root.display().to_string()));
        }
        let capacity = NonZeroUsize::new(INDEX_CACHE_CAPACITY)
            .ok_or_else(|| FsStoreError::Other("cache capacity must be non-zero".to_owned()))?;
        Ok(Self {
            root: root.to_path_buf(),
            index_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Vault root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate every Markdown note in the vault, as sorted
    /// vault-relative paths with `/` separators.
    ///
    /// # Errors
    /// Returns an error when the directory walk fails.
    pub fn list_notes(&self) -> Result<Vec<String>, FsStoreError> {
        let mut paths = Vec::new();
        for entry in WalkBuilder::new(&self.root).hidden(true).build() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let components: Vec<String> = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect();
            paths.push(components.join("/"));
        }
        paths.sort();
        Ok(paths)
    }

    /// Read the raw content of a note.
    ///
    /// # Errors
    /// Returns an error when the path is malformed or the note is missing.
    pub fn read_note(&self, path: &str) -> Result<String, FsStoreError> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(FsStoreError::NoteNotFound(path.to_owned()));
        }
        Ok(fs::read_to_string(full)?)
    }

    /// Fetch the cached structural index of a note, rebuilding it when the
    /// file changed since the last index.
    ///
    /// # Errors
    /// Returns an error when the path is malformed or the note is missing.
    pub fn metadata(&self, path: &str) -> Result<Arc<NoteMetadata>, FsStoreError> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(FsStoreError::NoteNotFound(path.to_owned()));
        }
        let modified = fs::metadata(&full)?.modified()?;

        {
            let mut cache = self
                .index_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(path) {
                if cached.modified == modified {
                    debug!(note = path, "structural index cache hit");
                    return Ok(Arc::clone(&cached.meta));
                }
            }
        }

        debug!(note = path, "indexing note");
        let content = fs::read_to_string(&full)?;
        let meta = Arc::new(index_note(path, &content));
        let mut cache = self
            .index_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache.put(
            path.to_owned(),
            CachedIndex {
                modified,
                meta: Arc::clone(&meta),
            },
        );
        Ok(meta)
    }

    /// Resolve a vault-relative path, rejecting anything that would escape
    /// the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, FsStoreError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || path.is_empty() {
            return Err(FsStoreError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}
