//! In-flight resolution bookkeeping.
//!
//! The registry is an explicit context object owned by the adapter and
//! handed to every cache entry; it holds only work that is currently
//! resolving, never completed work. Claims are released through drop
//! guards so every exit path, including failure, cleans up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use taskmill_core::ItemKey;

use crate::cache::ItemEntry;

/// Map of in-flight note and item resolutions.
#[derive(Default)]
pub struct PendingRegistry {
    notes: Mutex<HashMap<String, Vec<u64>>>,
    items: Mutex<HashMap<ItemKey, Arc<ItemEntry>>>,
    next_claim: AtomicU64,
}

impl PendingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a note entry is currently resolving the given path.
    #[must_use]
    pub fn note_in_flight(&self, path: &str) -> bool {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .is_some_and(|claims| !claims.is_empty())
    }

    /// Register a note resolution, unless one is already in flight.
    ///
    /// Returns `None` when the path is already being scanned, which tells
    /// the adapter to skip scheduling a second entry for it.
    pub(crate) fn claim_note(registry: &Arc<Self>, path: &str) -> Option<NoteClaim> {
        let mut notes = registry
            .notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if notes.get(path).is_some_and(|claims| !claims.is_empty()) {
            return None;
        }
        let id = registry.next_claim.fetch_add(1, Ordering::Relaxed);
        notes.entry(path.to_owned()).or_default().push(id);
        drop(notes);
        Some(NoteClaim {
            registry: Arc::clone(registry),
            path: path.to_owned(),
            id,
            released: AtomicBool::new(false),
        })
    }

    fn release_note(&self, path: &str, id: u64) {
        let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(claims) = notes.get_mut(path) {
            claims.retain(|&claim| claim != id);
            if claims.is_empty() {
                notes.remove(path);
            }
        }
        drop(notes);
        debug!(note = path, "note resolution released");
    }

    /// The entry currently resolving the given identity, if any.
    pub(crate) fn in_flight_item(&self, key: &ItemKey) -> Option<Arc<ItemEntry>> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Register an item resolution, replacing any previous entry for the
    /// same identity (a resolved leftover is simply superseded).
    pub(crate) fn claim_item<'a>(&'a self, entry: &'a Arc<ItemEntry>) -> ItemClaim<'a> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.key().clone(), Arc::clone(entry));
        ItemClaim {
            registry: self,
            entry,
        }
    }

    fn release_item(&self, entry: &Arc<ItemEntry>) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if items
            .get(entry.key())
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            items.remove(entry.key());
        }
    }

    /// Number of item resolutions currently in flight.
    #[must_use]
    pub fn pending_items(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Scoped registration of one note resolution.
///
/// The claim is released explicitly once every item resolution has been
/// initiated, or implicitly on drop when resolution fails before that
/// point.
pub(crate) struct NoteClaim {
    registry: Arc<PendingRegistry>,
    path: String,
    id: u64,
    released: AtomicBool,
}

impl NoteClaim {
    /// Release the claim. Idempotent.
    pub(crate) fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.registry.release_note(&self.path, self.id);
        }
    }
}

impl Drop for NoteClaim {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scoped registration of one item resolution; releases on drop, but only
/// while the registry still points at this entry.
pub(crate) struct ItemClaim<'a> {
    registry: &'a PendingRegistry,
    entry: &'a Arc<ItemEntry>,
}

impl Drop for ItemClaim<'_> {
    fn drop(&mut self) {
        self.registry.release_item(self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_claims_block_duplicates_until_released() {
        let registry = Arc::new(PendingRegistry::new());
        let claim = PendingRegistry::claim_note(&registry, "a.md").expect("first claim succeeds");
        assert!(registry.note_in_flight("a.md"));
        assert!(PendingRegistry::claim_note(&registry, "a.md").is_none());
        assert!(PendingRegistry::claim_note(&registry, "b.md").is_some());

        claim.release();
        assert!(!registry.note_in_flight("a.md"));
        assert!(PendingRegistry::claim_note(&registry, "a.md").is_some());
    }

    #[test]
    fn note_claim_releases_on_drop_and_is_idempotent() {
        let registry = Arc::new(PendingRegistry::new());
        {
            let claim = PendingRegistry::claim_note(&registry, "a.md").expect("claim succeeds");
            claim.release();
            claim.release();
            // Drop after explicit release must not disturb a newer claim.
            let _newer = PendingRegistry::claim_note(&registry, "a.md").expect("reclaim succeeds");
            drop(claim);
            assert!(registry.note_in_flight("a.md"));
        }
        assert!(!registry.note_in_flight("a.md"));
    }
}
