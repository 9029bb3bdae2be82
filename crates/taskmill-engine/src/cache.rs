//! Per-note and per-item cache entries.
//!
//! An [`ItemEntry`] owns exactly one memoized resolution of one list item;
//! a [`NoteEntry`] owns the item entries of one note and produces the
//! note's contribution to the task table. Both register in the
//! [`PendingRegistry`](crate::registry::PendingRegistry) while resolving so
//! concurrent refreshes never parse the same work twice.

use anyhow::{Result, bail};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use taskmill_core::note::{ListItemMeta, NoteMetadata};
use taskmill_core::{ItemKey, LineContext, TaskRecord, parse_line};

use crate::registry::{NoteClaim, PendingRegistry};
use crate::source::{self, NoteStore};
use crate::transform::TransformConfig;

/// One list item and its memoized resolution.
pub struct ItemEntry {
    key: ItemKey,
    path: String,
    item: ListItemMeta,
    raw: Option<String>,
    meta: Arc<NoteMetadata>,
    cell: OnceCell<Option<TaskRecord>>,
}

impl ItemEntry {
    pub(crate) fn new(
        key: ItemKey,
        path: String,
        item: ListItemMeta,
        raw: Option<String>,
        meta: Arc<NoteMetadata>,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            path,
            item,
            raw,
            meta,
            cell: OnceCell::new(),
        })
    }

    /// Identity of the item this entry resolves.
    #[must_use]
    pub fn key(&self) -> &ItemKey {
        &self.key
    }

    /// Whether this entry's resolution has completed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }

    /// Resolve this item to a record, or `None` for non-task lines and
    /// failed items.
    ///
    /// When another entry is already resolving the same identity, this
    /// entry awaits that resolution instead of parsing again; an already
    /// resolved leftover is ignored and this entry proceeds independently.
    pub(crate) async fn resolve(
        self: Arc<Self>,
        registry: &PendingRegistry,
    ) -> Option<TaskRecord> {
        if let Some(existing) = registry.in_flight_item(&self.key) {
            if !Arc::ptr_eq(&existing, &self) && !existing.is_resolved() {
                debug!(item = %self.key, "awaiting in-flight resolution");
                return existing.parse_once().await;
            }
        }
        let claim = registry.claim_item(&self);
        let record = self.parse_once().await;
        drop(claim);
        record
    }

    /// Run the memoized parse. Concurrent callers share one execution.
    async fn parse_once(&self) -> Option<TaskRecord> {
        self.cell
            .get_or_init(|| async {
                match self.parse() {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(item = %self.key, error = %err, "item resolution failed");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Parse the raw line with its pre-resolved structural context.
    fn parse(&self) -> Result<Option<TaskRecord>> {
        let Some(span) = self.item.span else {
            bail!("list item has no source span");
        };
        let Some(raw) = self.raw.as_deref() else {
            bail!("line {} lies outside the note content", span.line);
        };
        let tags = self.meta.tags_in(span);
        let links = self.meta.links_in(span);
        let ctx = LineContext {
            path: &self.path,
            span: self.item.span,
            parent: self.item.parent,
            section: self.meta.heading_for(span.line),
            front_matter: &self.meta.front_matter,
            tags: &tags,
            links: &links,
        };
        Ok(parse_line(raw, &ctx))
    }
}

/// One note and its lazily derived item entries.
pub struct NoteEntry {
    path: String,
    registry: Arc<PendingRegistry>,
    transforms: Arc<TransformConfig>,
    items: OnceCell<Vec<Arc<ItemEntry>>>,
}

impl NoteEntry {
    pub(crate) fn new(
        path: String,
        registry: Arc<PendingRegistry>,
        transforms: Arc<TransformConfig>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path,
            registry,
            transforms,
            items: OnceCell::new(),
        })
    }

    /// Path of the note this entry resolves.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve the note's contribution to the task table.
    ///
    /// Item resolutions are initiated in structural order and joined in
    /// completion order; the claim is released as soon as every item has
    /// been initiated. Records then run through the modifier and filter
    /// chains in configured order.
    ///
    /// # Errors
    /// Returns an error when the note cannot be loaded or its items cannot
    /// be derived; the claim is released on that path too.
    pub(crate) async fn resolve<S>(
        self: Arc<Self>,
        store: Arc<S>,
        claim: NoteClaim,
    ) -> Result<Vec<TaskRecord>>
    where
        S: NoteStore + 'static,
    {
        let entries = self.entries(&store).await?.to_vec();
        if entries.is_empty() {
            claim.release();
            debug!(note = %self.path, "note has no list items");
            return Ok(Vec::new());
        }

        let mut set = JoinSet::new();
        for (idx, entry) in entries.iter().enumerate() {
            let entry = Arc::clone(entry);
            let registry = Arc::clone(&self.registry);
            set.spawn(async move { (idx, entry.resolve(&registry).await) });
        }
        // Every item resolution has been initiated; a new scan of this
        // note may now be scheduled and will deduplicate per item.
        claim.release();

        let mut resolved: Vec<Option<TaskRecord>> = vec![None; entries.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, record)) => {
                    if let Some(slot) = resolved.get_mut(idx) {
                        *slot = record;
                    }
                }
                Err(err) => {
                    warn!(note = %self.path, error = %err, "item resolution task failed");
                }
            }
        }

        let mut records = Vec::new();
        for record in resolved.into_iter().flatten() {
            if let Some(record) = self.transforms.run(record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Derive the item entries once, reusing in-flight entries for the
    /// same identity from the registry.
    async fn entries<S>(&self, store: &Arc<S>) -> Result<&[Arc<ItemEntry>]>
    where
        S: NoteStore + 'static,
    {
        self.items
            .get_or_try_init(|| async {
                let (meta, content) = source::load_note(store, &self.path).await?;
                let lines: Vec<&str> = content.lines().collect();
                let mut entries = Vec::with_capacity(meta.items.len());
                for item in &meta.items {
                    let key = ItemKey::for_item(&self.path, item);
                    let entry = match self.registry.in_flight_item(&key) {
                        Some(existing) if !existing.is_resolved() => existing,
                        _ => {
                            let raw = item
                                .span
                                .and_then(|span| usize::try_from(span.line).ok())
                                .and_then(|line| lines.get(line))
                                .map(|line| (*line).to_owned());
                            ItemEntry::new(key, self.path.clone(), *item, raw, Arc::clone(&meta))
                        }
                    };
                    entries.push(entry);
                }
                Ok::<_, anyhow::Error>(entries)
            })
            .await
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmill_core::note::Span;

    fn entry_for(raw: Option<&str>, span: Option<Span>) -> Arc<ItemEntry> {
        let item = ListItemMeta {
            span,
            parent: None,
            marker: Some(' '),
        };
        ItemEntry::new(
            ItemKey::for_item("a.md", &item),
            "a.md".into(),
            item,
            raw.map(str::to_owned),
            Arc::new(NoteMetadata::default()),
        )
    }

    #[tokio::test]
    async fn item_entry_parses_once_and_memoizes() {
        let registry = PendingRegistry::new();
        let entry = entry_for(Some("- [ ] buy milk"), Some(Span::single(0)));

        let first = Arc::clone(&entry).resolve(&registry).await;
        let second = Arc::clone(&entry).resolve(&registry).await;
        assert_eq!(first, second);
        assert_eq!(first.expect("record parsed").visual, "buy milk");
        assert!(entry.is_resolved());
        assert_eq!(registry.pending_items(), 0);
    }

    #[tokio::test]
    async fn concurrent_identity_awaits_the_in_flight_entry() {
        let registry = PendingRegistry::new();
        let first = entry_for(Some("- [ ] shared line"), Some(Span::single(0)));
        let second = entry_for(Some("- [ ] shared line"), Some(Span::single(0)));
        assert_eq!(first.key(), second.key());

        // Simulate the first entry mid-resolution: claimed but not parsed.
        let claim = registry.claim_item(&first);
        let record = Arc::clone(&second).resolve(&registry).await;

        // The second request drove the first entry's parse; its own cell
        // never ran, so exactly one parse happened.
        assert!(first.is_resolved());
        assert!(!second.is_resolved());
        assert_eq!(
            record.as_ref().map(|r| r.visual.as_str()),
            Some("shared line")
        );
        assert_eq!(record, Arc::clone(&first).resolve(&registry).await);
        drop(claim);
        assert_eq!(registry.pending_items(), 0);
    }

    #[tokio::test]
    async fn resolved_leftover_is_superseded_by_a_fresh_entry() {
        let registry = PendingRegistry::new();
        let stale = entry_for(Some("- [ ] old text"), Some(Span::single(0)));
        let record = Arc::clone(&stale).resolve(&registry).await;
        assert!(record.is_some());

        // Leave the stale, already resolved entry registered.
        let claim = registry.claim_item(&stale);
        let fresh = entry_for(Some("- [ ] new text"), Some(Span::single(0)));
        let record = Arc::clone(&fresh).resolve(&registry).await;
        assert!(fresh.is_resolved());
        assert_eq!(record.expect("fresh parse").visual, "new text");
        drop(claim);
    }

    #[tokio::test]
    async fn failing_item_degrades_to_no_task() {
        let registry = PendingRegistry::new();

        let spanless = entry_for(Some("- [ ] text"), None);
        assert_eq!(Arc::clone(&spanless).resolve(&registry).await, None);
        assert!(spanless.is_resolved());

        let missing_line = entry_for(None, Some(Span::single(9)));
        assert_eq!(Arc::clone(&missing_line).resolve(&registry).await, None);
        assert_eq!(registry.pending_items(), 0);
    }

    #[tokio::test]
    async fn non_task_lines_resolve_to_none() {
        let registry = PendingRegistry::new();
        let plain = entry_for(Some("- plain bullet"), Some(Span::single(0)));
        assert_eq!(Arc::clone(&plain).resolve(&registry).await, None);
    }
}
