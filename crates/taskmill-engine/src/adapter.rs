//! The orchestrator: scans the note collection, schedules note cache
//! entries, and maintains the identity-keyed task table.

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use taskmill_core::note::normalize_tag;
use taskmill_core::{ItemKey, TaskRecord};

use crate::cache::NoteEntry;
use crate::options::ExtractOptions;
use crate::registry::PendingRegistry;
use crate::source::{self, NoteStore};
use crate::transform::{TransformConfig, default_comparator};

/// Callback invoked for every newly parsed record.
pub type RecordHook = Box<dyn Fn(&TaskRecord) + Send + Sync>;
/// Callback invoked once per completed refresh with the full new batch.
pub type BatchHook = Box<dyn Fn(&[TaskRecord]) + Send + Sync>;

/// Filter parameters and options for one refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshQuery {
    /// Keep only notes under one of these path prefixes (empty keeps all).
    pub path_include: Vec<String>,
    /// Drop notes under any of these path prefixes.
    pub path_exclude: Vec<String>,
    /// Keep only notes whose own tags intersect this set (empty keeps all).
    pub tag_include: Vec<String>,
    /// Drop notes whose own tags intersect this set.
    pub tag_exclude: Vec<String>,
    /// Options steering the transform pipeline.
    pub options: ExtractOptions,
}

/// One note that failed to resolve during a refresh.
#[derive(Debug, Clone)]
pub struct NoteFailure {
    /// Path of the failing note.
    pub path: String,
    /// Human-readable failure description.
    pub message: String,
}

/// Result of one refresh: the freshly parsed records plus collected
/// per-note failures.
#[derive(Debug, Clone, Default)]
pub struct RefreshBatch {
    /// Records produced by this refresh.
    pub records: Vec<TaskRecord>,
    /// Notes that failed to resolve.
    pub failures: Vec<NoteFailure>,
}

struct AdapterState {
    table: HashMap<ItemKey, TaskRecord>,
    transforms: Option<(ExtractOptions, Arc<TransformConfig>)>,
}

/// Orchestrates extraction over a note store and owns the task table.
pub struct TaskAdapter<S> {
    store: Arc<S>,
    registry: Arc<PendingRegistry>,
    state: Mutex<AdapterState>,
    record_hook: Mutex<Option<RecordHook>>,
    batch_hook: Mutex<Option<BatchHook>>,
}

impl<S> TaskAdapter<S>
where
    S: NoteStore + 'static,
{
    /// Create an adapter over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry: Arc::new(PendingRegistry::new()),
            state: Mutex::new(AdapterState {
                table: HashMap::new(),
                transforms: None,
            }),
            record_hook: Mutex::new(None),
            batch_hook: Mutex::new(None),
        }
    }

    /// Install the per-record notification hook.
    pub fn set_record_hook(&self, hook: impl Fn(&TaskRecord) + Send + Sync + 'static) {
        *self
            .record_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Install the per-batch notification hook.
    pub fn set_batch_hook(&self, hook: impl Fn(&[TaskRecord]) + Send + Sync + 'static) {
        *self
            .batch_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Run one full scan-and-resolve cycle.
    ///
    /// Eligible notes resolve concurrently; per-note failures are
    /// collected, not propagated. The returned batch holds only the
    /// records produced by this call, while the accumulated table stays
    /// queryable through [`sorted_records`](Self::sorted_records).
    ///
    /// # Errors
    /// Returns an error when note enumeration itself fails; the task
    /// table is left untouched in that case.
    pub async fn refresh(&self, query: RefreshQuery) -> Result<RefreshBatch> {
        let transforms = self.transforms_for(&query.options);
        let paths = source::list_notes_async(&self.store).await?;

        let tag_include: BTreeSet<String> =
            query.tag_include.iter().filter_map(|t| normalize_tag(t)).collect();
        let tag_exclude: BTreeSet<String> =
            query.tag_exclude.iter().filter_map(|t| normalize_tag(t)).collect();
        let check_tags = !tag_include.is_empty() || !tag_exclude.is_empty();

        let mut batch = RefreshBatch::default();
        let mut set = JoinSet::new();
        for path in paths {
            if !path_included(&path, &query.path_include) || path_excluded(&path, &query.path_exclude)
            {
                continue;
            }
            if check_tags {
                match source::load_metadata(&self.store, &path).await {
                    Ok(meta) => {
                        let tags = meta.note_tags();
                        if !tag_include.is_empty() && tag_include.is_disjoint(&tags) {
                            continue;
                        }
                        if !tag_exclude.is_disjoint(&tags) {
                            continue;
                        }
                    }
                    Err(err) => {
                        warn!(note = %path, error = %err, "note metadata unavailable");
                        batch.failures.push(NoteFailure {
                            path,
                            message: format!("{err:#}"),
                        });
                        continue;
                    }
                }
            }
            let Some(claim) = PendingRegistry::claim_note(&self.registry, &path) else {
                debug!(note = %path, "note already in flight, skipping");
                continue;
            };
            let entry = NoteEntry::new(
                path.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&transforms),
            );
            let store = Arc::clone(&self.store);
            set.spawn(async move { (path, entry.resolve(store, claim).await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((path, Ok(records))) => {
                    debug!(note = %path, count = records.len(), "note resolved");
                    batch.records.extend(records);
                }
                Ok((path, Err(err))) => {
                    warn!(note = %path, error = format!("{err:#}").as_str(), "note resolution failed");
                    batch.failures.push(NoteFailure {
                        path,
                        message: format!("{err:#}"),
                    });
                }
                Err(err) => {
                    warn!(error = %err, "note resolution task aborted");
                    batch.failures.push(NoteFailure {
                        path: "<unknown>".to_owned(),
                        message: err.to_string(),
                    });
                }
            }
        }

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            for record in &batch.records {
                state.table.insert(record.key.clone(), record.clone());
            }
        }

        if let Some(hook) = self
            .record_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            for record in &batch.records {
                hook(record);
            }
        }
        if let Some(hook) = self
            .batch_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook(&batch.records);
        }

        Ok(batch)
    }

    /// The accumulated task table, sorted with the configured comparator.
    #[must_use]
    pub fn sorted_records(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let comparator = state
            .transforms
            .as_ref()
            .map_or_else(default_comparator, |(_, config)| config.comparator());
        let mut records: Vec<TaskRecord> = state.table.values().cloned().collect();
        drop(state);
        records.sort_by(|a, b| comparator(a, b));
        records
    }

    /// Look up one record by identity.
    #[must_use]
    pub fn record(&self, key: &ItemKey) -> Option<TaskRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .table
            .get(key)
            .cloned()
    }

    /// Paths of every note currently contributing tasks.
    #[must_use]
    pub fn note_paths(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let paths: BTreeSet<&str> = state.table.keys().map(|key| key.path.as_str()).collect();
        paths.into_iter().map(str::to_owned).collect()
    }

    /// Reuse the previous transform configuration when the options are
    /// unchanged, rebuild it otherwise.
    fn transforms_for(&self, options: &ExtractOptions) -> Arc<TransformConfig> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((previous, config)) = &state.transforms {
            if previous == options {
                return Arc::clone(config);
            }
        }
        let today = OffsetDateTime::now_utc().date();
        let config = Arc::new(TransformConfig::build(options, today));
        state.transforms = Some((options.clone(), Arc::clone(&config)));
        config
    }
}

/// Prefix-segment containment: every component of `prefix` must equal the
/// corresponding leading component of `path`.
fn path_is_under(path: &str, prefix: &str) -> bool {
    let mut path_parts = path.split('/');
    for part in prefix.split('/') {
        if part.is_empty() {
            continue;
        }
        if path_parts.next() != Some(part) {
            return false;
        }
    }
    true
}

fn path_included(path: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|prefix| path_is_under(path, prefix))
}

fn path_excluded(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path_is_under(path, prefix))
}
