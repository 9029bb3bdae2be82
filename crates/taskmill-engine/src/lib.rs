//! Extraction pipeline for taskmill.
//!
//! This crate turns a note store into a live task table: the adapter scans
//! eligible notes, note/item cache entries resolve each list item at most
//! once per refresh, and the transform configuration enriches, filters and
//! orders the resulting records.

pub mod adapter;
pub mod cache;
pub mod options;
pub mod registry;
pub mod source;
pub mod transform;

// Re-exports for convenience
pub use adapter::{NoteFailure, RefreshBatch, RefreshQuery, TaskAdapter};
pub use cache::{ItemEntry, NoteEntry};
pub use options::{ExtractOptions, VaultConfig};
pub use registry::PendingRegistry;
pub use source::NoteStore;
pub use transform::{Comparator, SortField, SortSpec, SortSpecError, TransformConfig};
