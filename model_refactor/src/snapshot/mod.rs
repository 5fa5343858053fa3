//! Snapshot module for model_refactor
//!
//! This module handles structural snapshots of models: their value types,
//! extraction from a metadata provider and persistence.

pub mod extractor;
pub mod store;
pub mod types;

// Re-export key types
pub use extractor::{normalize_identifier, MetadataProvider, ModelMetadata, SnapshotExtractor};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use types::{ColumnDef, ColumnType, Snapshot};
