//! Schema module for model_refactor
//!
//! This module handles change detection between snapshots and migration generation.

pub mod change;
pub mod diff;
pub mod generator;
pub mod migration;

// Re-export key types
pub use change::{Change, ChangeSet, RenameHints};
pub use diff::ChangeDetector;
pub use generator::SqlGenerator;
pub use migration::{Direction, Migration, MigrationBuilder, MigrationOperation};
