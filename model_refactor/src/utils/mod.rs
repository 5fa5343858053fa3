//! Utilities for model_refactor
//!
//! This module provides utility functions used across the library.

pub mod fs;
pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{
    apply_naming_convention, create_migration_name, get_column_name, get_table_name,
    snapshot_key,
};
