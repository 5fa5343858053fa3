//! Database module for model_refactor
//!
//! This module handles database connections and live schema introspection.

pub mod connection;
pub mod introspect;

// Re-export key types
pub use connection::DatabaseConnection;
pub use introspect::{DatabaseMetadataProvider, IntrospectedColumn, TableIntrospector};
