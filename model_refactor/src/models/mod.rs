//! Models module for model_refactor
//!
//! This module handles model registration and discovery.

pub mod registry;

// Re-export key types
pub use registry::{FieldDefinition, Model, ModelDefinition, ModelRegistry};
