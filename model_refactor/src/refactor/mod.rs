//! Refactor module for model_refactor
//!
//! This module rewrites source code references to renamed models.

pub mod engine;
pub mod rules;

pub use engine::{CodeRefactorEngine, FileEdit, RefactorReport};
pub use rules::{RewriteRule, RuleKind};
