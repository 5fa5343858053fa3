//! Snapshot extraction
//!
//! Turns the metadata a [`MetadataProvider`] resolves for a model into an
//! immutable [`Snapshot`]. The provider is the only place that knows how model
//! metadata is obtained (source scan, derive registration, live database).

use crate::error::{Error, Result};
use crate::snapshot::types::{ColumnDef, Snapshot};

/// Snapshot-shaped metadata resolved for one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub class_name: String,
    pub table_name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDef>,
}

/// Source of model metadata
pub trait MetadataProvider {
    /// Resolve a model identifier, failing with [`Error::ModelNotFoundError`]
    fn resolve(&self, identifier: &str) -> Result<ModelMetadata>;
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for Box<P> {
    fn resolve(&self, identifier: &str) -> Result<ModelMetadata> {
        (**self).resolve(identifier)
    }
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for &P {
    fn resolve(&self, identifier: &str) -> Result<ModelMetadata> {
        (**self).resolve(identifier)
    }
}

/// Strip whitespace and a leading namespace separator from a model identifier
pub fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let trimmed = trimmed.strip_prefix("::").unwrap_or(trimmed);
    trimmed.strip_prefix('\\').unwrap_or(trimmed).to_string()
}

/// Produces snapshots from a metadata provider
pub struct SnapshotExtractor<'a> {
    provider: &'a dyn MetadataProvider,
}

impl<'a> SnapshotExtractor<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self { provider }
    }

    /// Extract a snapshot of the given model
    pub fn extract(&self, identifier: &str) -> Result<Snapshot> {
        let identifier = normalize_identifier(identifier);
        if identifier.is_empty() {
            return Err(Error::ModelNotFoundError("<empty identifier>".to_string()));
        }

        let metadata = self.provider.resolve(&identifier)?;
        let snapshot = Snapshot::new(&metadata.class_name, &metadata.table_name, metadata.columns)?;

        tracing::debug!(
            class_name = snapshot.class_name(),
            table_name = snapshot.table_name(),
            columns = snapshot.columns().len(),
            "Extracted model snapshot"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::ColumnType;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct FixedProvider {
        calls: Cell<usize>,
    }

    impl MetadataProvider for FixedProvider {
        fn resolve(&self, identifier: &str) -> Result<ModelMetadata> {
            self.calls.set(self.calls.get() + 1);
            if identifier != "App\\Models\\Student" {
                return Err(Error::ModelNotFoundError(identifier.to_string()));
            }
            Ok(ModelMetadata {
                class_name: identifier.to_string(),
                table_name: "students".to_string(),
                columns: vec![
                    ColumnDef::new("id", ColumnType::BigInteger),
                    ColumnDef::new("full_name", ColumnType::String),
                ],
            })
        }
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let provider = FixedProvider { calls: Cell::new(0) };
        let extractor = SnapshotExtractor::new(&provider);

        let first = extractor.extract("App\\Models\\Student").unwrap();
        let second = extractor.extract("\\App\\Models\\Student").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.columns(), second.columns());
        assert_eq!(provider.calls.get(), 2);
    }

    #[test]
    fn test_unknown_model() {
        let provider = FixedProvider { calls: Cell::new(0) };
        let extractor = SnapshotExtractor::new(&provider);

        let err = extractor.extract("App\\Models\\Ghost").unwrap_err();
        assert!(matches!(err, Error::ModelNotFoundError(name) if name == "App\\Models\\Ghost"));
    }

    #[test]
    fn test_empty_identifier_never_reaches_provider() {
        let provider = FixedProvider { calls: Cell::new(0) };
        let extractor = SnapshotExtractor::new(&provider);

        assert!(matches!(extractor.extract("  "), Err(Error::ModelNotFoundError(_))));
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" \\App\\Models\\Student "), "App\\Models\\Student");
        assert_eq!(normalize_identifier("::app::models::Student"), "app::models::Student");
    }
}
