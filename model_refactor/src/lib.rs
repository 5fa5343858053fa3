//! model_refactor: rename ORM models across a codebase and emit the matching migration
//!
//! A rename is a four-stage pipeline: snapshot the model before the rename,
//! snapshot it again afterwards, diff the two snapshots into a change-set, then
//! rewrite source references and build a reversible migration from that
//! change-set.

extern crate self as model_refactor;

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod refactor;
pub mod schema;
pub mod snapshot;
pub mod utils;

use std::path::PathBuf;

// Re-export main types for easier access
pub use config::Config;
pub use db::{DatabaseConnection, DatabaseMetadataProvider};
pub use error::{Error, Result};
pub use model_refactor_macros::Model;
pub use models::{Model, ModelRegistry};
pub use refactor::{CodeRefactorEngine, RefactorReport};
pub use schema::{Change, ChangeDetector, ChangeSet, Migration, MigrationBuilder, RenameHints};
pub use snapshot::{
    FileSnapshotStore, MemorySnapshotStore, MetadataProvider, Snapshot, SnapshotExtractor,
    SnapshotStore,
};

/// Parameters of one refactor run
#[derive(Debug, Clone, Default)]
pub struct RefactorRequest {
    /// Class name the stored snapshot was taken under
    pub old: String,
    /// Class name after the rename; the old name when the class kept its name
    pub new: Option<String>,
    pub dry_run: bool,
    pub hints: RenameHints,
    /// Source tree to rewrite; the configured code root when unset
    pub root: Option<PathBuf>,
}

impl RefactorRequest {
    pub fn new(old: &str) -> Self {
        Self {
            old: old.to_string(),
            ..Self::default()
        }
    }

    pub fn to(mut self, new: &str) -> Self {
        self.new = Some(new.to_string());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn hints(mut self, hints: RenameHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn new_identifier(&self) -> &str {
        self.new.as_deref().unwrap_or(&self.old)
    }
}

/// What a completed refactor changed
#[derive(Debug)]
pub struct RefactorSummary {
    pub changes: ChangeSet,
    pub report: RefactorReport,
    /// Built whenever a change touches the schema; persisting it is up to the caller
    pub migration: Option<Migration>,
}

#[derive(Debug)]
pub enum RefactorOutcome {
    /// The stored snapshot already matches the model
    NoChanges,
    Completed(RefactorSummary),
}

/// The main client for running model refactors
pub struct ModelRefactor<P, S> {
    config: Config,
    provider: P,
    store: S,
}

impl<P: MetadataProvider, S: SnapshotStore> ModelRefactor<P, S> {
    pub fn new(config: Config, provider: P, store: S) -> Self {
        Self {
            config,
            provider,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Capture the current structure of a model and store it
    pub fn snapshot(&self, model: &str) -> Result<Snapshot> {
        let snapshot = SnapshotExtractor::new(&self.provider).extract(model)?;
        self.store.save(snapshot.class_name(), &snapshot)?;
        Ok(snapshot)
    }

    /// Diff the stored snapshot of `old` against the current state of `new`
    pub fn plan(&self, old: &str, new: &str, hints: &RenameHints) -> Result<ChangeSet> {
        let current = SnapshotExtractor::new(&self.provider).extract(new)?;
        let previous = self.load_previous(old)?;

        let changes = ChangeDetector::detect_with_hints(&previous, &current, hints);
        tracing::info!(
            old = previous.class_name(),
            new = current.class_name(),
            changes = changes.len(),
            "Change detection finished"
        );

        Ok(changes)
    }

    /// Stored snapshot of `old`, also found when `old` is a short name the provider resolves
    fn load_previous(&self, old: &str) -> Result<Snapshot> {
        let key = snapshot::normalize_identifier(old);

        match self.store.load(&key) {
            Err(err @ Error::SnapshotNotFoundError { .. }) => match self.provider.resolve(&key) {
                Ok(metadata) if metadata.class_name != key => self.store.load(&metadata.class_name),
                _ => Err(err),
            },
            other => other,
        }
    }

    /// Run the whole pipeline: detect, rewrite sources, build the migration
    pub fn refactor(&self, request: &RefactorRequest) -> Result<RefactorOutcome> {
        let changes = self.plan(&request.old, request.new_identifier(), &request.hints)?;
        if changes.is_empty() {
            tracing::info!(model = %request.old, "No changes detected");
            return Ok(RefactorOutcome::NoChanges);
        }

        let root = request
            .root
            .clone()
            .unwrap_or_else(|| self.config.paths.code_root.clone());
        let report = CodeRefactorEngine::new(&self.config.refactor)
            .protect([
                self.config.snapshot_directory(),
                self.config.migrations_directory(),
            ])
            .apply(&changes, &root, request.dry_run)?;

        let migration = MigrationBuilder::new(&self.config.migrations).build(&changes);

        tracing::info!(
            modified_files = report.modified_files.len(),
            replacements = report.total_replacements(),
            migration = migration.as_ref().map(|m| m.name.as_str()).unwrap_or("none"),
            dry_run = request.dry_run,
            "Refactor finished"
        );

        Ok(RefactorOutcome::Completed(RefactorSummary {
            changes,
            report,
            migration,
        }))
    }
}
