//! Code refactor engine
//!
//! Walks a source tree and rewrites references to renamed classes, tables and
//! columns, or reports what it would rewrite in dry-run mode.

use glob::Pattern;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::RefactorConfig;
use crate::error::{Error, Result};
use crate::refactor::rules::{apply_replacements, rules_for, CompiledRules};
use crate::schema::change::ChangeSet;
use crate::utils::fs::write_atomic;

/// Directories skipped at any depth (dependency and VCS directories)
const ALWAYS_SKIP_DIRS: &[&str] = &["node_modules", "vendor", ".git", ".svn", ".hg", ".idea"];

/// Directories skipped only directly under the root (build output)
const ROOT_ONLY_SKIP_DIRS: &[&str] = &["target", "build", "dist", "cache", "tmp"];

/// Substitutions made in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEdit {
    pub path: PathBuf,
    pub replacements: usize,
}

/// Result of one refactor run
#[derive(Debug, Default)]
pub struct RefactorReport {
    /// Files that were (or, in dry-run mode, would be) modified, sorted
    pub modified_files: Vec<PathBuf>,
    pub edits: Vec<FileEdit>,
    /// Per-file failures; the run continues past them
    pub errors: Vec<Error>,
    pub files_scanned: usize,
    pub dry_run: bool,
}

impl RefactorReport {
    pub fn total_replacements(&self) -> usize {
        self.edits.iter().map(|edit| edit.replacements).sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum FileOutcome {
    Unchanged,
    Modified(FileEdit),
    Failed(Error),
}

/// Applies a change-set to a source tree
pub struct CodeRefactorEngine<'a> {
    config: &'a RefactorConfig,
    /// Directories never rewritten, whatever the exclude patterns say
    protected: Vec<PathBuf>,
}

impl<'a> CodeRefactorEngine<'a> {
    pub fn new(config: &'a RefactorConfig) -> Self {
        Self {
            config,
            protected: Vec::new(),
        }
    }

    /// Leave the given directories out of every scan (snapshot and migration artifacts)
    pub fn protect(mut self, directories: impl IntoIterator<Item = PathBuf>) -> Self {
        self.protected.extend(directories);
        self
    }

    /// Rewrite every file under `root` affected by `changes`
    ///
    /// Fails only when `root` cannot be scanned; per-file failures are
    /// collected in the report.
    pub fn apply(&self, changes: &ChangeSet, root: &Path, dry_run: bool) -> Result<RefactorReport> {
        if !root.is_dir() {
            return Err(Error::file_access(root, "not a directory"));
        }

        let rules = CompiledRules::compile(rules_for(changes, self.config.escaped_class_names))?;
        let mut report = RefactorReport {
            dry_run,
            ..RefactorReport::default()
        };

        if rules.is_empty() {
            tracing::debug!("No code-level changes, skipping source scan");
            return Ok(report);
        }

        for rule in rules.rules() {
            tracing::debug!(from = %rule.from, to = %rule.to, kind = ?rule.kind, "Rewrite rule");
        }

        let (files, walk_errors) = self.collect_files(root)?;
        report.files_scanned = files.len();
        for err in walk_errors {
            tracing::warn!(error = %err, "Cannot read directory entry");
            report.errors.push(err);
        }
        tracing::info!(
            root = %root.display(),
            files = files.len(),
            dry_run,
            "Scanning source files"
        );

        let outcomes: Vec<FileOutcome> = if self.config.parallel {
            files
                .par_iter()
                .map(|path| Self::process_file(path, &rules, dry_run))
                .collect()
        } else {
            files
                .iter()
                .map(|path| Self::process_file(path, &rules, dry_run))
                .collect()
        };

        // Outcomes keep the sorted order of `files`
        for outcome in outcomes {
            match outcome {
                FileOutcome::Unchanged => {}
                FileOutcome::Modified(edit) => {
                    report.modified_files.push(edit.path.clone());
                    report.edits.push(edit);
                }
                FileOutcome::Failed(err) => {
                    tracing::warn!(error = %err, "Skipping file");
                    report.errors.push(err);
                }
            }
        }

        tracing::info!(
            modified = report.modified_files.len(),
            replacements = report.total_replacements(),
            errors = report.errors.len(),
            dry_run,
            "Refactor finished"
        );

        Ok(report)
    }

    fn process_file(path: &Path, rules: &CompiledRules, dry_run: bool) -> FileOutcome {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => return FileOutcome::Failed(Error::file_access(path, err)),
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return FileOutcome::Failed(Error::file_access(path, "not valid UTF-8")),
        };

        let replacements = rules.find_replacements(&content);
        if replacements.is_empty() {
            return FileOutcome::Unchanged;
        }

        if !dry_run {
            let updated = apply_replacements(&content, &replacements);
            if let Err(err) = write_atomic(path, &updated) {
                return FileOutcome::Failed(err);
            }
        }

        tracing::debug!(path = %path.display(), replacements = replacements.len(), "Rewrote file");
        FileOutcome::Modified(FileEdit {
            path: path.to_path_buf(),
            replacements: replacements.len(),
        })
    }

    /// Protected directories expressed as paths inside the walk of `root`
    fn protected_in(&self, root: &Path) -> Vec<PathBuf> {
        let canonical_root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        self.protected
            .iter()
            .filter_map(|dir| {
                let canonical = fs::canonicalize(dir).ok()?;
                let relative = canonical.strip_prefix(&canonical_root).ok()?;
                Some(root.join(relative))
            })
            .collect()
    }

    /// Source files under `root`, sorted by path, and the entries that could not be read
    fn collect_files(&self, root: &Path) -> Result<(Vec<PathBuf>, Vec<Error>)> {
        let excludes = self
            .config
            .exclude
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| {
                    Error::ConfigError(format!("Invalid exclude pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let protected = self.protected_in(root);
        for dir in &protected {
            tracing::debug!(path = %dir.display(), "Protected directory");
        }

        let mut errors = Vec::new();
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !is_skipped_dir(entry)
                    && !(entry.file_type().is_dir()
                        && protected.iter().any(|dir| dir == entry.path()))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    errors.push(Error::file_access(path, err));
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.has_source_extension(path))
            .filter(|path| {
                let relative = path.strip_prefix(root).unwrap_or(path);
                !excludes.iter().any(|pattern| pattern.matches_path(relative))
            })
            .collect();

        files.sort();
        Ok((files, errors))
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.config.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy().to_string();
    ALWAYS_SKIP_DIRS.contains(&name.as_str())
        || (entry.depth() == 1 && ROOT_ONLY_SKIP_DIRS.contains(&name.as_str()))
}
