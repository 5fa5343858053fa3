//! Snapshot persistence
//!
//! Snapshots are stored one per model, keyed by the fully-qualified class name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::snapshot::types::Snapshot;
use crate::utils::fs::write_atomic;
use crate::utils::naming::snapshot_key;

/// Storage for previously taken snapshots
pub trait SnapshotStore {
    /// Load the snapshot stored under a class name
    fn load(&self, key: &str) -> Result<Snapshot>;

    /// Store a snapshot under a class name, replacing any previous one
    fn save(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    fn exists(&self, key: &str) -> bool;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn load(&self, key: &str) -> Result<Snapshot> {
        (**self).load(key)
    }

    fn save(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        (**self).save(key, snapshot)
    }

    fn exists(&self, key: &str) -> bool {
        (**self).exists(key)
    }
}

/// JSON files in a snapshot directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    directory: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Location of the artifact for a class name
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", snapshot_key(key)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Snapshot> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(Error::SnapshotNotFoundError {
                class_name: key.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::file_access(&path, e))?;
        let snapshot = Snapshot::from_json(&content)?;

        tracing::debug!(class_name = key, path = %path.display(), "Loaded snapshot");
        Ok(snapshot)
    }

    fn save(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(key);
        write_atomic(&path, &snapshot.to_json()?)?;

        tracing::info!(class_name = key, path = %path.display(), "Snapshot saved");
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }
}

/// In-memory store, mostly useful for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Snapshot> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| Error::Unknown(e.to_string()))?;

        snapshots
            .get(&snapshot_key(key))
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFoundError {
                class_name: key.to_string(),
                path: PathBuf::from(format!("memory://{}", snapshot_key(key))),
            })
    }

    fn save(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| Error::Unknown(e.to_string()))?;

        snapshots.insert(snapshot_key(key), snapshot.clone());
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.snapshots
            .read()
            .map(|snapshots| snapshots.contains_key(&snapshot_key(key)))
            .unwrap_or(false)
    }
}
