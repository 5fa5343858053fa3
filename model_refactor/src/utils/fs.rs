//! Filesystem helpers

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Write content atomically: a temp file in the same directory is renamed over the target
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| Error::file_access(path, e))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| Error::file_access(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::file_access(path, e))?;

    // Keep the permissions of the file being replaced
    if let Ok(metadata) = std::fs::metadata(path) {
        if let Err(err) = std::fs::set_permissions(temp.path(), metadata.permissions()) {
            tracing::warn!(path = %path.display(), error = %err, "Cannot keep file permissions");
        }
    }

    temp.persist(path)
        .map_err(|e| Error::file_access(path, e.error))?;

    Ok(())
}
