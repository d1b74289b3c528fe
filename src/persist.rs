//! Atomic file replacement.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the target, so readers only ever observe the previous or the
//! new complete contents.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically replaces `path` with `contents`.
///
/// The parent directory is created if missing.
///
/// # Errors
///
/// Returns the underlying I/O error if the temporary file cannot be created,
/// written, synced or renamed into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
