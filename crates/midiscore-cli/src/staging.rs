//! Output files are written to a temp file beside the destination and
//! renamed into place, so a failed run never leaves a partial file behind.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // dropped (and removed) on any early return
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    staged
        .write_all(contents)
        .with_context(|| format!("Failed to write {}", staged.path().display()))?;
    staged.as_file().sync_all()?;

    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move output into {}", path.display()))?;

    Ok(())
}
