pub mod walker;

pub use walker::FileWalker;

use crate::errors::{IoResultExt, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use xxhash_rust::xxh64::xxh64;

/// Outcome of writing one generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Written,
    Unchanged,
}

/// Fingerprint of generated content, stable across runs and platforms.
pub fn content_hash(content: &str) -> u64 {
    xxh64(content.as_bytes(), 0)
}

/// Write `content` unless the file already holds exactly these bytes, so
/// build tools watching modification times see no change.
pub fn write_if_changed(path: &Path, content: &str) -> Result<WriteStatus> {
    match fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => return Ok(WriteStatus::Unchanged),
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => return Err(error).with_path("cannot read existing output", path),
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content).with_path("cannot write output", path)?;
    Ok(WriteStatus::Written)
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        fs::create_dir_all(path).with_path("cannot create directory", path)?;
    }
    Ok(())
}
