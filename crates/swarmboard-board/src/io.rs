//! Whole-document read/write helpers: load-or-default on read, write-to-
//! temp-then-rename on write, so a crash mid-write never corrupts the
//! previous valid document (§4.1's failure semantics).

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use swarmboard_core::{SwarmError, SwarmResult};

/// Reads and parses `path` as JSON, or returns `T::default()` if the file
/// does not exist yet. A file that exists but fails to parse is a loud
/// error — "the board refuses mutations until repaired" (§4.1).
pub fn read_or_default<T>(path: &Path) -> SwarmResult<T>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| SwarmError::Board(format!("malformed document at {path:?}: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(SwarmError::Io(e)),
    }
}

/// Serializes `value` and atomically replaces `path`'s contents: write to a
/// sibling `.tmp` file, then rename over the destination.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> SwarmResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("document")
    ));
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
