//! Exclusive file locking over a sibling lockfile, per §4.1's atomicity
//! requirement: every mutation acquires the lock, re-reads the document,
//! validates, writes, releases.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use swarmboard_core::{SwarmError, SwarmResult};

/// An acquired exclusive lock over `{document}.lock`. Dropping it releases
/// the OS advisory lock.
pub struct ExclusiveLock {
    _file: File,
}

impl ExclusiveLock {
    /// Blocks the calling (blocking-pool) thread until the lock is
    /// acquired. Call from inside `tokio::task::spawn_blocking`.
    pub fn acquire(lock_path: &Path) -> SwarmResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)
            .map_err(|e| SwarmError::Board(format!("opening lockfile {lock_path:?}: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| SwarmError::Board(format!("acquiring lock {lock_path:?}: {e}")))?;
        Ok(Self { _file: file })
    }
}

/// The sibling lockfile path for a given document path, e.g.
/// `task_board.json` -> `.task_board.lock`.
pub fn sibling_lock_path(document_path: &Path) -> PathBuf {
    let dir = document_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = document_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    dir.join(format!(".{stem}.lock"))
}
