//! Exclusive file locking over a sibling lockfile, mirroring
//! `swarmboard-board`'s approach but kept local to this crate since the
//! bus and mailbox lock at a different granularity (one global lock for
//! the bus document, one lock per mailbox file).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use swarmboard_core::{SwarmError, SwarmResult};

pub struct ExclusiveLock {
    _file: File,
}

impl ExclusiveLock {
    pub fn acquire(lock_path: &Path) -> SwarmResult<Self> {
        if let Some(dir) = lock_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)
            .map_err(|e| SwarmError::Bus(format!("opening lockfile {lock_path:?}: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| SwarmError::Bus(format!("acquiring lock {lock_path:?}: {e}")))?;
        Ok(Self { _file: file })
    }
}

pub fn sibling_lock_path(document_path: &Path) -> PathBuf {
    let dir = document_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = document_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    dir.join(format!(".{stem}.lock"))
}
