//! Per-scope advisory locking
//!
//! No two rounds for the same scope may execute concurrently. Each
//! invocation takes an exclusive lock on the scope's lock file for the
//! duration of its work; a second invocation fails fast with `CycleLocked`
//! instead of corrupting state. Distinct scopes lock independently.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::{Error, Result};

/// Exclusive advisory lock on one scope, released on drop
#[derive(Debug)]
pub struct ScopeLock {
    file: File,
}

impl ScopeLock {
    /// Acquire the lock file for a scope, failing fast on contention
    pub fn acquire(path: &Path, scope_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive().map_err(|_| Error::CycleLocked {
            scope: scope_id.to_string(),
        })?;

        tracing::debug!(scope_id = %scope_id, path = %path.display(), "Acquired scope lock");
        Ok(Self { file })
    }
}

impl Drop for ScopeLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
