//! Opaque key-value persistence for session state.
//!
//! Sessions serialize themselves to a single JSON string and hand it to a
//! [`StateStore`] under a fixed key. The store does not interpret the blob;
//! swapping the [`FileStore`] for the in-memory one (or anything else that
//! implements the trait) changes nothing about ranking behavior.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RankError;

/// A string-keyed blob store.
///
/// Implementations must be durable only to the extent their medium allows;
/// callers treat every failure as non-fatal and keep ranking in memory.
pub trait StateStore {
    /// Fetch the blob stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, RankError>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set(&mut self, key: &str, value: &str) -> Result<(), RankError>;

    /// Delete the blob under `key`. Removing an absent key is a no-op.
    fn remove(&mut self, key: &str) -> Result<(), RankError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Heap-backed store for tests and one-shot runs. Never fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, RankError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RankError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), RankError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One file per key inside a state directory.
///
/// Keys may contain `/` separators (e.g. `podium/session/v1`); they are
/// flattened to a single file name so the directory stays one level deep.
/// Writes go through a temporary file in the same directory, fsync, then an
/// atomic rename, so a crash mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write, not here, so constructing a store is always cheap.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let flat = key.replace('/', "-");
        self.dir.join(format!("{flat}.json"))
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, RankError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RankError::Persistence {
                op: "get",
                detail: format!("read {}: {e}", path.display()),
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RankError> {
        fs::create_dir_all(&self.dir).map_err(|e| RankError::Persistence {
            op: "set",
            detail: format!("create dir {}: {e}", self.dir.display()),
        })?;

        let path = self.path_for(key);

        // Temporary file in the same directory so the rename cannot cross
        // filesystems.
        let tmp_path = self.dir.join(".podium-state.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(|e| RankError::Persistence {
            op: "set",
            detail: format!("create {}: {e}", tmp_path.display()),
        })?;
        file.write_all(value.as_bytes())
            .map_err(|e| RankError::Persistence {
                op: "set",
                detail: format!("write {}: {e}", tmp_path.display()),
            })?;
        file.sync_all().map_err(|e| RankError::Persistence {
            op: "set",
            detail: format!("fsync {}: {e}", tmp_path.display()),
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| RankError::Persistence {
            op: "set",
            detail: format!("rename {} → {}: {e}", tmp_path.display(), path.display()),
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), RankError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RankError::Persistence {
                op: "remove",
                detail: format!("remove {}: {e}", path.display()),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
