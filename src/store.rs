//! Best-effort local key/value storage.
//!
//! One value per key, stored as a UTF-8 file inside a data directory.
//! Callers treat every failure here as non-fatal.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::errors::QuakeError;

/// Key holding the JSON array of accumulated events.
pub const EVENTS_KEY: &str = "earthquake_data_history";

/// Key holding the epoch-ms timestamp of the last retention prune.
pub const LAST_PRUNE_KEY: &str = "last_earthquake_cleanup";

/// Distinguishes temp files of concurrent writes within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Minimal string store shared between the pipeline and its writer task.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, QuakeError>;

    /// Replace a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), QuakeError>;
}

/// Store backed by one file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, QuakeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened local store");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, QuakeError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), QuakeError> {
        // Write-then-rename so readers never observe a half-written value.
        // Each write gets its own temp file, so concurrent writers never
        // interleave bytes; the last rename wins.
        let path = self.path_for(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}-{seq}.tmp", std::process::id()));
        if let Err(e) = fs::write(&tmp, value) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local store, used when on-disk caching is disabled.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, QuakeError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| QuakeError::Storage(io::Error::other("memory store poisoned")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), QuakeError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| QuakeError::Storage(io::Error::other("memory store poisoned")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
