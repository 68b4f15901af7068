// Local persistent storage for the evidence ledger.
// One key maps to one JSON document; the file backend keeps each key in
// `<dir>/<key>.json`.

use crate::error::{Result, SdkError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fixed key the ledger is persisted under
pub const EVIDENCE_STORAGE_KEY: &str = "greenloop-evidence";

/// Key/value storage seam used by the ledger
pub trait EvidenceStorage: Send + Sync {
    /// Read the raw value for `key`, `None` if it was never written
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value for `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// File backed storage rooted at a data directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl EvidenceStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half written ledger
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory storage. Writes can be forced to fail to simulate a full disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw value, e.g. a corrupted ledger
    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage.entries.lock().insert(key.to_string(), value.to_string());
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl EvidenceStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SdkError::Storage("storage quota exceeded".to_string()));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
