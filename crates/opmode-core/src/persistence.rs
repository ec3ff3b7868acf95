//! Best-effort durable storage of mode and settings
//!
//! The storage engine sits behind [`KeyValueStore`]. [`PersistenceGateway`]
//! adds typed access under stable keys and swallows every failure: reads
//! fall back to `None`, writes are logged and dropped. A storage failure
//! never blocks an in-memory transition.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PersistenceError, PersistenceResult};
use crate::mode::Mode;
use crate::settings::Settings;

/// Logical storage keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Current mode (`"real"` / `"demo"`)
    Mode,
    /// Serialized [`Settings`]
    Settings,
    /// Reason of the last switch
    LastSwitchReason,
}

impl StorageKey {
    /// Key as written to the store
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Mode => "mode",
            StorageKey::Settings => "settings",
            StorageKey::LastSwitchReason => "lastSwitchReason",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String key/value storage engine
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read value; `Ok(None)` when absent
    fn get(&self, key: &str) -> PersistenceResult<Option<String>>;

    /// Write value
    fn set(&self, key: &str, value: &str) -> PersistenceResult<()>;

    /// Delete value; absent keys are not an error
    fn remove(&self, key: &str) -> PersistenceResult<()>;
}

/// In-process store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk
///
/// Writes go to a sibling temp file which is then renamed over the target.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create store for `path`; the file is created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> PersistenceResult<BTreeMap<String, String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(PersistenceError::io_error(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .map_err(|e| PersistenceError::corrupt(self.path.display().to_string(), e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> PersistenceResult<()> {
        let encoded = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::io_error(parent, e))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, encoded).map_err(|e| PersistenceError::io_error(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| PersistenceError::io_error(&self.path, e))
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> PersistenceResult<()> {
        let _guard = self.lock.lock();
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(PersistenceError::Corrupt { message, .. }) => {
                tracing::warn!(path = %self.path.display(), %message, "discarding corrupt state file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}

/// Typed, failure-swallowing access to a [`KeyValueStore`]
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceGateway").finish_non_exhaustive()
    }
}

impl PersistenceGateway {
    /// Wrap a storage engine
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Gateway over a fresh [`MemoryStore`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Stored mode; `None` when absent or unreadable
    #[must_use]
    pub fn load_mode(&self) -> Option<Mode> {
        let raw = self.read(StorageKey::Mode)?;
        match raw.parse::<Mode>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored mode");
                None
            }
        }
    }

    /// Stored settings, clamped; `None` when absent or unreadable
    #[must_use]
    pub fn load_settings(&self) -> Option<Settings> {
        let raw = self.read(StorageKey::Settings)?;
        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => Some(settings.sanitized()),
            Err(e) => {
                let e = PersistenceError::corrupt(StorageKey::Settings.as_str(), e.to_string());
                tracing::warn!(error = %e, "ignoring stored settings");
                None
            }
        }
    }

    /// Stored reason of the last switch
    #[must_use]
    pub fn load_switch_reason(&self) -> Option<String> {
        self.read(StorageKey::LastSwitchReason)
    }

    /// Persist mode; returns whether the write succeeded
    pub fn save_mode(&self, mode: Mode) -> bool {
        self.write(StorageKey::Mode, mode.as_str())
    }

    /// Persist settings; returns whether the write succeeded
    pub fn save_settings(&self, settings: &Settings) -> bool {
        match serde_json::to_string(settings) {
            Ok(encoded) => self.write(StorageKey::Settings, &encoded),
            Err(e) => {
                tracing::warn!(error = %PersistenceError::from(e), "failed to encode settings");
                false
            }
        }
    }

    /// Persist switch reason; returns whether the write succeeded
    pub fn save_switch_reason(&self, reason: &str) -> bool {
        self.write(StorageKey::LastSwitchReason, reason)
    }

    /// Delete stored switch reason; returns whether the delete succeeded
    pub fn clear_switch_reason(&self) -> bool {
        match self.store.remove(StorageKey::LastSwitchReason.as_str()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %StorageKey::LastSwitchReason, error = %e, "storage delete failed");
                false
            }
        }
    }

    fn read(&self, key: StorageKey) -> Option<String> {
        match self.store.get(key.as_str()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%key, error = %e, "storage read failed, using defaults");
                None
            }
        }
    }

    fn write(&self, key: StorageKey, value: &str) -> bool {
        match self.store.set(key.as_str(), value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "storage write failed");
                false
            }
        }
    }
}
