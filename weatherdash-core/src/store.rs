//! Key/value persistence for preferences and the last good snapshot.
//!
//! Values are JSON-encoded strings under fixed keys. Nothing in here is
//! allowed to fail the caller: [`Preferences`] logs storage errors and keeps
//! going without persistence.

use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::{
    error::StoreError,
    model::{CachedSnapshot, Location, Theme, Unit},
};

pub const UNIT_KEY: &str = "weatherdash.unit";
pub const THEME_KEY: &str = "weatherdash.theme";
pub const LOCATION_KEY: &str = "weatherdash.location";
pub const SNAPSHOT_KEY: &str = "weatherdash.snapshot";

/// String key/value storage.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store, also the degraded mode when the file store cannot open.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A single JSON object on disk, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store, reading existing entries if the file is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened state file");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(err) = self.flush() {
            // Keep memory consistent with disk.
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Open the file store at `path`, or fall back to memory when it is unusable.
pub fn open_or_memory(path: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    let Some(path) = path else {
        warn!("No state directory available; preferences will not persist");
        return Box::new(MemoryStore::new());
    };

    match FileStore::open(&path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "State file unusable; preferences will not persist"
            );
            Box::new(MemoryStore::new())
        }
    }
}

/// Typed, failure-tolerant access to the persisted state.
#[derive(Debug)]
pub struct Preferences {
    store: Box<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "Failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Ignoring undecodable stored value");
                None
            }
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "Failed to encode value for storage");
                return;
            }
        };

        if let Err(err) = self.store.set(key, encoded) {
            warn!(key, error = %err, "Failed to persist value; continuing without it");
        }
    }

    pub fn unit(&self) -> Option<Unit> {
        self.read(UNIT_KEY)
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.write(UNIT_KEY, &unit);
    }

    pub fn theme(&self) -> Option<Theme> {
        self.read(THEME_KEY)
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.write(THEME_KEY, &theme);
    }

    pub fn location(&self) -> Option<Location> {
        self.read(LOCATION_KEY)
    }

    pub fn set_location(&mut self, location: &Location) {
        self.write(LOCATION_KEY, location);
    }

    pub fn snapshot(&self) -> Option<CachedSnapshot> {
        self.read(SNAPSHOT_KEY)
    }

    pub fn set_snapshot(&mut self, snapshot: &CachedSnapshot) {
        self.write(SNAPSHOT_KEY, snapshot);
    }

    pub fn clear_snapshot(&mut self) {
        if let Err(err) = self.store.remove(SNAPSHOT_KEY) {
            warn!(error = %err, "Failed to clear snapshot");
        }
    }
}
