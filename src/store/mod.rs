use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{app_config_path, config_env_dirs, ConfigPathError, APP_DIR};

pub mod keys {
    pub const BACK_IMG_URL: &str = "BACK_IMG_URL";
    pub const BACK_IMG_BLUR: &str = "BACK_IMG_BLUR";
    pub const BACK_IMG_OPACITY: &str = "BACK_IMG_OPACITY";
    pub const BACK_IMG_POSITION_X: &str = "BACK_IMG_POSITION_X";
    pub const BACK_IMG_POSITION_Y: &str = "BACK_IMG_POSITION_Y";
    pub const BACK_IMG_SCALE: &str = "BACK_IMG_SCALE";
    pub const BACK_IMG_ROTATION: &str = "BACK_IMG_ROTATION";
    pub const UI_THEME: &str = "UI_THEME";
    pub const DEFAULT_THEME_CLICKED: &str = "DEFAULT_THEME_CLICKED";
}

const STORE_FILE: &str = "store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("storage quota exceeded writing {key}: {required} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },
    #[error("failed to write store file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize value for {key}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable string-keyed mapping of JSON values.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> StoreResult<()>;
    fn remove(&mut self, key: &str) -> StoreResult<()>;

    /// Writes several keys in order, stopping at the first rejected write.
    fn set_many(&mut self, entries: Vec<(&str, Value)>) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_many(&mut self, keys: &[&str]) -> StoreResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Reads `key` as `T`. Missing keys and values of the wrong shape both read as absent.
pub fn load<T, S>(store: &S, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::debug!(key, ?err, "ignoring stored value with unexpected shape");
            None
        }
    }
}

pub fn save<T, S>(store: &mut S, key: &str, value: &T) -> StoreResult<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    fn from_entries(entries: BTreeMap<String, Value>, quota: Option<usize>) -> Self {
        Self { entries, quota }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Bytes the store occupies, counted like browser storage: key plus serialized value.
    pub fn footprint(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, value)| entry_footprint(key, value))
            .sum()
    }

    fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        if let Some(quota) = self.quota {
            let replaced = self
                .entries
                .get(key)
                .map_or(0, |previous| entry_footprint(key, previous));
            let required = self.footprint() - replaced + entry_footprint(key, &value);
            if required > quota {
                tracing::warn!(key, required, quota, "store write rejected by quota");
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    quota,
                });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

fn entry_footprint(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}

/// JSON-object file store, written through on every mutation.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    pub fn open(path: PathBuf, quota: Option<usize>) -> Self {
        let entries = read_entries(&path);
        Self {
            path,
            memory: MemoryStore::from_entries(entries, quota),
        }
    }

    pub fn open_default(quota: Option<usize>) -> StoreResult<Self> {
        let (xdg_config_home, home) = config_env_dirs();
        let path = default_store_path_with(xdg_config_home.as_deref(), home.as_deref())?;
        Ok(Self::open(path, quota))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StoreResult<()> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let serialized =
            serde_json::to_string(self.memory.entries()).map_err(|source| StoreError::Serialize {
                key: STORE_FILE.to_string(),
                source,
            })?;
        fs::write(&self.path, serialized).map_err(write_err)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.memory.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.memory.set(key, value)?;
        self.flush()
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.remove_many(&[key])
    }

    /// One file write for the whole batch. Entries accepted before a rejected one are kept.
    fn set_many(&mut self, entries: Vec<(&str, Value)>) -> StoreResult<()> {
        let written = self.memory.set_many(entries);
        self.flush()?;
        written
    }

    fn remove_many(&mut self, keys: &[&str]) -> StoreResult<()> {
        if !keys.iter().any(|key| self.memory.contains_key(key)) {
            return Ok(());
        }
        self.memory.remove_many(keys)?;
        self.flush()
    }
}

/// Memory store whose removals always fail, for exercising storage error paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RefusingRemoveStore {
    pub(crate) inner: MemoryStore,
}

#[cfg(test)]
impl KeyValueStore for RefusingRemoveStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&mut self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Write {
            path: PathBuf::from(STORE_FILE),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"),
        })
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, Value> {
    if !path.exists() {
        return BTreeMap::new();
    }
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse store file; starting empty");
            BTreeMap::new()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read store file; starting empty");
            BTreeMap::new()
        }
    }
}

fn default_store_path_with(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> StoreResult<PathBuf> {
    app_config_path(APP_DIR, STORE_FILE, xdg_config_home, home).map_err(|error| match error {
        ConfigPathError::MissingHomeDirectory => StoreError::MissingHomeDirectory,
    })
}
