//! Persisted client state.
//!
//! A small key-value abstraction (`KeyValueStore`) with a JSON-file backend and an
//! in-memory fake, plus the session bookkeeping stored on top of it.

use crate::model::SessionRecord;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
#[cfg(test)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SESSIONS_KEY: &str = "securityassess.sessions";
pub const ACTIVE_SESSION_KEY: &str = "securityassess.activeSession";
pub const MAX_SESSIONS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// String key-value persistence with explicit get/set/delete.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// All keys live in one JSON object file; every write rewrites it atomically.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store under the given data directory (`<dir>/store.json`).
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("store.json"))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(m)) => Ok(m),
            Ok(_) => Ok(Map::new()),
            Err(source) => Err(StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(map).map_err(|e| io_err(e.into()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    // A corrupt file is replaced on the next write rather than blocking all writes.
    fn read_map_for_write(&self) -> Result<Map<String, Value>, StoreError> {
        match self.read_map() {
            Err(StoreError::Corrupt { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "discarding corrupt store file");
                Ok(Map::new())
            }
            other => other,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let map = self.read_map()?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map_for_write()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map_for_write()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Session list and active pointer, persisted as JSON values in a `KeyValueStore`.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Stored sessions, most recent first. Missing or corrupt data reads as empty.
    pub fn load(&self) -> Vec<SessionRecord> {
        let raw = match self.kv.get(SESSIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored sessions");
                return Vec::new();
            }
        };
        let items = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                tracing::warn!("stored sessions are not a list; ignoring");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored sessions are not valid JSON; ignoring");
                return Vec::new();
            }
        };
        let mut records: Vec<SessionRecord> =
            items.iter().filter_map(SessionRecord::from_value).collect();
        if records.len() < items.len() {
            tracing::debug!(
                dropped = items.len() - records.len(),
                "skipped malformed session entries"
            );
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Overwrite the stored list. Callers cap it (see `merge_session`).
    pub fn save(&self, records: &[SessionRecord]) -> Result<()> {
        let raw = serde_json::to_string(records).context("encode sessions")?;
        self.kv
            .set(SESSIONS_KEY, &raw)
            .context("persist sessions")?;
        Ok(())
    }

    /// The active session id, if any. A corrupt pointer reads as `None`.
    pub fn active(&self) -> Option<String> {
        let raw = match self.kv.get(ACTIVE_SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read active session");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(v) => crate::model::normalize_id(&v),
            Err(_) => {
                tracing::warn!("active session pointer is not valid JSON; ignoring");
                None
            }
        }
    }

    /// Set or clear the active pointer. Clearing deletes the key.
    pub fn set_active(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => {
                let raw = serde_json::to_string(id).context("encode active session")?;
                self.kv
                    .set(ACTIVE_SESSION_KEY, &raw)
                    .context("persist active session")?;
            }
            None => {
                self.kv
                    .delete(ACTIVE_SESSION_KEY)
                    .context("clear active session")?;
            }
        }
        Ok(())
    }

    /// Remove one session; clears the active pointer if it referenced it.
    pub fn remove(&self, id: &str) -> Result<Vec<SessionRecord>> {
        let mut records = self.load();
        records.retain(|r| r.id != id);
        self.save(&records)?;
        if self.active().as_deref() == Some(id) {
            self.set_active(None)?;
        }
        Ok(records)
    }

    pub fn clear(&self) -> Result<()> {
        self.kv.delete(SESSIONS_KEY).context("clear sessions")?;
        self.set_active(None)
    }
}

/// Put `record` first, dropping any previous entry with the same id and capping the list.
pub fn merge_session(records: &mut Vec<SessionRecord>, record: SessionRecord) {
    records.retain(|r| r.id != record.id);
    records.insert(0, record);
    records.truncate(MAX_SESSIONS);
}

/// Default data directory (`$XDG_DATA_HOME/securityassess` or platform equivalent).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("securityassess")
}

/// Write a pretty-printed JSON value to `path`.
pub fn export_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    let data = serde_json::to_vec_pretty(value).context("encode document")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
