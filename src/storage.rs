//! # Local Persistence
//!
//! Durable string key-value storage behind the [`KeyValueStore`] trait.
//! The engine treats persistence as a capability: everything it needs is
//! `get`/`set`/`delete`/`delete_many` over string keys. Two implementations
//! ship with the crate:
//!
//! - [`JsonFileStore`] – a single pretty-printed JSON object on disk,
//!   read-modify-written on every operation
//! - [`MemoryStore`] – a HashMap, for tests and ephemeral hosts
//!
//! Hosts with a platform keystore can implement the trait themselves and
//! route the credential keys to higher-security backing storage; the engine
//! does not care which keys live where.

use crate::error::BackupError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage keys used by the engine.
pub mod keys {
    pub const BOT_TOKEN: &str = "telegram_bot_token";
    pub const CHAT_ID: &str = "telegram_chat_id";
    pub const SCHEDULES: &str = "backup_schedules";
    pub const HISTORY: &str = "backup_history";
    pub const LAST_BACKUP_TIME: &str = "last_backup_time";
    pub const TOTAL_FILES_UPLOADED: &str = "total_files_uploaded";
    pub const FILE_HASHES: &str = "file_hashes";

    /// Every key the engine owns, in wipe order.
    pub const ALL: [&str; 7] = [
        BOT_TOKEN,
        CHAT_ID,
        SCHEDULES,
        HISTORY,
        LAST_BACKUP_TIME,
        TOTAL_FILES_UPLOADED,
        FILE_HASHES,
    ];
}

/// Durable string key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, BackupError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), BackupError>;
    fn delete(&mut self, key: &str) -> Result<(), BackupError>;

    fn delete_many(&mut self, keys: &[&str]) -> Result<(), BackupError> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }
}

/// File-backed store: one JSON object holding every key.
pub struct JsonFileStore {
    store_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, BackupError> {
        if !self.store_path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.store_path)
            .map_err(|e| BackupError::Storage(format!("read {}: {e}", self.store_path.display())))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .map_err(|e| BackupError::Storage(format!("parse {}: {e}", self.store_path.display())))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), BackupError> {
        if let Some(parent) = self.store_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    BackupError::Storage(format!("create {}: {e}", parent.display()))
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(map)
            .map_err(|e| BackupError::Storage(format!("serialize store: {e}")))?;
        fs::write(&self.store_path, raw)
            .map_err(|e| BackupError::Storage(format!("write {}: {e}", self.store_path.display())))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, BackupError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackupError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn delete(&mut self, key: &str) -> Result<(), BackupError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }

    fn delete_many(&mut self, keys: &[&str]) -> Result<(), BackupError> {
        let mut map = self.read_map()?;
        let mut changed = false;
        for key in keys {
            changed |= map.remove(*key).is_some();
        }
        if changed {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, BackupError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackupError> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), BackupError> {
        self.map.remove(key);
        Ok(())
    }
}
