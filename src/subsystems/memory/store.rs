//! Storage trait and the in-memory backend.
//!
//! Values are JSON documents addressed by string keys. Durable backends
//! (blob, database) would implement the same trait; only the process-memory
//! one ships here.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::AppError;

/// Pluggable key-value document storage.
pub trait Storage: Send + Sync {
    /// Type name used in logs (e.g. `"memory"`).
    fn storage_type(&self) -> &str;

    fn read(&self, key: &str) -> Result<Option<Value>, AppError>;

    fn write(&self, key: &str, value: Value) -> Result<(), AppError>;

    /// Write `value` only if `key` is unset, atomically. Returns `true` if
    /// this call stored it.
    fn insert_if_absent(&self, key: &str, value: Value) -> Result<bool, AppError>;

    /// Returns `true` if the key existed.
    fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// Ephemeral storage. Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, AppError> {
        self.data
            .lock()
            .map_err(|_| AppError::State("memory storage lock poisoned".into()))
    }
}

impl Storage for MemoryStorage {
    fn storage_type(&self) -> &str {
        "memory"
    }

    fn read(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn insert_if_absent(&self, key: &str, value: Value) -> Result<bool, AppError> {
        match self.lock()?.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(key).is_some())
    }
}
