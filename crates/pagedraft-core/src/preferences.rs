//! Local preference storage
//!
//! The autosave toggle lives in a small key/value slot owned by the client,
//! read once when a session starts and written whenever the user flips it.

use crate::error::PreferenceError;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Client-side key/value slot
pub trait PreferenceStore: Send + Sync + Debug {
    /// Read a boolean preference
    ///
    /// # Errors
    /// Backing storage could not be read.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError>;

    /// Write a boolean preference
    ///
    /// # Errors
    /// Backing storage could not be written.
    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError>;
}

/// In-memory store, for tests and embedders without persistence
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, bool>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        Ok(self.values.lock().get(key).copied())
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON object file, one key per preference
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    /// Use `path`; the file is created on first write
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, PreferenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Map::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        Ok(self.read_all()?.get(key).and_then(Value::as_bool))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        let _guard = self.write_lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), Value::Bool(value));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&values)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.get_bool("autosave").unwrap(), None);

        store.set_bool("autosave", false).unwrap();
        assert_eq!(store.get_bool("autosave").unwrap(), Some(false));
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.get_bool("autosave").unwrap(), None);
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = FilePreferenceStore::new(&path);

        store.set_bool("a", true).unwrap();
        store.set_bool("b", false).unwrap();

        let reopened = FilePreferenceStore::new(&path);
        assert_eq!(reopened.get_bool("a").unwrap(), Some(true));
        assert_eq!(reopened.get_bool("b").unwrap(), Some(false));
    }

    #[test]
    fn file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FilePreferenceStore::new(&path);
        assert!(matches!(
            store.get_bool("a"),
            Err(PreferenceError::Corrupt(_))
        ));
    }
}
