use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Key-value persistence for planner inputs, one string value per key.
pub trait LocalStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Writes several entries as a single change.
    fn set_many(&mut self, entries: Vec<(&str, String)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl<S: LocalStore + ?Sized> LocalStore for &mut S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> Result<(), StoreError> {
        (**self).set_many(entries)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
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

/// A JSON object on disk mapping keys to stored values.
///
/// The whole file is rewritten on every change through a sibling temp file
/// and a rename, so a crash leaves either the old or the new contents.
/// [`LocalStore::set_many`] batches several keys into one rewrite.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable local store");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read local store");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value);
        }
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_sets_and_removes() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v".to_string()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = FileStore::open(&path);
        store.set("cashflow.members", "[]".to_string()).unwrap();
        store.set("retirement.inputs", "{}".to_string()).unwrap();
        store.remove("retirement.inputs").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("cashflow.members").as_deref(), Some("[]"));
        assert_eq!(reopened.get("retirement.inputs"), None);
    }

    #[test]
    fn file_store_set_many_writes_every_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = FileStore::open(&path);
        store
            .set_many(vec![("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("a").as_deref(), Some("1"));
        assert_eq!(reopened.get("b").as_deref(), Some("2"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path().join("missing").join("store.json"));
        assert!(matches!(
            store.set("k", "v".to_string()),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn mutable_reference_is_a_store() {
        let mut inner = MemoryStore::new();
        {
            let mut borrowed: &mut MemoryStore = &mut inner;
            LocalStore::set(&mut borrowed, "k", "v".to_string()).unwrap();
        }
        assert_eq!(inner.get("k").as_deref(), Some("v"));
    }
}
