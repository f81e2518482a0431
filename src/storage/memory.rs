use super::{validate_key, ObjectStore, StoreStats, VersionStore};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ContextError, Result};

/// In-memory object and version store
///
/// Used by tests and by `--no-persist` builds. Every operation takes a single
/// lock, so compare-and-swap is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    versions: Mutex<BTreeMap<String, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ContextError::Store("Memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let objects = lock(&self.objects)?;
        Ok(StoreStats {
            total_objects: objects.len() as u64,
            total_bytes: objects.values().map(|v| v.len() as u64).sum(),
            store_dir: None,
        })
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        lock(&self.objects)?.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(lock(&self.objects)?.get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(lock(&self.objects)?.contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        lock(&self.objects)?.remove(key);
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(lock(&self.objects)?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl VersionStore for MemoryStore {
    fn current(&self, app_name: &str) -> Result<Option<String>> {
        Ok(lock(&self.versions)?.get(app_name).cloned())
    }

    fn compare_and_swap(&self, app_name: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let mut versions = lock(&self.versions)?;
        if versions.get(app_name).map(String::as_str) != expected {
            return Ok(false);
        }
        versions.insert(app_name.to_string(), new.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_objects() {
        let store = MemoryStore::new();
        store.put("apps/a/x", b"1").unwrap();
        store.put("apps/b/y", b"22").unwrap();

        assert_eq!(store.get("apps/a/x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.list_prefix("apps/a").unwrap(), vec!["apps/a/x"]);
        assert_eq!(store.stats().unwrap().total_bytes, 3);

        store.delete("apps/a/x").unwrap();
        assert!(!store.exists("apps/a/x").unwrap());
    }

    #[test]
    fn test_memory_store_compare_and_swap() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("fraud", None, "v1").unwrap());
        assert!(!store.compare_and_swap("fraud", Some("v0"), "v2").unwrap());
        assert_eq!(store.current("fraud").unwrap().as_deref(), Some("v1"));
    }
}
