pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::{ContextError, Result};

mod cache_dir;
pub use cache_dir::default_store_dir;

/// Key -> blob object store with read-after-write consistency
pub trait ObjectStore: Send + Sync {
    /// Store a blob under the given key, replacing any previous blob
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Retrieve a blob by key
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Check if a blob exists
    fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a blob by key (no-op when absent)
    fn delete(&self, key: &str) -> Result<()>;

    /// List all keys starting with `prefix`, sorted
    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Backing store for the current dataset version of each application
pub trait VersionStore: Send + Sync {
    /// Current version for an application, if one was ever set
    fn current(&self, app_name: &str) -> Result<Option<String>>;

    /// Set the version to `new` only if the current version equals `expected`
    ///
    /// Returns `false` without writing when another writer got there first.
    fn compare_and_swap(&self, app_name: &str, expected: Option<&str>, new: &str) -> Result<bool>;
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_objects: u64,
    pub total_bytes: u64,
    pub store_dir: Option<PathBuf>,
}

/// Reject keys that could escape the store root
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(ContextError::Store(format!("Invalid object key: {:?}", key)));
    }

    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(ContextError::Store(format!("Invalid object key: {:?}", key)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("apps/fraud/contexts/abc.msgpack").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("apps/../../etc").is_err());
        assert!(validate_key("apps//fraud").is_err());
    }
}
