use super::{validate_key, ObjectStore, StoreStats, VersionStore};
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, DB};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{ContextError, Result};

/// RocksDB column families for store metadata
///
/// - "default": unused
/// - "versions": app name -> current dataset version
/// - "objects": object key -> object metadata (for listing and stats)
const CF_DEFAULT: &str = "default";
const CF_VERSIONS: &str = "versions";
const CF_OBJECTS: &str = "objects";

/// Metadata stored for each object in RocksDB
///
/// Format (binary encoding):
/// - size: u64 (8 bytes)
/// - created_at: i64 (8 bytes)
///
/// Total: 16 bytes per object
#[derive(Debug, Clone)]
struct ObjectMetadata {
    size: u64,
    created_at: i64,
}

impl ObjectMetadata {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&self.size.to_le_bytes());
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let size: [u8; 8] = bytes.get(0..8).and_then(|b| b.try_into().ok()).ok_or_else(|| {
            ContextError::Store(format!(
                "Invalid metadata size: expected 16 bytes, got {}",
                bytes.len()
            ))
        })?;
        let created_at: [u8; 8] =
            bytes.get(8..16).and_then(|b| b.try_into().ok()).ok_or_else(|| {
                ContextError::Store(format!(
                    "Invalid metadata size: expected 16 bytes, got {}",
                    bytes.len()
                ))
            })?;

        Ok(Self {
            size: u64::from_le_bytes(size),
            created_at: i64::from_le_bytes(created_at),
        })
    }
}

fn store_err(context: &str, e: rocksdb::Error) -> ContextError {
    ContextError::Store(format!("{}: {}", context, e))
}

/// Filesystem-backed object store with RocksDB metadata
///
/// Layout:
/// - `<dir>/objects/<key>` - Blob storage, one file per key
/// - `<dir>/metadata/` - RocksDB database holding dataset versions and object metadata
///
/// RocksDB takes an exclusive lock on its directory, so a store directory is
/// owned by a single process. Within that process, version compare-and-swap
/// is serialized by `version_lock`.
pub struct FilesystemStore {
    objects_dir: PathBuf,
    db: DB,
    version_lock: Mutex<()>,
}

impl FilesystemStore {
    /// Open (or create) a store at the given directory
    pub fn open<P: AsRef<Path>>(store_dir: P) -> Result<Self> {
        let store_dir = store_dir.as_ref();
        let objects_dir = store_dir.join("objects");
        let db_path = store_dir.join("metadata");

        fs::create_dir_all(&objects_dir).map_err(|e| ContextError::io(&objects_dir, e))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_statistics_level(rocksdb::statistics::StatsLevel::DisableAll);

        let db = DB::open_cf(&opts, &db_path, vec![CF_DEFAULT, CF_VERSIONS, CF_OBJECTS])
            .map_err(|e| store_err("Failed to open RocksDB database", e))?;

        debug!(store_dir = %store_dir.display(), "opened filesystem store");

        Ok(Self {
            objects_dir,
            db,
            version_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ContextError::Store(format!("Missing column family: {}", name)))
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.objects_dir.clone(), |path, segment| path.join(segment))
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut total_objects = 0u64;
        let mut total_bytes = 0u64;

        for item in self.db.iterator_cf(self.cf(CF_OBJECTS)?, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| store_err("Failed to iterate objects", e))?;
            if let Ok(metadata) = ObjectMetadata::from_bytes(&value) {
                total_objects += 1;
                total_bytes += metadata.size;
            }
        }

        Ok(StoreStats {
            total_objects,
            total_bytes,
            store_dir: self.objects_dir.parent().map(Path::to_path_buf),
        })
    }

    /// Creation time (Unix seconds) of a stored object
    pub fn created_at(&self, key: &str) -> Result<Option<i64>> {
        let bytes = self
            .db
            .get_cf(self.cf(CF_OBJECTS)?, key.as_bytes())
            .map_err(|e| store_err("Failed to read object metadata", e))?;
        bytes
            .map(|b| ObjectMetadata::from_bytes(&b).map(|m| m.created_at))
            .transpose()
    }
}

impl Drop for FilesystemStore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            debug!("Failed to flush RocksDB on shutdown: {}", e);
        }
        self.db.cancel_all_background_work(true);
    }
}

impl ObjectStore for FilesystemStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        let path = self.key_to_path(key);
        let parent = path
            .parent()
            .ok_or_else(|| ContextError::Store(format!("Invalid object key: {:?}", key)))?;

        fs::create_dir_all(parent).map_err(|e| ContextError::io(parent, e))?;

        // Write data atomically (write to temp file, then rename)
        // Use PID + thread ID to avoid collisions in concurrent writes
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(
            "{}.tmp.{}.{:?}",
            file_name,
            std::process::id(),
            thread::current().id()
        ));

        let mut file = fs::File::create(&temp_path).map_err(|e| ContextError::io(&temp_path, e))?;
        file.write_all(data)
            .and_then(|_| file.sync_all())
            .map_err(|e| ContextError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| ContextError::io(&path, e))?;

        let metadata = ObjectMetadata {
            size: data.len() as u64,
            created_at: Self::current_timestamp(),
        };
        self.db
            .put_cf(self.cf(CF_OBJECTS)?, key.as_bytes(), metadata.to_bytes())
            .map_err(|e| store_err("Failed to update metadata", e))?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let path = self.key_to_path(key);

        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContextError::io(&path, e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.key_to_path(key).is_file())
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.key_to_path(key);

        if path.exists() {
            fs::remove_file(&path).map_err(|e| ContextError::io(&path, e))?;
        }

        self.db
            .delete_cf(self.cf(CF_OBJECTS)?, key.as_bytes())
            .map_err(|e| store_err("Failed to delete metadata", e))?;

        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let iter = self.db.iterator_cf(
            self.cf(CF_OBJECTS)?,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );

        for item in iter {
            let (key, _) = item.map_err(|e| store_err("Failed to iterate objects", e))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }

        Ok(keys)
    }
}

impl VersionStore for FilesystemStore {
    fn current(&self, app_name: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get_cf(self.cf(CF_VERSIONS)?, app_name.as_bytes())
            .map_err(|e| store_err("Failed to read dataset version", e))?;
        Ok(value.map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    fn compare_and_swap(&self, app_name: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let _guard = self
            .version_lock
            .lock()
            .map_err(|_| ContextError::Store("Dataset version lock poisoned".to_string()))?;

        let current = self.current(app_name)?;
        if current.as_deref() != expected {
            return Ok(false);
        }

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_cf_opt(self.cf(CF_VERSIONS)?, app_name.as_bytes(), new.as_bytes(), &write_opts)
            .map_err(|e| store_err("Failed to write dataset version", e))?;

        Ok(true)
    }
}
