//! Loading user code and packages from disk into a [`FileMap`]

use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ContextError, Result};
use crate::logging::{operations, status};
use crate::pipeline::FileMap;

/// Read every regular file under `dir`, keyed by its `/`-separated relative path
///
/// Hidden files and directories (leading `.`) are skipped.
pub fn load_files(dir: &Path) -> Result<FileMap> {
    let mut files = FileMap::new();
    let mut total_bytes = 0usize;

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            ContextError::io(path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).map_err(|_| {
            ContextError::config(format!(
                "{} is outside {}",
                entry.path().display(),
                dir.display()
            ))
        })?;
        let key = file_key(relative)?;

        let bytes = fs::read(entry.path()).map_err(|e| ContextError::io(entry.path(), e))?;
        total_bytes += bytes.len();
        files.insert(key, bytes);
    }

    debug!(
        operation = operations::LOAD_FILES,
        status = status::SUCCESS,
        dir = %dir.display(),
        file_count = files.len(),
        total_bytes,
        "files loaded"
    );
    Ok(files)
}

/// `/`-joined key of a relative path; non-UTF-8 names have no stable key
fn file_key(relative: &Path) -> Result<String> {
    let segments = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                ContextError::config(format!(
                    "file name is not valid UTF-8: {}",
                    relative.display()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("implementations/models")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("implementations/models/m1.py"), b"model").unwrap();
        fs::write(dir.path().join("requirements.txt"), b"numpy\n").unwrap();
        fs::write(dir.path().join(".git/HEAD"), b"ref").unwrap();
        fs::write(dir.path().join(".env"), b"SECRET=1").unwrap();

        let files = load_files(dir.path()).unwrap();

        assert_eq!(
            files.keys().collect::<Vec<_>>(),
            vec!["implementations/models/m1.py", "requirements.txt"]
        );
        assert_eq!(files["requirements.txt"], b"numpy\n");
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = load_files(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_non_utf8_file_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let name = OsStr::from_bytes(b"impl\xff.py");
        if fs::write(dir.path().join(name), b"a").is_err() {
            // Filesystem refuses the name, nothing to load
            return;
        }
        fs::write(dir.path().join("impl\u{fffd}.py"), b"b").unwrap();

        let err = load_files(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_file_key_joins_components() {
        assert_eq!(
            file_key(Path::new("implementations/models/m1.py")).unwrap(),
            "implementations/models/m1.py"
        );
    }
}
