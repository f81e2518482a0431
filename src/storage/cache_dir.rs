use std::path::PathBuf;

/// Get default store directory following XDG conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/strata or ~/.cache/strata
/// - macOS: ~/Library/Caches/strata
/// - Windows: %LOCALAPPDATA%/strata/cache
pub fn default_store_dir() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("strata").join("store")
    } else {
        PathBuf::from(".strata/store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_dir() {
        let store_dir = default_store_dir();
        assert!(store_dir.to_string_lossy().contains("strata"));
    }
}
