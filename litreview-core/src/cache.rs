//! On-disk response cache for search results and embeddings.
//!
//! Entries live at `<root>/<namespace>/<sha256(key)>.json` and expire by
//! file modification time. Anything that cannot be read back (missing,
//! expired, truncated, or written by an incompatible version) is a miss.

use crate::config::CacheConfig;
use crate::error::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Namespace for cached search result lists.
pub const SEARCH_NAMESPACE: &str = "search";
/// Namespace for cached embedding vectors.
pub const EMBEDDINGS_NAMESPACE: &str = "embeddings";

/// Per-namespace entry counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub entries: usize,
    pub expired: usize,
    pub bytes: u64,
}

/// Snapshot of cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

impl CacheStats {
    pub fn total_entries(&self) -> usize {
        self.namespaces.values().map(|n| n.entries).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.namespaces.values().map(|n| n.bytes).sum()
    }
}

/// File-backed cache keyed by content hash.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    /// Build a cache from configuration, or `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(
                config.dir.clone(),
                Duration::from_secs(config.ttl_hours * 3600),
            )
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex SHA-256 of a cache key.
    pub fn key_hash(key: &str) -> String {
        format!("{:x}", Sha256::digest(key.as_bytes()))
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root
            .join(namespace)
            .join(format!("{}.json", Self::key_hash(key)))
    }

    fn is_expired(&self, path: &Path) -> bool {
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return true,
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age >= self.ttl,
            // mtime in the future: clock skew, treat as fresh
            Err(_) => false,
        }
    }

    /// Look up a value. Never fails; every problem is a miss.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        checked_namespace(namespace).ok()?;
        let path = self.entry_path(namespace, key);
        if !path.exists() || self.is_expired(&path) {
            return None;
        }
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cache entry unreadable");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(namespace, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store a value, replacing any existing entry atomically.
    pub fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<(), CacheError> {
        checked_namespace(namespace)?;
        let path = self.entry_path(namespace, key);
        let write_err = |message: String| CacheError::Write {
            path: path.clone(),
            message,
        };
        let dir = self.root.join(namespace);
        std::fs::create_dir_all(&dir).map_err(|e| write_err(e.to_string()))?;
        let bytes = serde_json::to_vec(value).map_err(|e| write_err(e.to_string()))?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, bytes).map_err(|e| write_err(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            write_err(e.to_string())
        })
    }

    /// Store a value, logging instead of failing.
    pub fn put_or_warn<T: Serialize>(&self, namespace: &str, key: &str, value: &T) {
        if let Err(e) = self.put(namespace, key, value) {
            warn!(namespace, error = %e, "Failed to write cache entry");
        }
    }

    /// Remove entries from one namespace, or from all namespaces.
    ///
    /// Returns the number of files removed.
    pub fn clear(&self, namespace: Option<&str>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for dir in self.namespace_dirs(namespace)? {
            let read_err = |e: std::io::Error| CacheError::Read {
                path: dir.clone(),
                message: e.to_string(),
            };
            for entry in std::fs::read_dir(&dir).map_err(read_err)? {
                let path = entry.map_err(read_err)?.path();
                if path.is_file() && is_cache_file(&path) && std::fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Count entries and bytes per namespace.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for dir in self.namespace_dirs(None)? {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut ns = NamespaceStats::default();
            let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Read {
                path: dir.clone(),
                message: e.to_string(),
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                ns.entries += 1;
                ns.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                if self.is_expired(&path) {
                    ns.expired += 1;
                }
            }
            stats.namespaces.insert(name, ns);
        }
        Ok(stats)
    }

    fn namespace_dirs(&self, namespace: Option<&str>) -> Result<Vec<PathBuf>, CacheError> {
        if let Some(ns) = namespace {
            let dir = self.root.join(checked_namespace(ns)?);
            return Ok(if dir.is_dir() { vec![dir] } else { Vec::new() });
        }
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| CacheError::Read {
            path: self.root.clone(),
            message: e.to_string(),
        })?;
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

/// A namespace must be one plain directory name under the cache root.
fn checked_namespace(namespace: &str) -> Result<&str, CacheError> {
    let mut components = Path::new(namespace).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(namespace),
        _ => Err(CacheError::InvalidNamespace {
            namespace: namespace.to_string(),
        }),
    }
}

/// Entries (`*.json`) and interrupted writes (`.*.tmp`); nothing else is ours to delete.
fn is_cache_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".json") || (name.starts_with('.') && name.ends_with(".tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(dir: &Path) -> ResponseCache {
        ResponseCache::new(dir, Duration::from_secs(3600))
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let urls = vec!["https://a.org".to_string(), "https://b.org".to_string()];
        cache.put(SEARCH_NAMESPACE, "rust async", &urls).unwrap();

        let hit: Option<Vec<String>> = cache.get(SEARCH_NAMESPACE, "rust async");
        assert_eq!(hit, Some(urls));
    }

    #[test]
    fn test_missing_key_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let hit: Option<Vec<String>> = cache(dir.path()).get(SEARCH_NAMESPACE, "nothing");
        assert!(hit.is_none());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "k", &1u32).unwrap();
        let other: Option<u32> = cache.get(EMBEDDINGS_NAMESPACE, "k");
        assert!(other.is_none());
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "k", &vec![1, 2, 3]).unwrap();
        let path = cache.entry_path(SEARCH_NAMESPACE, "k");
        std::fs::write(&path, b"{not json").unwrap();

        let hit: Option<Vec<i32>> = cache.get(SEARCH_NAMESPACE, "k");
        assert!(hit.is_none());
    }

    #[test]
    fn test_wrong_shape_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "k", &"a string").unwrap();
        let hit: Option<Vec<f32>> = cache.get(SEARCH_NAMESPACE, "k");
        assert!(hit.is_none());
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::ZERO);
        cache.put(SEARCH_NAMESPACE, "k", &1u8).unwrap();
        let hit: Option<u8> = cache.get(SEARCH_NAMESPACE, "k");
        assert!(hit.is_none());
    }

    #[test]
    fn test_clear_single_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "a", &1).unwrap();
        cache.put(SEARCH_NAMESPACE, "b", &2).unwrap();
        cache.put(EMBEDDINGS_NAMESPACE, "c", &3).unwrap();

        assert_eq!(cache.clear(Some(SEARCH_NAMESPACE)).unwrap(), 2);
        assert!(cache.get::<i32>(SEARCH_NAMESPACE, "a").is_none());
        assert_eq!(cache.get::<i32>(EMBEDDINGS_NAMESPACE, "c"), Some(3));
    }

    #[test]
    fn test_clear_all_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir.path().join("never-created"));
        assert_eq!(cache.clear(None).unwrap(), 0);

        let cache = ResponseCache::new(dir.path(), Duration::from_secs(60));
        cache.put(SEARCH_NAMESPACE, "a", &1).unwrap();
        cache.put(EMBEDDINGS_NAMESPACE, "b", &2).unwrap();
        assert_eq!(cache.clear(None).unwrap(), 2);
    }

    #[test]
    fn test_clear_rejects_namespace_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir.path().join(".cache"));
        cache.put(SEARCH_NAMESPACE, "a", &1).unwrap();
        let manifest = dir.path().join("Cargo.toml");
        std::fs::write(&manifest, "[package]").unwrap();

        for ns in ["..", "../..", "search/..", "", ".", "/tmp"] {
            let result = cache.clear(Some(ns));
            assert!(
                matches!(result, Err(CacheError::InvalidNamespace { .. })),
                "namespace {:?} was accepted",
                ns
            );
        }
        assert!(manifest.exists());
        assert_eq!(cache.get::<i32>(SEARCH_NAMESPACE, "a"), Some(1));
    }

    #[test]
    fn test_put_rejects_nested_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        assert!(cache.put("../escape", "k", &1).is_err());
        assert!(cache.get::<i32>("../escape", "k").is_none());
    }

    #[test]
    fn test_clear_leaves_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "a", &1).unwrap();
        let ns_dir = dir.path().join(SEARCH_NAMESPACE);
        std::fs::write(ns_dir.join(".stale.tmp"), b"partial").unwrap();
        std::fs::write(ns_dir.join("notes.txt"), b"keep me").unwrap();

        assert_eq!(cache.clear(Some(SEARCH_NAMESPACE)).unwrap(), 2);
        assert!(ns_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_stats_counts_per_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(SEARCH_NAMESPACE, "a", &"x").unwrap();
        cache.put(SEARCH_NAMESPACE, "b", &"y").unwrap();
        cache.put(EMBEDDINGS_NAMESPACE, "c", &vec![0.5f32; 4]).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.namespaces[SEARCH_NAMESPACE].entries, 2);
        assert_eq!(stats.namespaces[EMBEDDINGS_NAMESPACE].entries, 1);
        assert_eq!(stats.total_entries(), 3);
        assert!(stats.total_bytes() > 0);
        assert_eq!(stats.namespaces[SEARCH_NAMESPACE].expired, 0);
    }

    #[test]
    fn test_key_hash_is_stable_hex() {
        let h = ResponseCache::key_hash("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, ResponseCache::key_hash("hello"));
        assert_ne!(h, ResponseCache::key_hash("hello "));
    }

    #[test]
    fn test_from_config_disabled() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(ResponseCache::from_config(&config).is_none());
    }
}
