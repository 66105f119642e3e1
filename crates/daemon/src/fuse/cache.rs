//! TTL cache for the mirror filesystem
//!
//! Holds attributes, directory listings, small file contents and known-missing
//! paths so repeated kernel requests don't hit the source directory. Every
//! entry expires on its own; `invalidate_all` is what a cache clear does.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::state::CacheSettings;

/// Node kinds the mirror exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Directory,
    File,
    Symlink,
}

/// Cached file/directory attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAttr {
    /// Size in bytes
    pub size: u64,
    pub kind: NodeKind,
    /// Permission bits
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

/// Cached directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// Configuration for the file cache
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    /// Maximum cache size in megabytes
    pub max_size_mb: u32,
    /// TTL for metadata (attrs, dirs) in seconds
    pub ttl_secs: u32,
    /// TTL for content cache in seconds (defaults to 5x metadata TTL)
    pub content_ttl_secs: u32,
    /// TTL for negative cache (non-existent paths) in seconds
    pub negative_ttl_secs: u32,
    /// Files larger than this are read through without caching
    pub max_content_bytes: u64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self::from_basic(100, 60)
    }
}

impl FileCacheConfig {
    /// Create config from basic parameters, deriving content and negative TTLs
    pub fn from_basic(max_size_mb: u32, ttl_secs: u32) -> Self {
        Self {
            max_size_mb,
            ttl_secs,
            content_ttl_secs: ttl_secs.saturating_mul(5),
            negative_ttl_secs: ttl_secs.min(10),
            max_content_bytes: 1024 * 1024,
        }
    }

    /// Kernel attribute/entry TTL matching the metadata cache
    pub fn kernel_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs as u64)
    }
}

impl From<&CacheSettings> for FileCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self::from_basic(settings.max_size_mb, settings.ttl_secs)
    }
}

/// TTL cache keyed by source-relative path
#[derive(Clone)]
pub struct FileCache {
    /// Content cache: path → bytes, weighed by length
    content: Cache<String, Arc<Vec<u8>>>,
    /// Attribute cache: path → attributes
    attrs: Cache<String, CachedAttr>,
    /// Directory listing cache: path → entries
    dirs: Cache<String, Arc<Vec<CachedDirEntry>>>,
    /// Negative cache: paths confirmed not to exist
    negative: Cache<String, ()>,
    config: FileCacheConfig,
}

impl FileCache {
    pub fn new(config: FileCacheConfig) -> Self {
        let metadata_ttl = Duration::from_secs(config.ttl_secs as u64);
        let content_ttl = Duration::from_secs(config.content_ttl_secs as u64);
        let negative_ttl = Duration::from_secs(config.negative_ttl_secs as u64);
        let max_bytes = (config.max_size_mb as u64) * 1024 * 1024;

        Self {
            content: Cache::builder()
                .time_to_live(content_ttl)
                .weigher(|_key, value: &Arc<Vec<u8>>| {
                    u32::try_from(value.len()).unwrap_or(u32::MAX)
                })
                .max_capacity(max_bytes)
                .build(),
            attrs: Cache::builder()
                .time_to_live(metadata_ttl)
                .max_capacity(100_000)
                .build(),
            dirs: Cache::builder()
                .time_to_live(metadata_ttl)
                .max_capacity(10_000)
                .build(),
            negative: Cache::builder()
                .time_to_live(negative_ttl)
                .max_capacity(10_000)
                .build(),
            config,
        }
    }

    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    pub fn get_content(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.content.get(&Self::normalize_key(path))
    }

    /// Cache file content unless it is over the per-file limit
    pub fn put_content(&self, path: &str, data: Arc<Vec<u8>>) {
        if data.len() as u64 > self.config.max_content_bytes {
            return;
        }
        self.content.insert(Self::normalize_key(path), data);
    }

    pub fn get_attr(&self, path: &str) -> Option<CachedAttr> {
        self.attrs.get(&Self::normalize_key(path))
    }

    pub fn put_attr(&self, path: &str, attr: CachedAttr) {
        let key = Self::normalize_key(path);
        self.negative.invalidate(&key);
        self.attrs.insert(key, attr);
    }

    pub fn get_dir(&self, path: &str) -> Option<Arc<Vec<CachedDirEntry>>> {
        self.dirs.get(&Self::normalize_key(path))
    }

    /// Cache a directory listing, returning the shared copy
    pub fn put_dir(&self, path: &str, entries: Vec<CachedDirEntry>) -> Arc<Vec<CachedDirEntry>> {
        let entries = Arc::new(entries);
        self.dirs
            .insert(Self::normalize_key(path), Arc::clone(&entries));
        entries
    }

    /// Check if a path is known not to exist
    pub fn is_negative(&self, path: &str) -> bool {
        self.negative.contains_key(&Self::normalize_key(path))
    }

    pub fn put_negative(&self, path: &str) {
        self.negative.insert(Self::normalize_key(path), ());
    }

    /// Invalidate all cached entries
    pub fn invalidate_all(&self) {
        self.content.invalidate_all();
        self.attrs.invalidate_all();
        self.dirs.invalidate_all();
        self.negative.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            content_count: self.content.entry_count(),
            attr_count: self.attrs.entry_count(),
            dir_count: self.dirs.entry_count(),
            negative_count: self.negative.entry_count(),
            max_size_mb: self.config.max_size_mb,
            metadata_ttl_secs: self.config.ttl_secs,
        }
    }

    /// Normalize a path to a consistent cache key
    fn normalize_key(path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path == "/" {
            return "/".to_string();
        }

        let mut key = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if key.len() > 1 && key.ends_with('/') {
            key.pop();
        }

        key
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.config)
            .field("content_count", &self.content.entry_count())
            .field("attr_count", &self.attrs.entry_count())
            .field("dir_count", &self.dirs.entry_count())
            .field("negative_count", &self.negative.entry_count())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub content_count: u64,
    pub attr_count: u64,
    pub dir_count: u64,
    pub negative_count: u64,
    pub max_size_mb: u32,
    pub metadata_ttl_secs: u32,
}
