//! File-backed research cache keyed by normalized query text.
//!
//! Each entry lives in its own JSON file named after the query key, so the
//! cache needs no index and survives partial deletion. Expiry is lazy:
//! stale entries are ignored on read and only removed by [`ResearchCache::clear_expired`].

use crate::storage::atomic_write;
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default entry lifetime in minutes (one day).
pub const DEFAULT_TTL_MINUTES: u64 = 1440;

const ENTRY_EXTENSION: &str = "json";

/// One cached research result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Normalized query text
    pub query: String,
    pub result: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Lifetime in minutes
    pub ttl: u64,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(ttl) = i64::try_from(self.ttl)
            .ok()
            .and_then(TimeDelta::try_minutes)
        else {
            return false;
        };
        now.signed_duration_since(self.timestamp) > ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Counters and disk usage reported by [`ResearchCache::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Bytes on disk across all entry files
    pub total_size: u64,
    pub entries_count: usize,
}

/// Lowercase, collapse whitespace runs and trim.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key for a query: the first 16 hex chars of SHA-256 over its normalized form.
pub fn cache_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    hash_hex[..16].to_string()
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// TTL and tag aware cache of free-text results.
///
/// Hit and miss counters are kept in memory for the lifetime of the value.
#[derive(Debug)]
pub struct ResearchCache {
    dir: PathBuf,
    default_ttl: u64,
    hits: u64,
    misses: u64,
}

impl ResearchCache {
    pub fn new(dir: impl Into<PathBuf>, default_ttl_minutes: u64) -> Self {
        Self {
            dir: dir.into(),
            default_ttl: default_ttl_minutes,
            hits: 0,
            misses: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Store a result under the default TTL, replacing any previous entry.
    pub fn set(&self, query: &str, result: &str, tags: &[String]) -> Result<CacheEntry> {
        self.set_with_ttl(query, result, tags, self.default_ttl)
    }

    pub fn set_with_ttl(
        &self,
        query: &str,
        result: &str,
        tags: &[String],
        ttl_minutes: u64,
    ) -> Result<CacheEntry> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(Error::InvalidInput("cache query must not be empty".to_string()));
        }
        if ttl_minutes == 0 {
            return Err(Error::InvalidInput("cache ttl must be positive".to_string()));
        }

        let entry = CacheEntry {
            key: cache_key(&normalized),
            query: normalized,
            result: result.to_string(),
            tags: normalize_tags(tags),
            timestamp: Utc::now(),
            ttl: ttl_minutes,
        };
        self.write_entry(&entry)?;
        info!(key = %entry.key, tags = ?entry.tags, ttl = entry.ttl, "cached research result");
        Ok(entry)
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_string_pretty(entry)?;
        atomic_write(&self.entry_path(&entry.key), json.as_bytes())
    }

    /// Read one entry file. Missing, unreadable and corrupt files are absent.
    fn read_entry(&self, path: &Path) -> Option<CacheEntry> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping corrupt cache entry");
                None
            }
        }
    }

    fn lookup(&self, query: &str) -> Option<CacheEntry> {
        let key = cache_key(query);
        self.read_entry(&self.entry_path(&key))
            .filter(|entry| !entry.is_expired())
    }

    /// Return the cached result for `query` and count a hit or a miss.
    pub fn get(&mut self, query: &str) -> Result<Option<String>> {
        match self.lookup(query) {
            Some(entry) => {
                self.hits += 1;
                debug!(key = %entry.key, "research cache hit");
                Ok(Some(entry.result))
            }
            None => {
                self.misses += 1;
                debug!(query = %normalize_query(query), "research cache miss");
                Ok(None)
            }
        }
    }

    /// Whether a fresh entry exists. Does not touch the counters.
    pub fn has(&self, query: &str) -> Result<bool> {
        Ok(self.lookup(query).is_some())
    }

    /// Paths of every entry file in the cache directory.
    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn entries(&self) -> Result<Vec<(PathBuf, CacheEntry)>> {
        Ok(self
            .entry_files()?
            .into_iter()
            .filter_map(|path| self.read_entry(&path).map(|entry| (path, entry)))
            .collect())
    }

    /// Fresh entries carrying every requested tag, newest first.
    pub fn search(&self, tags: &[String]) -> Result<Vec<CacheEntry>> {
        let wanted = normalize_tags(tags);
        let now = Utc::now();
        let mut found: Vec<CacheEntry> = self
            .entries()?
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired_at(now))
            .filter(|entry| {
                wanted
                    .iter()
                    .all(|tag| entry.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            })
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.key.cmp(&b.key)));
        Ok(found)
    }

    /// Remove every entry file. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let files = self.entry_files()?;
        for path in &files {
            fs::remove_file(path)?;
        }
        info!(removed = files.len(), "cleared research cache");
        Ok(files.len())
    }

    /// Remove only stale entries. Returns the number removed.
    pub fn clear_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for (path, entry) in self.entries()? {
            if entry.is_expired_at(now) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!(removed, "cleared expired research cache entries");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let files = self.entry_files()?;
        let mut total_size = 0;
        for path in &files {
            total_size += fs::metadata(path)?.len();
        }
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        Ok(CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            total_size,
            entries_count: files.len(),
        })
    }
}
