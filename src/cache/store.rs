use crate::cache::types::*;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Temp files older than this are leftovers from an interrupted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

/// Derive the cache key for a query.
///
/// Only result-affecting options participate, after defaults are applied, so
/// option sets that produce the same upstream request share a key.
pub fn cache_key(query: &str, options: &SearchOptions) -> String {
    let effective = options.effective();
    let mut hasher = Sha256::new();

    hash_field(&mut hasher, "query", query.trim());
    hash_field(&mut hasher, "count", &effective.count.to_string());
    hash_field(
        &mut hasher,
        "domain",
        effective.domain_filter.as_deref().unwrap_or_default(),
    );
    hash_field(&mut hasher, "recency", effective.recency_filter.as_str());
    hash_field(&mut hasher, "content_size", effective.content_size.as_str());

    hex::encode(hasher.finalize())
}

/// Length-prefixed so no field value can pass for a field boundary.
fn hash_field(hasher: &mut Sha256, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// TTL-expiring, file-per-entry search result cache.
///
/// Cheap to clone; clones share the directory, the in-process lock and the
/// maintenance guard.
#[derive(Debug, Clone)]
pub struct SearchCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    dir: PathBuf,
    lock: RwLock<()>,
    maintenance: Arc<Mutex<()>>,
}

enum Lookup {
    Hit(CacheEntry),
    Missing,
    Corrupt(String),
    Unreadable(String),
}

impl SearchCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                dir: dir.into(),
                lock: RwLock::new(()),
                maintenance: Arc::new(Mutex::new(())),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.inner.dir.join(format!("{}.{}", hash, ENTRY_EXTENSION))
    }

    /// Cached results for `query`, or `None` on a miss.
    ///
    /// Missing, unreadable and expired entries are all misses; each one also
    /// nudges a background cleanup sweep.
    pub async fn get(&self, query: &str, options: &SearchOptions) -> Option<Vec<SearchResult>> {
        let hash = cache_key(query, options);
        let path = self.entry_path(&hash);

        let lookup = {
            let _guard = self.inner.lock.read().await;
            read_entry(&path).await
        };

        match lookup {
            Lookup::Hit(entry) if entry.hash != hash => {
                warn!(path = %path.display(), "Cache entry hash mismatch, ignoring");
            }
            Lookup::Hit(entry) if entry.is_expired(Utc::now()) => {
                debug!(query, expired_at = %entry.expires_at, "Cache entry expired");
            }
            Lookup::Hit(entry) => {
                debug!(query, results = entry.results.len(), "Cache hit");
                return Some(entry.results);
            }
            Lookup::Missing => {
                debug!(query, "Cache miss");
            }
            Lookup::Corrupt(reason) | Lookup::Unreadable(reason) => {
                warn!(path = %path.display(), reason = %reason, "Unreadable cache entry");
            }
        }

        self.trigger_cleanup();
        None
    }

    /// Store `results` for `query` for `ttl`.
    ///
    /// The entry is written to a temporary file and renamed into place, so
    /// concurrent readers see either the old entry or the new one.
    pub async fn set(
        &self,
        query: &str,
        options: &SearchOptions,
        results: Vec<SearchResult>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl)?;
        let cached_at = Utc::now();
        let expires_at = cached_at
            .checked_add_signed(ttl)
            .ok_or(CacheError::InvalidTtl)?;

        let hash = cache_key(query, options);
        let entry = CacheEntry {
            query: query.to_string(),
            results,
            cached_at,
            expires_at,
            hash: hash.clone(),
        };
        let data = serde_json::to_vec_pretty(&entry)?;

        let _guard = self.inner.lock.write().await;
        async_fs::create_dir_all(&self.inner.dir).await?;

        let final_path = self.entry_path(&hash);
        let temp_path = self.inner.dir.join(format!(
            ".{}.{}.{}",
            hash,
            uuid::Uuid::new_v4(),
            TEMP_EXTENSION
        ));

        if let Err(e) = write_synced(&temp_path, &data).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = async_fs::rename(&temp_path, &final_path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(query, hash = %hash, bytes = data.len(), "Cached search results");
        Ok(())
    }

    /// Remove every entry. Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let _guard = self.inner.lock.write().await;
        if !async_fs::try_exists(&self.inner.dir).await? {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = async_fs::read_dir(&self.inner.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match file_kind(&path) {
                Some(FileKind::Entry) => {
                    async_fs::remove_file(&path).await?;
                    removed += 1;
                }
                Some(FileKind::Temp) => {
                    async_fs::remove_file(&path).await?;
                }
                None => {}
            }
        }

        info!(removed, dir = %self.inner.dir.display(), "Cleared search cache");
        Ok(removed)
    }

    /// Delete expired and corrupt entries plus stale temp files.
    ///
    /// Waits for any background sweep to finish first. Per-file failures are
    /// logged and counted without stopping the sweep.
    pub async fn cleanup(&self) -> Result<CleanupStats, CacheError> {
        let _maintenance = self.inner.maintenance.lock().await;
        self.sweep().await
    }

    /// Start a background sweep unless one is already running. Extra
    /// requests while a sweep runs are dropped.
    pub fn trigger_cleanup(&self) {
        let Ok(guard) = self.inner.maintenance.clone().try_lock_owned() else {
            debug!("Cache cleanup already running, skipping");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let cache = self.clone();
        runtime.spawn(async move {
            let _guard = guard;
            if let Err(e) = cache.sweep().await {
                warn!("Background cache cleanup failed: {}", e);
            }
        });
    }

    async fn sweep(&self) -> Result<CleanupStats, CacheError> {
        let _guard = self.inner.lock.write().await;
        let mut stats = CleanupStats::default();

        if !async_fs::try_exists(&self.inner.dir).await? {
            return Ok(stats);
        }

        let now = Utc::now();
        let mut entries = async_fs::read_dir(&self.inner.dir).await?;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read cache directory entry: {}", e);
                    stats.errors += 1;
                    break;
                }
            };
            let path = entry.path();

            match file_kind(&path) {
                Some(FileKind::Entry) => {
                    stats.scanned += 1;
                    match read_entry(&path).await {
                        Lookup::Hit(cached) if !cached.is_expired(now) => {}
                        Lookup::Hit(_) => {
                            if remove_logged(&path, "expired").await {
                                stats.removed_expired += 1;
                            } else {
                                stats.errors += 1;
                            }
                        }
                        Lookup::Corrupt(_) => {
                            if remove_logged(&path, "corrupt").await {
                                stats.removed_corrupt += 1;
                            } else {
                                stats.errors += 1;
                            }
                        }
                        Lookup::Unreadable(reason) => {
                            warn!(path = %path.display(), reason = %reason, "Skipping unreadable cache entry");
                            stats.errors += 1;
                        }
                        Lookup::Missing => {}
                    }
                }
                Some(FileKind::Temp) => {
                    if is_stale(&path).await {
                        if remove_logged(&path, "stale temp").await {
                            stats.removed_temp += 1;
                        } else {
                            stats.errors += 1;
                        }
                    }
                }
                None => {}
            }
        }

        let removed = stats.removed_expired + stats.removed_corrupt + stats.removed_temp;
        if removed > 0 {
            info!(
                expired = stats.removed_expired,
                corrupt = stats.removed_corrupt,
                temp = stats.removed_temp,
                "Cleaned up search cache"
            );
        }
        Ok(stats)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let _guard = self.inner.lock.read().await;
        let mut stats = CacheStats {
            directory: self.inner.dir.clone(),
            ..Default::default()
        };

        if !async_fs::try_exists(&self.inner.dir).await? {
            return Ok(stats);
        }

        let now = Utc::now();
        let mut entries = async_fs::read_dir(&self.inner.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if file_kind(&path) != Some(FileKind::Entry) {
                continue;
            }

            stats.total_entries += 1;
            if let Ok(metadata) = entry.metadata().await {
                stats.total_bytes += metadata.len();
            }
            match read_entry(&path).await {
                Lookup::Hit(cached) if cached.is_expired(now) => stats.expired_entries += 1,
                Lookup::Hit(_) | Lookup::Missing => {}
                Lookup::Corrupt(_) | Lookup::Unreadable(_) => stats.corrupt_entries += 1,
            }
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Entry,
    Temp,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_str()?;
    let extension = path.extension()?.to_str()?;
    if extension == TEMP_EXTENSION && name.starts_with('.') {
        Some(FileKind::Temp)
    } else if extension == ENTRY_EXTENSION && !name.starts_with('.') {
        Some(FileKind::Entry)
    } else {
        None
    }
}

async fn read_entry(path: &Path) -> Lookup {
    let content = match async_fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Lookup::Missing,
        Err(e) => return Lookup::Unreadable(e.to_string()),
    };

    match serde_json::from_slice::<CacheEntry>(&content) {
        Ok(entry) => Lookup::Hit(entry),
        Err(e) => Lookup::Corrupt(e.to_string()),
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = async_fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

async fn is_stale(path: &Path) -> bool {
    match async_fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified
            .elapsed()
            .map(|age| age > STALE_TEMP_AGE)
            .unwrap_or(false),
        Err(_) => false,
    }
}

async fn remove_logged(path: &Path, reason: &str) -> bool {
    match async_fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), reason, "Removed cache file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), reason, "Failed to remove cache file: {}", e);
            false
        }
    }
}
