//! On-disk download cache keyed by source URL.
//!
//! Every entry is a single file named `<key>.<ext>` inside the cache
//! directory. Downloads in progress write to `<key>.part` and are renamed
//! into place once complete, so a file with a media extension is always a
//! finished download.
//!
//! Work on a key (download, eviction) is serialized through a per-key lock.
//! Different keys never block each other.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::MediaResult;
use crate::fs_utils::{move_file, remove_if_exists};

/// Suffix of in-progress downloads.
pub const PARTIAL_SUFFIX: &str = "part";

/// Derive the cache key for a source URL.
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

fn is_cache_key(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// A finished download.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// Lock for one key plus the number of guards (holding or waiting) using it.
struct KeySlot {
    lock: Arc<Mutex<()>>,
    users: usize,
}

type LockMap = Arc<StdMutex<HashMap<String, KeySlot>>>;

/// Exclusive hold on one cache key.
///
/// The lock map entry is dropped together with the last holder or waiter,
/// including a waiter whose `lock_key` future was cancelled, so the map only
/// ever contains keys with work in flight.
pub struct KeyGuard {
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(self.guard.take());
        if let Some(slot) = map.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                map.remove(&self.key);
            }
        }
    }
}

/// Registry of finished downloads plus the per-key locks guarding them.
pub struct CacheStore {
    dir: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
    locks: LockMap,
}

impl CacheStore {
    /// Open the cache rooted at `dir`, creating it if needed.
    ///
    /// Leftover `.part` files from an interrupted run are deleted. Finished
    /// files are registered again using their modification time as the
    /// download time.
    pub async fn open(dir: impl Into<PathBuf>) -> MediaResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let mut entries = HashMap::new();
        let mut removed_partials = 0usize;
        let mut read_dir = fs::read_dir(&dir).await?;

        while let Some(item) = read_dir.next_entry().await? {
            let path = item.path();
            let metadata = match item.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if !is_cache_key(stem) {
                continue;
            }

            if ext == PARTIAL_SUFFIX {
                if remove_if_exists(&path).await {
                    removed_partials += 1;
                }
                continue;
            }

            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.insert(
                stem.to_string(),
                CacheEntry {
                    key: stem.to_string(),
                    local_path: path.clone(),
                    size_bytes: metadata.len(),
                    created_at,
                },
            );
        }

        info!(
            "Opened download cache at {} ({} entries, {} partial downloads removed)",
            dir.display(),
            entries.len(),
            removed_partials
        );

        Ok(Self {
            dir,
            entries: RwLock::new(entries),
            locks: Arc::new(StdMutex::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where an in-progress download for `key` is written.
    pub fn partial_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, PARTIAL_SUFFIX))
    }

    pub fn final_path(&self, key: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, extension))
    }

    /// Register interest in `key` without taking its lock yet.
    fn enter(&self, key: &str) -> KeyGuard {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let slot = map.entry(key.to_string()).or_insert_with(|| KeySlot {
            lock: Arc::default(),
            users: 0,
        });
        slot.users += 1;
        KeyGuard {
            key: key.to_string(),
            lock: slot.lock.clone(),
            guard: None,
            locks: self.locks.clone(),
        }
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Safe to cancel: the waiter's registration is released on drop.
    pub async fn lock_key(&self, key: &str) -> KeyGuard {
        let mut held = self.enter(key);
        held.guard = Some(held.lock.clone().lock_owned().await);
        held
    }

    /// Take `key` only if nobody is working on it.
    pub fn try_lock_key(&self, key: &str) -> Option<KeyGuard> {
        let mut held = self.enter(key);
        held.guard = Some(held.lock.clone().try_lock_owned().ok()?);
        Some(held)
    }

    /// Number of keys with a download or eviction in flight.
    pub fn keys_in_flight(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The entry for `key`, if it exists, is younger than `max_age` and its
    /// file is still on disk.
    pub async fn live_entry(&self, key: &str, max_age: Duration) -> Option<CacheEntry> {
        let entry = self.entries.read().await.get(key).cloned()?;
        if entry.is_expired(max_age, Utc::now()) {
            return None;
        }
        if fs::metadata(&entry.local_path).await.is_err() {
            warn!(
                "Cached file for {} disappeared, dropping entry",
                entry.local_path.display()
            );
            self.forget(&entry).await;
            return None;
        }
        Some(entry)
    }

    /// Promote a finished partial download to a cache entry.
    ///
    /// The caller must hold the key lock. A previous entry for the same key
    /// is replaced and its file removed if the path changed.
    pub async fn commit(
        &self,
        key: &str,
        partial: &Path,
        extension: &str,
    ) -> MediaResult<CacheEntry> {
        let final_path = self.final_path(key, extension);
        move_file(partial, &final_path).await?;
        let size_bytes = fs::metadata(&final_path).await?.len();

        let entry = CacheEntry {
            key: key.to_string(),
            local_path: final_path,
            size_bytes,
            created_at: Utc::now(),
        };

        let previous = self
            .entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        if let Some(previous) = previous {
            if previous.local_path != entry.local_path {
                remove_if_exists(&previous.local_path).await;
            }
        }

        Ok(entry)
    }

    /// Snapshot of all registered entries.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop an entry and its file, waiting for any in-flight work on the key.
    pub async fn remove(&self, key: &str) -> MediaResult<bool> {
        let _guard = self.lock_key(key).await;
        let Some(entry) = self.entries.read().await.get(key).cloned() else {
            return Ok(false);
        };

        match fs::remove_file(&entry.local_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.forget(&entry).await;
        Ok(true)
    }

    /// Remove every entry older than `max_age`.
    ///
    /// Keys with a download in flight are skipped; they will be looked at
    /// again on the next sweep. A file that is already gone still counts as
    /// evicted. Any other removal error is logged and the entry kept.
    /// Returns the number of entries removed.
    pub async fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let expired: Vec<CacheEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.is_expired(max_age, now))
            .cloned()
            .collect();

        let mut evicted = 0;
        for entry in expired {
            let Some(_guard) = self.try_lock_key(&entry.key) else {
                debug!("Skipping eviction of {}: download in flight", entry.key);
                continue;
            };

            // The entry may have been refreshed while we were not holding the lock.
            let current = self.entries.read().await.get(&entry.key).cloned();
            if current.as_ref() != Some(&entry) {
                continue;
            }

            match fs::remove_file(&entry.local_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Cached file {} already removed", entry.local_path.display());
                }
                Err(e) => {
                    warn!(
                        "Failed to evict cached file {}: {}",
                        entry.local_path.display(),
                        e
                    );
                    continue;
                }
            }

            self.forget(&entry).await;
            evicted += 1;
        }

        if evicted > 0 {
            info!("Evicted {} cached downloads", evicted);
        }
        crate::metrics::record_evictions(evicted);
        evicted
    }

    /// Remove `entry` from the registry if it is still the registered one.
    async fn forget(&self, entry: &CacheEntry) {
        let mut entries = self.entries.write().await;
        if entries.get(&entry.key) == Some(entry) {
            entries.remove(&entry.key);
        }
    }

    #[cfg(test)]
    async fn backdate(&self, key: &str, age: Duration) {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.created_at = Utc::now() - chrono::Duration::from_std(age).unwrap();
        }
    }
}
