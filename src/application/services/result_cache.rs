//! Persistent result cache for processed artifacts.
//!
//! Every entry is two records in the blob store sharing one key: a payload
//! (`<key>.blob`) and a JSON metadata record (`<key>.meta`). The metadata is
//! written last and removed first, so it acts as the commit marker. Any
//! state where the two disagree is treated as a miss and deleted.
//!
//! Entries live in a namespace derived from the key version tag. Entries of
//! older versions are never looked up and get purged on open.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::application::services::EventBus;
use crate::domain::entities::{CACHE_KEY_VERSION, CacheEntry, CacheEntryMetadata, CacheKey};
use crate::domain::errors::StoreResult;
use crate::domain::events::PipelineEvent;
use crate::domain::ports::{BlobStorePort, Clock, SystemClock};

/// Default maximum number of cached results.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default maximum entry age in days.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Default limit on the summed payload size, 100 MiB.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 100 * 1024 * 1024;

/// Prefix shared by every result cache namespace.
pub const CACHE_NAMESPACE_PREFIX: &str = "results-";

const METADATA_SUFFIX: &str = ".meta";
const PAYLOAD_SUFFIX: &str = ".blob";

/// Result cache configuration.
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// Maximum number of entries kept after eviction.
    pub max_entries: usize,
    /// Entries older than this are dropped. `None` disables expiry.
    pub max_age: Option<chrono::Duration>,
    /// Limit on the summed payload size. `None` disables it.
    pub max_total_bytes: Option<u64>,
    /// Whether a hit refreshes the entry's `stored_at`.
    pub touch_on_hit: bool,
    /// Namespace version tag.
    pub version: String,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_age: Some(chrono::Duration::days(DEFAULT_MAX_AGE_DAYS)),
            max_total_bytes: Some(DEFAULT_MAX_TOTAL_BYTES),
            touch_on_hit: true,
            version: CACHE_KEY_VERSION.to_string(),
        }
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Namespace in use.
    pub namespace: String,
    /// Number of committed entries.
    pub entries: usize,
    /// Sum of payload sizes.
    pub total_bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache {}: {} entries, {} bytes",
            self.namespace, self.entries, self.total_bytes
        )
    }
}

/// Bounded, persistent cache of processed results.
///
/// Lookups and stores on distinct keys run concurrently. Operations on the
/// same key are serialized, and eviction excludes all of them.
pub struct ResultCache {
    store: Arc<dyn BlobStorePort>,
    config: ResultCacheConfig,
    namespace: String,
    clock: Arc<dyn Clock>,
    events: EventBus,
    key_locks: parking_lot::Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    maintenance: RwLock<()>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("namespace", &self.namespace)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    /// Creates a cache over the given store without touching it.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStorePort>, config: ResultCacheConfig) -> Self {
        let namespace = format!("{CACHE_NAMESPACE_PREFIX}{}", config.version);
        Self {
            store,
            config,
            namespace,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            key_locks: parking_lot::Mutex::new(HashMap::new()),
            maintenance: RwLock::new(()),
        }
    }

    /// Creates a cache and purges namespaces left behind by older versions.
    pub async fn open(store: Arc<dyn BlobStorePort>, config: ResultCacheConfig) -> Self {
        let cache = Self::new(store, config);
        cache.purge_stale_namespaces().await;
        cache
    }

    /// Replaces the clock used for `stored_at` and expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publishes cache events on the given bus.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Returns the namespace entries are stored under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Looks up an entry. Storage failures and partial entries count as misses.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let lock = self.key_lock(key);
        let result = {
            let _key_guard = lock.lock().await;
            let _gate = self.maintenance.read().await;
            self.read_entry(key).await
        };
        self.release_key_lock(key, lock);

        match result {
            Ok(Some(entry)) => {
                trace!(key = %key, "Result cache hit");
                self.events
                    .publish(PipelineEvent::CacheHit { key: key.clone() });
                Some(entry)
            }
            Ok(None) => {
                trace!(key = %key, "Result cache miss");
                self.events
                    .publish(PipelineEvent::CacheMiss { key: key.clone() });
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Result cache read failed, treating as miss");
                self.events
                    .publish(PipelineEvent::CacheMiss { key: key.clone() });
                None
            }
        }
    }

    /// Stores a processed result and then enforces the capacity bound.
    ///
    /// # Errors
    /// Returns error if either record cannot be written. Nothing of the entry
    /// remains in that case.
    pub async fn store(
        &self,
        key: &CacheKey,
        result_blob: Bytes,
        derived_filename: &str,
        source_artifact_name: &str,
    ) -> StoreResult<()> {
        let metadata = CacheEntryMetadata {
            derived_filename: derived_filename.to_string(),
            source_artifact_name: source_artifact_name.to_string(),
            stored_at: self.clock.now(),
            payload_size: result_blob.len() as u64,
        };

        let lock = self.key_lock(key);
        let result = {
            let _key_guard = lock.lock().await;
            let _gate = self.maintenance.read().await;
            self.write_entry(key, result_blob, &metadata).await
        };
        self.release_key_lock(key, lock);

        match result {
            Ok(()) => {
                debug!(key = %key, size = metadata.payload_size, "Stored result in cache");
                self.evict_if_over_capacity().await;
                Ok(())
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store result in cache");
                self.events.publish(PipelineEvent::CacheStoreFailed {
                    key: key.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Drops expired, partial and excess entries, oldest `stored_at` first.
    ///
    /// An entry is excess while the cache holds more than `max_entries` or
    /// its payloads sum to more than `max_total_bytes`. Ties are broken by
    /// key order. Returns the number of entries removed.
    pub async fn evict_if_over_capacity(&self) -> usize {
        let _gate = self.maintenance.write().await;

        let keys = match self.store.list_keys(&self.namespace).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cache entries");
                return 0;
            }
        };

        let mut metadata_stems = Vec::new();
        let mut payload_stems = HashSet::new();
        for key in keys {
            if let Some(stem) = key.strip_suffix(METADATA_SUFFIX) {
                metadata_stems.push(stem.to_string());
            } else if let Some(stem) = key.strip_suffix(PAYLOAD_SUFFIX) {
                payload_stems.insert(stem.to_string());
            }
        }

        let mut removed = 0usize;
        let mut live: Vec<(DateTime<Utc>, CacheKey, u64)> =
            Vec::with_capacity(metadata_stems.len());

        for stem in &metadata_stems {
            let key = CacheKey::from_stored(stem.clone());
            let metadata = match self.store.get(&self.namespace, &metadata_key(&key)).await {
                Ok(Some(raw)) => parse_metadata(&raw),
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read cache metadata");
                    continue;
                }
            };

            match metadata {
                Some(m) if payload_stems.contains(stem) && !self.is_expired(&m) => {
                    live.push((m.stored_at, key, m.payload_size));
                }
                _ => {
                    debug!(key = %key, "Discarding expired or partial cache entry");
                    self.remove_entry(&key).await;
                    removed += 1;
                }
            }
        }

        let committed: HashSet<&str> = metadata_stems.iter().map(String::as_str).collect();
        for orphan in payload_stems
            .iter()
            .filter(|stem| !committed.contains(stem.as_str()))
        {
            let payload = format!("{orphan}{PAYLOAD_SUFFIX}");
            if let Err(e) = self.store.delete(&self.namespace, &payload).await {
                warn!(key = %orphan, error = %e, "Failed to remove orphaned payload");
            }
        }

        live.sort();
        let mut total_bytes: u64 = live.iter().map(|(_, _, size)| size).sum();
        let mut excess = 0;
        for (_, _, size) in &live {
            let over_count = live.len() - excess > self.config.max_entries;
            let over_bytes = self
                .config
                .max_total_bytes
                .is_some_and(|max| total_bytes > max);
            if !over_count && !over_bytes {
                break;
            }
            total_bytes -= size;
            excess += 1;
        }

        if excess > 0 {
            debug!(
                entries = live.len(),
                max_entries = self.config.max_entries,
                max_total_bytes = ?self.config.max_total_bytes,
                evicting = excess,
                "Result cache over capacity, evicting"
            );

            for (_, key, _) in live.drain(..excess) {
                self.remove_entry(&key).await;
                self.events.publish(PipelineEvent::CacheEvicted { key });
                removed += 1;
            }
        }

        removed
    }

    /// Removes every entry of every cache version.
    ///
    /// # Errors
    /// Returns error if the store cannot be enumerated or a namespace cannot be removed.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let _gate = self.maintenance.write().await;

        for namespace in self.store.list_namespaces().await? {
            if namespace.starts_with(CACHE_NAMESPACE_PREFIX) {
                self.store.delete_namespace(&namespace).await?;
                debug!(namespace = %namespace, "Removed cache namespace");
            }
        }

        info!("Cleared result cache");
        Ok(())
    }

    /// Removes namespaces written under other version tags.
    pub async fn purge_stale_namespaces(&self) -> usize {
        let _gate = self.maintenance.write().await;

        let namespaces = match self.store.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cache namespaces");
                return 0;
            }
        };

        let mut purged = 0;
        for namespace in namespaces
            .iter()
            .filter(|n| n.starts_with(CACHE_NAMESPACE_PREFIX) && **n != self.namespace)
        {
            match self.store.delete_namespace(namespace).await {
                Ok(()) => {
                    info!(namespace = %namespace, "Purged stale cache namespace");
                    purged += 1;
                }
                Err(e) => warn!(namespace = %namespace, error = %e, "Failed to purge namespace"),
            }
        }
        purged
    }

    /// Returns occupancy of the current namespace.
    pub async fn stats(&self) -> CacheStats {
        let _gate = self.maintenance.read().await;

        let mut stats = CacheStats {
            namespace: self.namespace.clone(),
            entries: 0,
            total_bytes: 0,
        };

        let keys = match self.store.list_keys(&self.namespace).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cache entries");
                return stats;
            }
        };

        for key in keys.iter().filter(|k| k.ends_with(METADATA_SUFFIX)) {
            if let Ok(Some(raw)) = self.store.get(&self.namespace, key).await
                && let Some(metadata) = parse_metadata(&raw)
            {
                stats.entries += 1;
                stats.total_bytes += metadata.payload_size;
            }
        }
        stats
    }

    async fn read_entry(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>> {
        let Some(raw_metadata) = self.store.get(&self.namespace, &metadata_key(key)).await? else {
            return Ok(None);
        };

        let Some(mut metadata) = parse_metadata(&raw_metadata) else {
            warn!(key = %key, "Malformed cache metadata, discarding entry");
            self.remove_entry(key).await;
            return Ok(None);
        };

        let Some(payload) = self.store.get(&self.namespace, &payload_key(key)).await? else {
            warn!(key = %key, "Cache metadata without payload, discarding entry");
            self.remove_entry(key).await;
            return Ok(None);
        };

        if payload.len() as u64 != metadata.payload_size {
            warn!(
                key = %key,
                expected = metadata.payload_size,
                actual = payload.len(),
                "Cache payload size mismatch, discarding entry"
            );
            self.remove_entry(key).await;
            return Ok(None);
        }

        if self.is_expired(&metadata) {
            debug!(key = %key, "Cache entry expired");
            self.remove_entry(key).await;
            return Ok(None);
        }

        if self.config.touch_on_hit {
            metadata.stored_at = self.clock.now();
            if let Err(e) = self.write_metadata(key, &metadata).await {
                warn!(key = %key, error = %e, "Failed to refresh cache entry timestamp");
            }
        }

        Ok(Some(CacheEntry {
            key: key.clone(),
            result_blob: payload,
            metadata,
        }))
    }

    async fn write_entry(
        &self,
        key: &CacheKey,
        payload: Bytes,
        metadata: &CacheEntryMetadata,
    ) -> StoreResult<()> {
        // Metadata goes last: it commits the entry.
        self.store.delete(&self.namespace, &metadata_key(key)).await?;

        if let Err(e) = self
            .store
            .put(&self.namespace, &payload_key(key), payload)
            .await
        {
            self.remove_entry(key).await;
            return Err(e);
        }

        if let Err(e) = self.write_metadata(key, metadata).await {
            self.remove_entry(key).await;
            return Err(e);
        }

        Ok(())
    }

    async fn write_metadata(&self, key: &CacheKey, metadata: &CacheEntryMetadata) -> StoreResult<()> {
        let raw = serde_json::to_vec(metadata)?;
        self.store
            .put(&self.namespace, &metadata_key(key), Bytes::from(raw))
            .await
    }

    async fn remove_entry(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(&self.namespace, &metadata_key(key)).await {
            warn!(key = %key, error = %e, "Failed to remove cache metadata");
        }
        if let Err(e) = self.store.delete(&self.namespace, &payload_key(key)).await {
            warn!(key = %key, error = %e, "Failed to remove cache payload");
        }
    }

    fn is_expired(&self, metadata: &CacheEntryMetadata) -> bool {
        self.config
            .max_age
            .is_some_and(|max_age| self.clock.now() - metadata.stored_at > max_age)
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.key_locks.lock().entry(key.clone()).or_default().clone()
    }

    fn release_key_lock(&self, key: &CacheKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock();
        // Only the map and `lock` still reference it when no one else waits.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }
}

fn metadata_key(key: &CacheKey) -> String {
    format!("{}{METADATA_SUFFIX}", key.as_str())
}

fn payload_key(key: &CacheKey) -> String {
    format!("{}{PAYLOAD_SUFFIX}", key.as_str())
}

fn parse_metadata(raw: &[u8]) -> Option<CacheEntryMetadata> {
    serde_json::from_slice(raw).ok()
}
