//! Route result cache bounded by age and total size, persisted through a
//! [`KeyValueSlot`].
//!
//! The whole store is written on every mutation: entries are serialized to
//! JSON, compressed with a [`TextCodec`] and saved under one slot name.
//! Nothing here returns an error to the caller. Storage failures are
//! recovered by eviction, corrupt persisted data by starting empty.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{DeflateCodec, TextCodec};
use crate::geo_key::CacheKey;
use crate::storage::StorageError;
use crate::traits::{Clock, KeyValueSlot};

/// 24 hours.
pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// 10 MiB.
pub const MAX_CACHE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entry age in milliseconds.
    pub ttl_ms: i64,
    /// Upper bound on the sum of entry sizes, in bytes.
    pub max_cache_size: usize,
    /// A single entry may use at most `max_cache_size / max_entry_fraction`.
    pub max_entry_fraction: usize,
    /// Share of entries evicted first when an insert does not fit.
    pub first_eviction_ratio: f64,
    /// Additional share evicted when the first pass was not enough.
    pub second_eviction_ratio: f64,
    /// Share evicted before retrying a failed persist.
    pub persist_eviction_ratio: f64,
    /// Slot name in durable storage.
    pub slot_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            max_cache_size: MAX_CACHE_SIZE,
            max_entry_fraction: 5,
            first_eviction_ratio: 0.2,
            second_eviction_ratio: 0.4,
            persist_eviction_ratio: 0.5,
            slot_name: "route_cache".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn max_entry_size(&self) -> usize {
        self.max_cache_size / self.max_entry_fraction.max(1)
    }
}

/// A cached routing result.
///
/// `payload_size` is the byte length of the serialized payload before
/// compression; quota accounting uses it exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub timestamp: i64,
    pub payload: Value,
    pub payload_size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    entries: &'a BTreeMap<CacheKey, CacheEntry>,
    total_size: usize,
}

/// Persisted `totalSize` is not read back; entries are re-measured on load.
#[derive(Deserialize)]
struct Snapshot {
    entries: BTreeMap<CacheKey, CacheEntry>,
}

#[derive(Debug, Error)]
enum PersistError {
    #[error("cache snapshot could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of writing the store to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    /// The first write failed; `evicted` entries were dropped and the retry worked.
    SavedAfterEviction { evicted: usize },
    /// Both writes failed; the store was emptied and the slot removed or
    /// overwritten with an empty snapshot.
    Cleared,
    /// Emptied in memory, but the slot could not be removed or overwritten.
    GaveUp,
}

/// Result of [`RouteCacheStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored {
        size: usize,
        evicted: usize,
        persist: PersistOutcome,
    },
    /// Larger than the per-entry limit; nothing changed.
    Rejected { size: usize, limit: usize },
    /// Accepted, but lost while recovering from a storage failure.
    Dropped { persist: PersistOutcome },
    /// The payload could not be serialized; treated as a cache miss.
    Unserializable,
}

impl PutOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Stored { .. })
    }
}

impl fmt::Display for PutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutOutcome::Stored { size, evicted: 0, .. } => {
                write!(f, "cached route ({})", format_size(*size))
            }
            PutOutcome::Stored { size, evicted, .. } => write!(
                f,
                "cached route ({}) after evicting {evicted} older entries",
                format_size(*size)
            ),
            PutOutcome::Rejected { size, limit } => write!(
                f,
                "route not cached: {} exceeds the {} entry limit",
                format_size(*size),
                format_size(*limit)
            ),
            PutOutcome::Dropped { .. } => {
                f.write_str("route not cached: storage is full and the cache was reset")
            }
            PutOutcome::Unserializable => f.write_str("route not cached: result is not serializable"),
        }
    }
}

/// Summary returned by [`RouteCacheStore::clear`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearReport {
    pub entry_count: usize,
    pub total_size: usize,
    pub total_size_human: String,
}

impl fmt::Display for ClearReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached routes, {}",
            self.entry_count, self.total_size_human
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: usize,
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistStep {
    Attempt,
    EvictSome,
    Retry { evicted: usize },
    ClearAll,
}

/// TTL- and size-bounded route cache with a single owner.
///
/// Every mutating method performs its read-modify-persist sequence
/// entirely within one `&mut self` call.
#[derive(Debug)]
pub struct RouteCacheStore<S, K, C = DeflateCodec> {
    slot: S,
    clock: K,
    codec: C,
    config: CacheConfig,
    entries: BTreeMap<CacheKey, CacheEntry>,
    total_size: usize,
    stats: CacheStats,
}

impl<S, K> RouteCacheStore<S, K, DeflateCodec>
where
    S: KeyValueSlot,
    K: Clock,
{
    /// Opens the store with default config and the deflate codec.
    pub fn open(slot: S, clock: K) -> Self {
        Self::with_config(slot, clock, DeflateCodec::default(), CacheConfig::default())
    }
}

impl<S, K, C> RouteCacheStore<S, K, C>
where
    S: KeyValueSlot,
    K: Clock,
    C: TextCodec,
{
    /// Opens the store, loading whatever the slot holds.
    ///
    /// Missing, undecodable or unparsable data yields an empty store.
    pub fn with_config(slot: S, clock: K, codec: C, config: CacheConfig) -> Self {
        let mut store = Self {
            slot,
            clock,
            codec,
            config,
            entries: BTreeMap::new(),
            total_size: 0,
            stats: CacheStats::default(),
        };
        store.load();
        store
    }

    fn load(&mut self) {
        let raw = match self.slot.load(&self.config.slot_name) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "route cache unreadable, starting empty");
                return;
            }
        };
        let text = match self.codec.decompress(&raw) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "route cache undecodable, starting empty");
                return;
            }
        };
        match serde_json::from_str::<Snapshot>(&text) {
            Ok(snapshot) => {
                self.entries = snapshot.entries;
                self.measure_loaded_entries();
                let evicted = self.evict_until_fits(0);
                info!(
                    entries = self.entries.len(),
                    total_size = self.total_size,
                    evicted,
                    "route cache loaded"
                );
            }
            Err(err) => {
                warn!(error = %err, "route cache corrupt, starting empty");
            }
        }
    }

    /// Persisted sizes are ignored; every payload is measured again and
    /// entries over the per-entry limit are dropped.
    fn measure_loaded_entries(&mut self) {
        let limit = self.config.max_entry_size();
        self.entries.retain(|key, entry| match serde_json::to_string(&entry.payload) {
            Ok(serialized) if serialized.len() <= limit => {
                entry.payload_size = serialized.len();
                true
            }
            Ok(serialized) => {
                warn!(%key, size = serialized.len(), limit, "dropping oversized cached route");
                false
            }
            Err(err) => {
                warn!(%key, error = %err, "dropping unmeasurable cached route");
                false
            }
        });
        self.recompute_total();
    }

    fn recompute_total(&mut self) {
        self.total_size = self.entries.values().map(|entry| entry.payload_size).sum();
    }

    fn is_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        now.saturating_sub(entry.timestamp) <= self.config.ttl_ms
    }

    /// Returns the payload if present and not older than the TTL.
    ///
    /// Hits do not refresh the entry's timestamp.
    pub fn get(&mut self, key: &CacheKey) -> Option<Value> {
        let now = self.clock.now_millis();
        let payload = self
            .entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.payload.clone());
        if payload.is_some() {
            self.stats.hits += 1;
            debug!(%key, "route cache hit");
        } else {
            self.stats.misses += 1;
            debug!(%key, "route cache miss");
        }
        payload
    }

    pub fn put(&mut self, key: CacheKey, payload: Value) -> PutOutcome {
        let size = match serde_json::to_string(&payload) {
            Ok(serialized) => serialized.len(),
            Err(err) => {
                warn!(%key, error = %err, "route result not serializable, skipping cache");
                return PutOutcome::Unserializable;
            }
        };
        let limit = self.config.max_entry_size();
        if size > limit {
            self.stats.rejected += 1;
            warn!(%key, size, limit, "route result too large to cache");
            return PutOutcome::Rejected { size, limit };
        }

        if let Some(previous) = self.entries.remove(&key) {
            self.total_size -= previous.payload_size;
        }
        let evicted = self.evict_until_fits(size);

        let entry = CacheEntry {
            timestamp: self.clock.now_millis(),
            payload,
            payload_size: size,
        };
        self.entries.insert(key.clone(), entry);
        self.total_size += size;

        let persist = self.persist();
        if self.entries.contains_key(&key) {
            debug!(%key, size, evicted, "route result cached");
            PutOutcome::Stored {
                size,
                evicted,
                persist,
            }
        } else {
            PutOutcome::Dropped { persist }
        }
    }

    /// Removes entries older than the TTL. Persists only if something changed.
    pub fn clean_expired(&mut self) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.config.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.timestamp) <= ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.recompute_total();
            info!(removed, remaining = self.entries.len(), "expired routes removed");
            self.persist();
        }
        removed
    }

    /// `force` wipes everything; otherwise only expired entries go.
    pub fn clear(&mut self, force: bool) -> ClearReport {
        if force {
            let removed = self.entries.len();
            self.entries.clear();
            self.total_size = 0;
            info!(removed, "route cache cleared");
            self.persist();
        } else {
            self.clean_expired();
        }
        ClearReport {
            entry_count: self.entries.len(),
            total_size: self.total_size,
            total_size_human: format_size(self.total_size),
        }
    }

    /// Evicts oldest-first until `incoming` more bytes fit.
    ///
    /// Runs the configured escalating passes first, then single entries.
    fn evict_until_fits(&mut self, incoming: usize) -> usize {
        let limit = self.config.max_cache_size;
        if self.total_size + incoming <= limit {
            return 0;
        }
        let count = self.entries.len();
        let mut evicted = self.evict_oldest(share_of(count, self.config.first_eviction_ratio));
        debug!(evicted, "route cache eviction, first pass");
        if self.total_size + incoming > limit {
            let second = self.evict_oldest(share_of(count, self.config.second_eviction_ratio));
            debug!(evicted = second, "route cache eviction, second pass");
            evicted += second;
        }
        while self.total_size + incoming > limit && !self.entries.is_empty() {
            evicted += self.evict_oldest(1);
        }
        evicted
    }

    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut by_age: Vec<(i64, CacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.timestamp, key.clone()))
            .collect();
        by_age.sort();

        let mut evicted = 0;
        for (_, key) in by_age.into_iter().take(count) {
            if let Some(entry) = self.entries.remove(&key) {
                self.total_size -= entry.payload_size;
                evicted += 1;
            }
        }
        self.stats.evictions += evicted;
        evicted
    }

    fn write_snapshot(&mut self) -> Result<(), PersistError> {
        let snapshot = SnapshotRef {
            entries: &self.entries,
            total_size: self.total_size,
        };
        let json = serde_json::to_string(&snapshot)?;
        let compressed = self.codec.compress(&json);
        self.slot.save(&self.config.slot_name, &compressed)?;
        Ok(())
    }

    /// Attempt → EvictSome → Retry → ClearAll.
    fn persist(&mut self) -> PersistOutcome {
        let mut step = PersistStep::Attempt;
        loop {
            step = match step {
                PersistStep::Attempt => match self.write_snapshot() {
                    Ok(()) => return PersistOutcome::Saved,
                    Err(err) => {
                        warn!(error = %err, "route cache persist failed, evicting");
                        PersistStep::EvictSome
                    }
                },
                PersistStep::EvictSome => {
                    let share = share_of(self.entries.len(), self.config.persist_eviction_ratio);
                    PersistStep::Retry {
                        evicted: self.evict_oldest(share),
                    }
                }
                PersistStep::Retry { evicted } => match self.write_snapshot() {
                    Ok(()) => {
                        info!(evicted, "route cache persisted after eviction");
                        return PersistOutcome::SavedAfterEviction { evicted };
                    }
                    Err(err) => {
                        warn!(error = %err, "route cache persist retry failed, clearing");
                        PersistStep::ClearAll
                    }
                },
                PersistStep::ClearAll => {
                    self.entries.clear();
                    self.total_size = 0;
                    return match self.slot.remove(&self.config.slot_name) {
                        Ok(()) => PersistOutcome::Cleared,
                        Err(err) => {
                            warn!(error = %err, "route cache slot could not be removed");
                            match self.write_snapshot() {
                                Ok(()) => PersistOutcome::Cleared,
                                Err(_) => PersistOutcome::GaveUp,
                            }
                        }
                    };
                }
            };
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Raw entry access, ignoring the TTL and leaving stats untouched.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_size: self.total_size,
            ..self.stats
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut S {
        &mut self.slot
    }
}

/// `ceil(count * ratio)`, at least one when there is anything to take.
fn share_of(count: usize, ratio: f64) -> usize {
    if count == 0 {
        return 0;
    }
    let share = (count as f64 * ratio.clamp(0.0, 1.0)).ceil() as usize;
    share.clamp(1, count)
}

/// Formats a byte count as `B`, `KB` or `MB`.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} B")
    } else if value < MB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{:.2} MB", value / MB)
    }
}
