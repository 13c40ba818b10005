//! Route cache behaviour over whole operation sequences.
//!
//! Uses a manual clock and an in-memory slot so TTL and eviction run
//! without wall-clock waits or real storage.

use serde_json::{Value, json};

use dispatch_routing::cache::{
    CacheConfig, DEFAULT_TTL_MS, MAX_CACHE_SIZE, PersistOutcome, PutOutcome, RouteCacheStore,
};
use dispatch_routing::clock::ManualClock;
use dispatch_routing::codec::{DeflateCodec, PassthroughCodec, TextCodec};
use dispatch_routing::geo_key::{CacheKey, Coordinate, RoutingPolicy, build_key};
use dispatch_routing::storage::MemorySlot;
use dispatch_routing::traits::{Clock, KeyValueSlot};

// ============================================================================
// Helpers
// ============================================================================

fn route_key(seed: u32) -> CacheKey {
    let offset = f64::from(seed) * 0.001;
    build_key(
        Coordinate::new(-115.17 + offset, 36.10),
        Coordinate::new(-115.15, 36.12 + offset),
        &[],
        &RoutingPolicy::Fastest,
    )
}

fn route_payload(points: usize) -> Value {
    let path: Vec<[f64; 2]> = (0..points)
        .map(|i| [-115.17 + i as f64 * 1e-4, 36.10 + i as f64 * 1e-4])
        .collect();
    json!({
        "status": "1",
        "routes": [{"distance": 1200, "time": 240, "steps": [{"instruction": "go", "path": path}]}]
    })
}

fn assert_invariants<S: KeyValueSlot, K: Clock, C: TextCodec>(store: &RouteCacheStore<S, K, C>) {
    let sum: usize = store.entries().map(|(_, entry)| entry.payload_size).sum();
    assert_eq!(store.total_size(), sum, "total size must equal the sum of entry sizes");
    assert!(store.total_size() <= store.config().max_cache_size);
}

/// Cheap pseudo-random sequence so runs are reproducible.
fn lcg(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state >> 33
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn size_invariant_holds_across_random_operations() {
    let clock = ManualClock::new(0);
    let config = CacheConfig {
        max_cache_size: 64 * 1024,
        ..CacheConfig::default()
    };
    let mut store =
        RouteCacheStore::with_config(MemorySlot::new(), clock.clone(), DeflateCodec::default(), config);

    let mut state = 42;
    for _ in 0..400 {
        match lcg(&mut state) % 10 {
            0 => {
                store.clear(false);
            }
            1 => {
                clock.advance(DEFAULT_TTL_MS / 3);
                store.clean_expired();
            }
            2 => {
                store.slot_mut().fail_next_saves((lcg(&mut state) % 3) as usize);
                store.put(route_key((lcg(&mut state) % 50) as u32), route_payload(20));
            }
            _ => {
                let points = (lcg(&mut state) % 400) as usize + 1;
                store.put(route_key((lcg(&mut state) % 50) as u32), route_payload(points));
            }
        }
        clock.advance(1_000);
        assert_invariants(&store);
    }
}

#[test]
fn ttl_expiry_boundaries() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut store = RouteCacheStore::open(MemorySlot::new(), clock.clone());
    store.put(route_key(1), route_payload(3));

    clock.advance(DEFAULT_TTL_MS - 1);
    assert!(store.get(&route_key(1)).is_some());

    clock.advance(2);
    assert!(store.get(&route_key(1)).is_none());
}

#[test]
fn oversized_payload_never_cached() {
    let mut store = RouteCacheStore::open(MemorySlot::new(), ManualClock::new(0));
    store.put(route_key(1), route_payload(5));
    let before = store.total_size();

    let huge = Value::String("r".repeat(MAX_CACHE_SIZE / 5 + 1));
    let outcome = store.put(route_key(2), huge);

    assert!(matches!(outcome, PutOutcome::Rejected { .. }));
    assert!(store.get(&route_key(2)).is_none());
    assert_eq!(store.total_size(), before);
}

#[test]
fn compression_round_trips_large_random_payloads() {
    let codec = DeflateCodec::default();
    let mut state = 7;
    for length in [0, 1, 17, 4_096, 200_000] {
        let text: String = (0..length)
            .map(|_| char::from_u32((lcg(&mut state) % 0x24F) as u32 + 0x20).unwrap_or('?'))
            .collect();
        assert_eq!(codec.decompress(&codec.compress(&text)).unwrap(), text);
        assert_eq!(PassthroughCodec.decompress(&PassthroughCodec.compress(&text)).unwrap(), text);
    }
}

#[test]
fn persisted_store_is_compressed_and_reloadable() {
    let clock = ManualClock::new(0);
    let mut store = RouteCacheStore::open(MemorySlot::new(), clock.clone());
    for seed in 0..10 {
        store.put(route_key(seed), route_payload(200));
    }
    let persisted = store.slot().get("route_cache").unwrap().to_string();
    assert!(persisted.starts_with("z:"));
    assert!(persisted.len() < store.total_size());

    let reloaded = RouteCacheStore::open(store.slot().clone(), clock.clone());
    assert_eq!(reloaded.len(), 10);
    assert_eq!(reloaded.total_size(), store.total_size());
    let (original, restored) = (
        store.entry(&route_key(3)).unwrap(),
        reloaded.entry(&route_key(3)).unwrap(),
    );
    assert_eq!(restored.timestamp, original.timestamp);
    assert_eq!(restored.payload_size, original.payload_size);
    assert_eq!(restored.payload["routes"][0]["distance"], 1200);
}

#[test]
fn storage_quota_failure_never_leaves_store_inconsistent() {
    let clock = ManualClock::new(0);
    let mut store = RouteCacheStore::with_config(
        MemorySlot::with_quota(8 * 1024),
        clock.clone(),
        PassthroughCodec,
        CacheConfig::default(),
    );
    for seed in 0..40 {
        let outcome = store.put(route_key(seed), route_payload(30));
        assert!(
            !matches!(outcome, PutOutcome::Dropped { persist: PersistOutcome::GaveUp }),
            "{outcome:?}"
        );
        clock.advance(10);
        assert_invariants(&store);

        let reloaded = RouteCacheStore::with_config(
            store.slot().clone(),
            clock.clone(),
            PassthroughCodec,
            CacheConfig::default(),
        );
        assert_eq!(reloaded.len(), store.len(), "memory and storage diverged");
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn put_get_expire_clear_scenario() {
    let clock = ManualClock::new(0);
    let mut store = RouteCacheStore::open(MemorySlot::new(), clock.clone());
    assert!(store.is_empty());

    let key = route_key(9);
    let route_a = route_payload(12);
    assert!(store.put(key.clone(), route_a.clone()).is_stored());

    clock.advance(DEFAULT_TTL_MS / 2);
    assert_eq!(store.get(&key), Some(route_a));

    clock.advance(DEFAULT_TTL_MS);
    assert_eq!(store.get(&key), None);

    let report = store.clear(false);
    assert_eq!(report.entry_count, 0);
    assert_eq!(report.total_size_human, "0 B");
    assert!(store.is_empty());

    let reloaded = RouteCacheStore::open(store.slot().clone(), clock.clone());
    assert!(reloaded.is_empty(), "empty store must have been persisted");
    assert!(store.slot().get("route_cache").is_some());
}
