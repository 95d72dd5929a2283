use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Well-known namespace names.
///
/// The set is fixed at construction; using any other name logs a warning
/// and behaves as a miss.
pub mod ns {
    /// Assembled feed pages, keyed by the full filter tuple.
    pub const FEED_PAGES: &str = "feed-pages";
    /// Facet (filter) snapshots.
    pub const FACETS: &str = "facets";
    /// Human name -> record id resolutions for brands/categories/subcategories.
    pub const RELATION_IDS: &str = "relation-ids";
    /// Per-user profile payloads.
    pub const SESSIONS: &str = "sessions";
    /// Order resubmission sentinels.
    pub const ANTI_REPLAY: &str = "anti-replay";
    /// Per-seed ordered id lists for the home feed.
    pub const SHUFFLE_ORDERS: &str = "shuffle-orders";
    /// Individual record snapshots from the upstream store.
    pub const STORE_SNAPSHOT: &str = "store-snapshot";
}

/// (name, default TTL seconds) for every namespace.
const NAMESPACES: &[(&str, u64)] = &[
    (ns::FEED_PAGES, 180),
    (ns::FACETS, 300),
    (ns::RELATION_IDS, 21_600),
    (ns::SESSIONS, 60),
    (ns::ANTI_REPLAY, 600),
    (ns::SHUFFLE_ORDERS, 900),
    (ns::STORE_SNAPSHOT, 300),
];

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

struct NamespaceStore {
    default_ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// Namespaced key/value cache with per-namespace default TTLs.
pub struct CacheManager {
    namespaces: HashMap<&'static str, NamespaceStore>,
    counters: Counters,
}

impl CacheManager {
    /// Create a manager with the fixed namespace set.
    pub fn new() -> Self {
        let namespaces = NAMESPACES
            .iter()
            .map(|&(name, ttl_secs)| {
                (
                    name,
                    NamespaceStore {
                        default_ttl: Duration::from_secs(ttl_secs),
                        entries: DashMap::new(),
                    },
                )
            })
            .collect();
        Self {
            namespaces,
            counters: Counters::default(),
        }
    }

    fn store(&self, namespace: &str) -> Option<&NamespaceStore> {
        let store = self.namespaces.get(namespace);
        if store.is_none() {
            tracing::warn!(namespace, "unknown cache namespace");
        }
        store
    }

    /// Look up a value. Expired entries are removed and count as misses.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let Some(store) = self.store(namespace) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let now = Instant::now();
        if let Some(entry) = store.entries.get(key) {
            if entry.is_expired(now) {
                drop(entry);
                store.entries.remove(key);
                tracing::debug!(namespace, key, "cache entry expired");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Typed lookup; a value that fails to deserialize is treated as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        self.get(namespace, key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Insert a value with the namespace default TTL, or a per-call
    /// override (used for backoff TTLs). Returns false for an unknown
    /// namespace.
    pub fn set(&self, namespace: &str, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let Some(store) = self.store(namespace) else {
            return false;
        };

        let ttl = ttl.unwrap_or(store.default_ttl);
        store.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Typed insert. Serialization failure is logged and dropped.
    pub fn set_as<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.set(namespace, key, v, ttl),
            Err(err) => {
                tracing::warn!(namespace, key, error = %err, "failed to serialize cache value");
                false
            }
        }
    }

    /// Delete a single key. Returns the number of removed entries (0 or 1).
    pub fn del(&self, namespace: &str, key: &str) -> usize {
        let Some(store) = self.store(namespace) else {
            return 0;
        };
        match store.entries.remove(key) {
            Some(_) => {
                tracing::debug!(namespace, key, "cache entry deleted");
                self.counters.deletes.fetch_add(1, Ordering::Relaxed);
                1
            }
            None => 0,
        }
    }

    /// Delete every key matching the regex pattern. Returns the count.
    pub fn invalidate_pattern(&self, namespace: &str, pattern: &str) -> usize {
        let Some(store) = self.store(namespace) else {
            return 0;
        };
        let regex = match Regex::new(pattern) {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(namespace, pattern, error = %err, "invalid invalidation pattern");
                return 0;
            }
        };

        let matching: Vec<String> = store
            .entries
            .iter()
            .filter(|entry| regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in matching {
            if store.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(namespace, pattern, removed, "invalidated cache keys");
            self.counters
                .deletes
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Drop every entry in one namespace.
    pub fn flush_namespace(&self, namespace: &str) {
        if let Some(store) = self.store(namespace) {
            let n = store.entries.len();
            store.entries.clear();
            if n > 0 {
                tracing::info!(namespace, flushed = n, "flushed cache namespace");
                self.counters.deletes.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    /// Drop every entry in every namespace.
    pub fn flush_all(&self) {
        for name in self.namespaces.keys() {
            self.flush_namespace(name);
        }
    }

    /// Flush everything derived from product data.
    pub fn invalidate_products(&self) {
        self.flush_namespace(ns::FEED_PAGES);
        self.flush_namespace(ns::SHUFFLE_ORDERS);
        self.flush_namespace(ns::STORE_SNAPSHOT);
        self.flush_namespace(ns::FACETS);
    }

    /// Flush cached brand/category/subcategory id resolutions.
    pub fn invalidate_relations(&self) {
        self.flush_namespace(ns::RELATION_IDS);
    }

    /// Remove expired entries eagerly so key counts are accurate.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        for (name, store) in &self.namespaces {
            let before = store.entries.len();
            store.entries.retain(|_, entry| !entry.is_expired(now));
            let purged = before - store.entries.len();
            if purged > 0 {
                tracing::debug!(namespace = *name, purged, "purged expired cache entries");
            }
        }
    }

    /// Counters plus live per-namespace key counts.
    pub fn stats(&self) -> CacheStats {
        self.purge_expired();
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            namespaces: self
                .namespaces
                .iter()
                .map(|(name, store)| (name.to_string(), store.entries.len()))
                .collect(),
        }
    }

    /// Total live keys across all namespaces.
    pub fn total_keys(&self) -> usize {
        self.namespaces.values().map(|s| s.entries.len()).sum()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("namespaces", &self.namespaces.len())
            .field("total_keys", &self.total_keys())
            .finish()
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    #[serde(serialize_with = "two_decimals")]
    pub hit_rate: f64,
    pub namespaces: BTreeMap<String, usize>,
}

fn two_decimals<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((v * 100.0).round() / 100.0)
}
