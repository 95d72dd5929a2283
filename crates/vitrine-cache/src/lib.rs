//! Centralized cache manager with namespace-scoped TTLs.
//!
//! Every cacheable concern in Vitrine (feed pages, facet snapshots,
//! relation id lookups, profile sessions, anti-replay sentinels, shuffle
//! orders, store snapshots) gets its own namespace with its own default
//! time-to-live. The manager is constructed once at startup and injected
//! into the components that need it, so tests get isolated instances.
//!
//! Expiry is advisory: a read past the deadline behaves as a miss and
//! drops the entry. Values are stored as `serde_json::Value`, with typed
//! accessors for callers that know their shape.

pub mod manager;

pub use manager::{ns, CacheManager, CacheStats};
