//! At-most-once acceptance of order submissions.
//!
//! A submission's fingerprint is fully determined by its `{id, quantity}`
//! line items, sorted, so reordering the cart does not produce a second
//! "different" submission. The guard is keyed by the authenticated user
//! id; the same user may submit a different cart at any time, and another
//! user is never blocked by someone else's fingerprint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use vitrine_cache::{ns, CacheManager};

/// Canonical fingerprint of a submission's line items.
pub fn order_fingerprint<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    let mut pairs: Vec<String> = items
        .into_iter()
        .map(|(id, quantity)| format!("{id}:{quantity}"))
        .collect();
    pairs.sort_unstable();
    pairs.join("|")
}

/// Replay window over the anti-replay cache namespace.
#[derive(Clone)]
pub struct ReplayGuard {
    cache: Arc<CacheManager>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(600),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key(user_id: &str, fingerprint: &str) -> String {
        format!("order:{user_id}:{fingerprint}")
    }

    /// True when no matching submission is inside the replay window.
    pub fn should_accept(&self, user_id: &str, fingerprint: &str) -> bool {
        self.cache
            .get(ns::ANTI_REPLAY, &Self::key(user_id, fingerprint))
            .is_none()
    }

    /// Record an accepted submission. Visible to every subsequent
    /// [`ReplayGuard::should_accept`] call until the TTL elapses.
    pub fn record(&self, user_id: &str, fingerprint: &str) {
        self.cache.set(
            ns::ANTI_REPLAY,
            &Self::key(user_id, fingerprint),
            Value::Bool(true),
            Some(self.ttl),
        );
    }
}
