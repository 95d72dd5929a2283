//! Facet aggregation with stale-data fallback and exponential backoff.
//!
//! The snapshot lists every filterable dimension (categories, brands,
//! subcategories) plus the per-category indexes. Brand co-occurrence
//! comes from the products themselves; subcategory membership comes from
//! the subcategory collection's own category relation. Upstream failure
//! never reaches the caller: the aggregator serves the last good snapshot
//! (or an empty one before the first success) under a short TTL, growing
//! exponentially while the store keeps throttling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use vitrine_cache::{ns, CacheManager};
use vitrine_store::{ProductFilter, RecordStore, RelationKind, StoreError};

const FACETS_CACHE_KEY: &str = "catalog-facets:v1";
/// TTL for a successfully built snapshot.
const SUCCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// TTL for fallbacks after a non-throttling failure.
const FAILURE_TTL: Duration = Duration::from_secs(60);
/// Backoff ceiling while the store keeps throttling.
const MAX_BACKOFF_SECS: u64 = 300;

/// The filter index snapshot served to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSnapshot {
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub subcategories: Vec<String>,
    #[serde(rename = "brandsByCategory")]
    pub brands_by_category: BTreeMap<String, Vec<String>>,
    #[serde(rename = "subcategoriesByCategory")]
    pub subcategories_by_category: BTreeMap<String, Vec<String>>,
}

/// Process-wide fallback state, owned by the aggregator instance.
#[derive(Debug, Default)]
struct FallbackState {
    last_good: Option<FacetSnapshot>,
    error_streak: u32,
}

/// Capped exponential backoff TTL for a given error streak.
fn backoff_ttl(streak: u32) -> Duration {
    let secs = 2u64
        .checked_pow(streak)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Builds facet snapshots and degrades gracefully on upstream failure.
pub struct FacetAggregator {
    cache: Arc<CacheManager>,
    store: Arc<dyn RecordStore>,
    state: Mutex<FallbackState>,
}

impl FacetAggregator {
    pub fn new(cache: Arc<CacheManager>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            cache,
            store,
            state: Mutex::new(FallbackState::default()),
        }
    }

    /// Consecutive failed rebuilds since the last success.
    pub fn error_streak(&self) -> u32 {
        self.state.lock().error_streak
    }

    /// The current snapshot. Infallible: on upstream failure the last
    /// good snapshot (or an empty one) is cached under a short TTL and
    /// returned.
    pub async fn get_facets(&self) -> FacetSnapshot {
        if let Some(cached) = self
            .cache
            .get_as::<FacetSnapshot>(ns::FACETS, FACETS_CACHE_KEY)
        {
            return cached;
        }

        match self.build_snapshot().await {
            Ok(snapshot) => {
                {
                    let mut state = self.state.lock();
                    state.error_streak = 0;
                    state.last_good = Some(snapshot.clone());
                }
                self.cache
                    .set_as(ns::FACETS, FACETS_CACHE_KEY, &snapshot, Some(SUCCESS_TTL));
                snapshot
            }
            Err(err) => {
                let (fallback, ttl) = {
                    let mut state = self.state.lock();
                    let ttl = if err.is_throttled() {
                        state.error_streak += 1;
                        backoff_ttl(state.error_streak)
                    } else {
                        FAILURE_TTL
                    };
                    (state.last_good.clone().unwrap_or_default(), ttl)
                };
                tracing::warn!(
                    error = %err,
                    ttl_secs = ttl.as_secs(),
                    "facet rebuild failed, serving fallback snapshot"
                );
                self.cache
                    .set_as(ns::FACETS, FACETS_CACHE_KEY, &fallback, Some(ttl));
                fallback
            }
        }
    }

    async fn build_snapshot(&self) -> Result<FacetSnapshot, StoreError> {
        let identities = self
            .store
            .list_product_identities(&ProductFilter::active_only())
            .await?;
        let brand_records = self.store.list_relations(RelationKind::Brands).await?;
        let category_records = self.store.list_relations(RelationKind::Categories).await?;
        let subcategory_records = self
            .store
            .list_relations(RelationKind::Subcategories)
            .await?;

        let brand_names: HashMap<&str, &str> = brand_records
            .iter()
            .map(|r| (r.id.as_str(), r.name.trim()))
            .collect();
        let category_names: HashMap<&str, &str> = category_records
            .iter()
            .map(|r| (r.id.as_str(), r.name.trim()))
            .collect();

        // Distinct names actually in use on active products.
        let mut categories = BTreeSet::new();
        let mut brands = BTreeSet::new();
        let mut brands_by_category: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for identity in &identities {
            let category = category_names
                .get(identity.category.as_str())
                .copied()
                .filter(|name| !name.is_empty());
            let brand = brand_names
                .get(identity.brand.as_str())
                .copied()
                .filter(|name| !name.is_empty());

            if let Some(category) = category {
                categories.insert(category.to_string());
                if let Some(brand) = brand {
                    brands_by_category
                        .entry(category.to_string())
                        .or_default()
                        .insert(brand.to_string());
                }
            }
            if let Some(brand) = brand {
                brands.insert(brand.to_string());
            }
        }

        // Subcategory membership comes from the subcategory records'
        // own category relation, not from product co-occurrence.
        let mut subcategories = BTreeSet::new();
        let mut subcategories_by_category: BTreeMap<String, BTreeSet<String>> = categories
            .iter()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        for record in &subcategory_records {
            let name = record.name.trim();
            if name.is_empty() {
                continue;
            }
            subcategories.insert(name.to_string());
            if let Some(category) = category_names
                .get(record.category.as_str())
                .copied()
                .filter(|c| !c.is_empty())
            {
                if let Some(bucket) = subcategories_by_category.get_mut(category) {
                    bucket.insert(name.to_string());
                }
            }
        }

        Ok(FacetSnapshot {
            categories: categories.into_iter().collect(),
            brands: brands.into_iter().collect(),
            subcategories: subcategories.into_iter().collect(),
            brands_by_category: brands_by_category
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            subcategories_by_category: subcategories_by_category
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
        })
    }
}
