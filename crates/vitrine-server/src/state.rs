use std::sync::Arc;
use std::time::Duration;

use vitrine_auth::ReplayGuard;
use vitrine_cache::CacheManager;
use vitrine_catalog::{FacetAggregator, FeedAssembler};
use vitrine_store::RecordStore;

use crate::config::AppConfig;

/// Shared application state injected into every handler.
///
/// Constructed once at startup; tests build their own with an in-memory
/// or mock-backed store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<CacheManager>,
    pub store: Arc<dyn RecordStore>,
    pub feed: Arc<FeedAssembler>,
    pub facets: Arc<FacetAggregator>,
    pub replay: ReplayGuard,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        let replay_ttl = Duration::from_secs(config.auth.replay_ttl_secs);
        let config = Arc::new(config);
        let cache = Arc::new(CacheManager::new());
        let feed = Arc::new(FeedAssembler::new(cache.clone(), store.clone()));
        let facets = Arc::new(FacetAggregator::new(cache.clone(), store.clone()));
        let replay = ReplayGuard::new(cache.clone()).with_ttl(replay_ttl);

        Self {
            config,
            cache,
            store,
            feed,
            facets,
            replay,
        }
    }
}
