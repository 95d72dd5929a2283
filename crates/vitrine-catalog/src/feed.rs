//! Feed assembly: the paginated, deterministically ordered product feed.
//!
//! Two paths share one pagination/hydration tail. The "home" path (no
//! filters) orders the full catalog once per seed and caches the id list;
//! the filtered path resolves human filter names to record ids, narrows
//! the identity set upstream, token-matches the search text, then
//! shuffles under the seed. Pages are cached per full parameter tuple, so
//! concatenating pages drawn from one cached order yields the whole feed
//! with no duplicates and no omissions.

use std::sync::Arc;

use vitrine_cache::{ns, CacheManager};
use vitrine_core::{mix_by_group, paginate, shuffle, FeedPage, Product, ProductIdentity};
use vitrine_store::{ProductFilter, RecordStore, RelationKind};

use crate::error::CatalogError;
use crate::relations::resolve_relation_id;

/// Hard cap on the page size, matching the HTTP surface.
const MAX_PER_PAGE: u32 = 200;

/// Normalized feed request filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub search: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
}

impl FeedFilter {
    /// Collapse search whitespace and trim every field.
    pub fn normalized(&self) -> Self {
        Self {
            search: self.search.split_whitespace().collect::<Vec<_>>().join(" "),
            brand: self.brand.trim().to_string(),
            category: self.category.trim().to_string(),
            subcategory: self.subcategory.trim().to_string(),
        }
    }

    /// The unfiltered home feed uses the cached per-seed global order.
    pub fn is_home(&self) -> bool {
        self.search.is_empty()
            && self.brand.is_empty()
            && self.category.is_empty()
            && self.subcategory.is_empty()
    }

    fn search_tokens(&self) -> Vec<String> {
        self.search
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Builds and paginates the product feed.
pub struct FeedAssembler {
    cache: Arc<CacheManager>,
    store: Arc<dyn RecordStore>,
}

impl FeedAssembler {
    pub fn new(cache: Arc<CacheManager>, store: Arc<dyn RecordStore>) -> Self {
        Self { cache, store }
    }

    /// Assemble one feed page.
    ///
    /// Upstream failures during hydration propagate; everything cacheable
    /// before that point (relation ids, the per-seed order) has already
    /// been stored, so a retry is cheap.
    pub async fn get_page(
        &self,
        filter: &FeedFilter,
        seed: &str,
        page: u32,
        per_page: u32,
    ) -> Result<FeedPage, CatalogError> {
        let filter = filter.normalized();
        let seed = seed.trim();
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let cache_key = format!(
            "feed:{}:{}:{}:{}:{}:{}:{}",
            filter.search, filter.brand, filter.category, filter.subcategory, seed, page, per_page
        );
        if let Some(cached) = self.cache.get_as::<FeedPage>(ns::FEED_PAGES, &cache_key) {
            return Ok(cached.normalize_descriptions());
        }

        let assembled = if filter.is_home() {
            self.home_page(seed, page, per_page).await?
        } else {
            self.filtered_page(&filter, seed, page, per_page).await?
        };

        self.cache
            .set_as(ns::FEED_PAGES, &cache_key, &assembled, None);
        Ok(assembled)
    }

    /// Unfiltered feed: one globally mixed order per seed.
    async fn home_page(
        &self,
        seed: &str,
        page: u32,
        per_page: u32,
    ) -> Result<FeedPage, CatalogError> {
        let order_key = format!("order:home:{seed}");
        let ordered_ids: Vec<String> = match self
            .cache
            .get_as::<Vec<String>>(ns::SHUFFLE_ORDERS, &order_key)
        {
            Some(ids) => ids,
            None => {
                // Identities arrive canonically sorted by id; the mixer
                // diversifies adjacent categories under the seed.
                let identities = self
                    .store
                    .list_product_identities(&ProductFilter::active_only())
                    .await?;
                let mixed = mix_by_group(&identities, seed, |identity| identity.category.as_str());
                let ids: Vec<String> = mixed.into_iter().map(|identity| identity.id).collect();
                self.cache
                    .set_as(ns::SHUFFLE_ORDERS, &order_key, &ids, None);
                tracing::debug!(seed, count = ids.len(), "built home feed order");
                ids
            }
        };

        self.page_from_ids(&ordered_ids, page, per_page).await
    }

    /// Filtered feed: upstream narrowing plus token search, seeded shuffle.
    async fn filtered_page(
        &self,
        filter: &FeedFilter,
        seed: &str,
        page: u32,
        per_page: u32,
    ) -> Result<FeedPage, CatalogError> {
        // A filter name that resolves to nothing is an empty result, not
        // an error.
        let mut product_filter = ProductFilter::active_only();
        if !filter.brand.is_empty() {
            match resolve_relation_id(&self.cache, &self.store, RelationKind::Brands, &filter.brand)
                .await?
            {
                Some(id) => product_filter.brand_id = Some(id),
                None => return Ok(FeedPage::empty(per_page)),
            }
        }
        if !filter.category.is_empty() {
            match resolve_relation_id(
                &self.cache,
                &self.store,
                RelationKind::Categories,
                &filter.category,
            )
            .await?
            {
                Some(id) => product_filter.category_id = Some(id),
                None => return Ok(FeedPage::empty(per_page)),
            }
        }
        if !filter.subcategory.is_empty() {
            match resolve_relation_id(
                &self.cache,
                &self.store,
                RelationKind::Subcategories,
                &filter.subcategory,
            )
            .await?
            {
                Some(id) => product_filter.subcategory_id = Some(id),
                None => return Ok(FeedPage::empty(per_page)),
            }
        }

        let identities = self.store.list_product_identities(&product_filter).await?;

        let tokens = filter.search_tokens();
        let mut matched: Vec<ProductIdentity> = identities
            .into_iter()
            .filter(|identity| {
                if tokens.is_empty() {
                    return true;
                }
                let haystack = identity.search_haystack();
                tokens.iter().all(|token| haystack.contains(token.as_str()))
            })
            .collect();

        if !seed.is_empty() {
            matched = shuffle(&matched, seed);
        }

        let ids: Vec<String> = matched.into_iter().map(|identity| identity.id).collect();
        self.page_from_ids(&ids, page, per_page).await
    }

    /// Slice the requested window out of an ordered id list and hydrate it.
    async fn page_from_ids(
        &self,
        ordered_ids: &[String],
        page: u32,
        per_page: u32,
    ) -> Result<FeedPage, CatalogError> {
        let window = paginate(ordered_ids.len() as u64, page, per_page);
        let page_ids = ordered_ids[window.start..window.end].to_vec();

        let products = self.store.load_products_by_ids(&page_ids).await?;
        let items: Vec<Product> = products.into_iter().map(Product::into_page_item).collect();

        Ok(FeedPage {
            products: items,
            page: window.page,
            per_page: window.per_page,
            total_pages: window.total_pages,
            total_items: window.total_items,
            has_next_page: window.has_next_page(),
        })
    }
}
