//! The storage trait the catalog engine is written against.

use async_trait::async_trait;

use vitrine_core::{Product, ProductIdentity};

use crate::error::StoreError;
use crate::types::{
    NewOrder, OrderRecord, ProductFilter, ProfileRecord, ProfileUpdate, RelationKind,
    RelationRecord,
};

/// Access to the hosted record store.
///
/// Implementations must be thread-safe (`Send + Sync`). All listing
/// methods observe only active records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Minimal id+facet projections of every active product matching the
    /// filter, sorted by id ascending (the canonical pre-shuffle order).
    ///
    /// The upstream listing is paginated; implementations fetch the
    /// remaining pages concurrently once the first page reveals the page
    /// count.
    async fn list_product_identities(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductIdentity>, StoreError>;

    /// Hydrate full records for a page of ids, preserving the requested
    /// order. Unknown ids are silently dropped.
    async fn load_products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError>;

    /// A single active product, or `None` when absent or inactive.
    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError>;

    /// All records of a relation collection (brands/categories/
    /// subcategories). Retried exactly once on failure.
    async fn list_relations(&self, kind: RelationKind) -> Result<Vec<RelationRecord>, StoreError>;

    /// Profile for a messenger user id, or `None`.
    async fn get_profile(&self, telegram_id: &str) -> Result<Option<ProfileRecord>, StoreError>;

    /// Create-or-update a profile's cart and favorites.
    async fn upsert_profile(&self, update: ProfileUpdate) -> Result<ProfileRecord, StoreError>;

    /// Persist a submitted order.
    async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, StoreError>;
}
