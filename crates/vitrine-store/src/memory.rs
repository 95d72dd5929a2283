//! In-memory [`RecordStore`] used by unit and integration tests.
//!
//! Seed it with identities, products and relations, then point the
//! catalog engine at it. Failure knobs drive the degradation paths:
//! `fail_reads` makes every listing call fail, `fail_hydration` only the
//! id-hydration call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use vitrine_core::{Product, ProductIdentity};

use crate::error::StoreError;
use crate::traits::RecordStore;
use crate::types::{
    normalize_cart, NewOrder, OrderRecord, ProductFilter, ProfileRecord, ProfileUpdate,
    RelationKind, RelationRecord,
};

#[derive(Default)]
struct Inner {
    identities: Vec<ProductIdentity>,
    products: HashMap<String, Product>,
    relations: HashMap<RelationKind, Vec<RelationRecord>>,
    profiles: HashMap<String, ProfileRecord>,
    orders: Vec<NewOrder>,
    fail_reads: Option<StoreError>,
    fail_hydration: Option<StoreError>,
    order_seq: u64,
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ordering/search projection.
    pub fn with_identity(self, identity: ProductIdentity) -> Self {
        self.inner.lock().unwrap().identities.push(identity);
        self
    }

    /// Register a hydratable full record.
    pub fn with_product(self, product: Product) -> Self {
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(product.id.clone(), product);
        self
    }

    /// Register a product plus an identity derived from its fields.
    pub fn with_catalog_product(self, product: Product) -> Self {
        let identity = ProductIdentity {
            id: product.id.clone(),
            category: product.category.clone(),
            brand: product.brand.clone(),
            subcategory: String::new(),
            title: product.title.clone(),
            description: product.description.clone(),
        };
        self.with_identity(identity).with_product(product)
    }

    pub fn with_relations(self, kind: RelationKind, records: Vec<RelationRecord>) -> Self {
        self.inner.lock().unwrap().relations.insert(kind, records);
        self
    }

    pub fn with_profile(self, profile: ProfileRecord) -> Self {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(profile.telegram_id.clone(), profile);
        self
    }

    /// Make every listing/read call fail until cleared.
    pub fn set_fail_reads(&self, err: Option<StoreError>) {
        self.inner.lock().unwrap().fail_reads = err;
    }

    /// Make only id-hydration fail until cleared.
    pub fn set_fail_hydration(&self, err: Option<StoreError>) {
        self.inner.lock().unwrap().fail_hydration = err;
    }

    /// Orders persisted so far.
    pub fn orders(&self) -> Vec<NewOrder> {
        self.inner.lock().unwrap().orders.clone()
    }

    fn matches(identity: &ProductIdentity, filter: &ProductFilter) -> bool {
        if let Some(brand) = &filter.brand_id {
            if &identity.brand != brand {
                return false;
            }
        }
        if let Some(category) = &filter.category_id {
            if &identity.category != category {
                return false;
            }
        }
        if let Some(subcategory) = &filter.subcategory_id {
            if &identity.subcategory != subcategory {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_product_identities(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductIdentity>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }
        let mut items: Vec<ProductIdentity> = inner
            .identities
            .iter()
            .filter(|identity| Self::matches(identity, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn load_products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = inner.fail_hydration.as_ref().or(inner.fail_reads.as_ref()) {
            return Err(err.clone());
        }
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }
        Ok(inner
            .products
            .get(id.trim())
            .filter(|p| p.status == "active")
            .cloned())
    }

    async fn list_relations(&self, kind: RelationKind) -> Result<Vec<RelationRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }
        Ok(inner.relations.get(&kind).cloned().unwrap_or_default())
    }

    async fn get_profile(&self, telegram_id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }
        Ok(inner.profiles.get(telegram_id.trim()).cloned())
    }

    async fn upsert_profile(&self, update: ProfileUpdate) -> Result<ProfileRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }

        let telegram_id = update.telegram_id.trim().to_string();
        let entry = inner
            .profiles
            .entry(telegram_id.clone())
            .or_insert_with(|| ProfileRecord {
                id: format!("profile-{telegram_id}"),
                telegram_id: telegram_id.clone(),
                ..Default::default()
            });

        entry.cart = normalize_cart(update.cart);
        entry.favorites = update
            .favorites
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if !update.username.trim().is_empty() {
            entry.username = update.username.trim().to_string();
        }
        if !update.nickname.trim().is_empty() {
            entry.nickname = update.nickname.trim().to_string();
        }
        Ok(entry.clone())
    }

    async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fail_reads {
            return Err(err.clone());
        }
        inner.order_seq += 1;
        let record = OrderRecord {
            id: format!("order{:010}", inner.order_seq),
            order_number: order.order_number.clone(),
            status: order.status.clone(),
            total_price: order.total_price,
        };
        inner.orders.push(order);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, category: &str, brand: &str) -> ProductIdentity {
        ProductIdentity {
            id: id.to_string(),
            category: category.to_string(),
            brand: brand.to_string(),
            subcategory: String::new(),
            title: format!("Item {id}"),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_identities_are_filtered_and_sorted() {
        let store = InMemoryRecordStore::new()
            .with_identity(identity("p3", "cat-a", "brand-x"))
            .with_identity(identity("p1", "cat-a", "brand-y"))
            .with_identity(identity("p2", "cat-b", "brand-x"));

        let all = store
            .list_product_identities(&ProductFilter::active_only())
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);

        let filtered = store
            .list_product_identities(&ProductFilter {
                brand_id: Some("brand-x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<&str> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3"]);
    }

    #[tokio::test]
    async fn test_fail_reads_knob() {
        let store = InMemoryRecordStore::new();
        store.set_fail_reads(Some(StoreError::http(429, "throttled")));
        let err = store
            .list_product_identities(&ProductFilter::active_only())
            .await
            .unwrap_err();
        assert!(err.is_throttled());

        store.set_fail_reads(None);
        assert!(store
            .list_product_identities(&ProductFilter::active_only())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_upsert_profile_creates_then_updates() {
        let store = InMemoryRecordStore::new();
        let created = store
            .upsert_profile(ProfileUpdate {
                telegram_id: "42".to_string(),
                username: "jane".to_string(),
                nickname: "Jane".to_string(),
                cart: vec![],
                favorites: vec!["p1".to_string(), " ".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(created.favorites, vec!["p1"]);

        let updated = store
            .upsert_profile(ProfileUpdate {
                telegram_id: "42".to_string(),
                username: String::new(),
                nickname: String::new(),
                cart: vec![],
                favorites: vec![],
            })
            .await
            .unwrap();
        // Blank username/nickname do not clobber stored values.
        assert_eq!(updated.username, "jane");
        assert!(updated.favorites.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_assigns_ids() {
        let store = InMemoryRecordStore::new();
        let record = store
            .create_order(NewOrder {
                telegram_id: "42".to_string(),
                items: vec![],
                total_price: 10.0,
                status: "new".to_string(),
                comment: String::new(),
                order_number: "00000001".to_string(),
                user_data: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(record.id, "order0000000001");
        assert_eq!(store.orders().len(), 1);
    }
}
