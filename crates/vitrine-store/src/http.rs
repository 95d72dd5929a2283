//! HTTP implementation of [`RecordStore`] over the store's collections API.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use vitrine_core::{Product, ProductIdentity};

use crate::error::StoreError;
use crate::traits::RecordStore;
use crate::types::{
    is_valid_record_id, is_valid_telegram_id, normalize_cart, NewOrder, OrderRecord,
    ProductFilter, ProductRecord, ProfileRecord, ProfileUpdate, RecordPage, RelationKind,
    RelationRecord,
};

/// Upstream page size for full-collection sweeps.
const SWEEP_PER_PAGE: u32 = 2000;
/// Upstream page size for relation collections.
const RELATION_PER_PAGE: u32 = 500;

const PRODUCT_FIELDS: &str =
    "id,name,title,description,photos,images,thumb,price,brand,category,expand.brand,expand.category,updated";
const IDENTITY_FIELDS: &str = "id,name,title,description,brand,category,subcategory";

/// Connection settings for the hosted record store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed record store client.
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StoreError::not_configured("store URL is empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let token = config.token.trim();
        if !token.is_empty() {
            // A token that already carries a scheme is passed verbatim.
            let value = if token.contains(' ') {
                token.to_string()
            } else {
                format!("Bearer {token}")
            };
            let value = HeaderValue::from_str(&value)
                .map_err(|_| StoreError::invalid_input("store token is not a valid header"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(StoreError::from)?;

        Ok(Self { client, base_url })
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(StoreError::http(status.as_u16(), message))
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, String)],
    ) -> Result<RecordPage<T>, StoreError> {
        let response = self
            .client
            .get(self.records_url(collection))
            .query(query)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<RecordPage<T>>().await?)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: &Value,
    ) -> Result<T, StoreError> {
        let response = self
            .client
            .request(method, url)
            .json(body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    fn identity_query(filter: &ProductFilter, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("page", page.to_string()),
            ("perPage", SWEEP_PER_PAGE.to_string()),
            ("filter", filter.to_query()),
            ("sort", "-updated".to_string()),
            ("fields", IDENTITY_FIELDS.to_string()),
        ]
    }

    async fn fetch_identity_page(
        &self,
        filter: &ProductFilter,
        page: u32,
    ) -> Result<RecordPage<ProductRecord>, StoreError> {
        self.fetch_page("products", &Self::identity_query(filter, page))
            .await
    }

    async fn fetch_relations(
        &self,
        kind: RelationKind,
    ) -> Result<Vec<RelationRecord>, StoreError> {
        let query = [
            ("page", "1".to_string()),
            ("perPage", RELATION_PER_PAGE.to_string()),
            ("fields", "id,name,category".to_string()),
            ("sort", "name".to_string()),
        ];
        let page: RecordPage<RelationRecord> =
            self.fetch_page(kind.collection(), &query).await?;
        Ok(page.items)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list_product_identities(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductIdentity>, StoreError> {
        let first = self.fetch_identity_page(filter, 1).await?;
        let total_pages = first.total_pages.max(1);

        let mut records = first.items;
        if total_pages > 1 {
            let rest = join_all(
                (2..=total_pages).map(|page| self.fetch_identity_page(filter, page)),
            )
            .await;
            for page in rest {
                records.extend(page?.items);
            }
        }

        let mut identities: Vec<ProductIdentity> = records
            .into_iter()
            .filter_map(ProductRecord::into_identity)
            .collect();
        identities.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!(
            count = identities.len(),
            pages = total_pages,
            "loaded product identities"
        );
        Ok(identities)
    }

    async fn load_products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let safe_ids: Vec<&String> = ids.iter().filter(|id| is_valid_record_id(id)).collect();
        if safe_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = safe_ids
            .iter()
            .map(|id| format!(r#"id = "{id}""#))
            .collect::<Vec<_>>()
            .join(" || ");
        let query = [
            ("page", "1".to_string()),
            ("perPage", safe_ids.len().to_string()),
            ("filter", filter),
            ("fields", PRODUCT_FIELDS.to_string()),
            ("expand", "brand,category".to_string()),
        ];

        let page: RecordPage<ProductRecord> = self.fetch_page("products", &query).await?;
        let mut by_id: std::collections::HashMap<String, Product> = page
            .items
            .into_iter()
            .filter_map(ProductRecord::into_product)
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let url = format!(
            "{}/api/collections/products/records/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let query = [
            ("fields", format!("{PRODUCT_FIELDS},status")),
            ("expand", "brand,category".to_string()),
        ];
        let response = self.client.get(url).query(&query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let record: ProductRecord = response.json().await?;

        if record.status.as_deref().map(str::trim) != Some("active") {
            return Ok(None);
        }
        Ok(record.into_product())
    }

    async fn list_relations(&self, kind: RelationKind) -> Result<Vec<RelationRecord>, StoreError> {
        match self.fetch_relations(kind).await {
            Ok(items) => Ok(items),
            Err(first_err) => {
                tracing::warn!(
                    collection = kind.collection(),
                    error = %first_err,
                    "relation lookup failed, retrying once"
                );
                self.fetch_relations(kind).await
            }
        }
    }

    async fn get_profile(&self, telegram_id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let tg = telegram_id.trim();
        if !is_valid_telegram_id(tg) {
            return Err(StoreError::invalid_input("invalid telegram id"));
        }

        let query = [
            ("page", "1".to_string()),
            ("perPage", "1".to_string()),
            ("filter", format!(r#"telegramid = "{tg}""#)),
        ];
        let page: RecordPage<ProfileRecord> = self.fetch_page("profiles", &query).await?;
        Ok(page.items.into_iter().next())
    }

    async fn upsert_profile(&self, update: ProfileUpdate) -> Result<ProfileRecord, StoreError> {
        let existing = self.get_profile(&update.telegram_id).await?;

        let profile = match existing {
            Some(profile) => profile,
            None => {
                let body = json!({
                    "telegramid": update.telegram_id.trim(),
                    "username": update.username.trim(),
                    "nickname": update.nickname.trim(),
                    "cart": [],
                    "favorites": [],
                });
                let created: Result<ProfileRecord, StoreError> = self
                    .send_json(Method::POST, self.records_url("profiles"), &body)
                    .await;
                match created {
                    Ok(profile) => profile,
                    // Lost a create race; the record exists now.
                    Err(err) if err.status() == Some(409) => self
                        .get_profile(&update.telegram_id)
                        .await?
                        .ok_or(err)?,
                    Err(err) => return Err(err),
                }
            }
        };

        let mut patch = json!({
            "cart": normalize_cart(update.cart),
            "favorites": update
                .favorites
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>(),
        });
        if !update.username.trim().is_empty() {
            patch["username"] = Value::String(update.username.trim().to_string());
        }
        if !update.nickname.trim().is_empty() {
            patch["nickname"] = Value::String(update.nickname.trim().to_string());
        }

        let url = format!(
            "{}/api/collections/profiles/records/{}",
            self.base_url,
            urlencoding::encode(&profile.id)
        );
        self.send_json(Method::PATCH, url, &patch).await
    }

    async fn create_order(&self, order: NewOrder) -> Result<OrderRecord, StoreError> {
        let body = serde_json::to_value(&order)
            .map_err(|e| StoreError::decode(e.to_string()))?;
        self.send_json(Method::POST, self.records_url("orders"), &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpRecordStore {
        HttpRecordStore::new(&StoreConfig {
            base_url: server.uri(),
            token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn identity_item(id: &str, category: &str) -> Value {
        json!({"id": id, "name": format!("Item {id}"), "category": category})
    }

    #[tokio::test]
    async fn test_identities_fetch_all_pages_and_sort_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/collections/products/records"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1, "perPage": 2000, "totalPages": 2, "totalItems": 3,
                "items": [identity_item("ccc", "x"), identity_item("aaa", "x")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/collections/products/records"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 2, "perPage": 2000, "totalPages": 2, "totalItems": 3,
                "items": [identity_item("bbb", "y")]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let identities = store
            .list_product_identities(&ProductFilter::active_only())
            .await
            .unwrap();

        let ids: Vec<&str> = identities.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
    }

    #[tokio::test]
    async fn test_load_by_ids_preserves_order_and_drops_invalid() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/collections/products/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "aaaaaaaaaaaaaa1", "name": "One"},
                    {"id": "aaaaaaaaaaaaaa2", "name": "Two"}
                ]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let ids = vec![
            "aaaaaaaaaaaaaa2".to_string(),
            "not a valid id!".to_string(),
            "aaaaaaaaaaaaaa1".to_string(),
        ];
        let products = store.load_products_by_ids(&ids).await.unwrap();
        let got: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec!["aaaaaaaaaaaaaa2", "aaaaaaaaaaaaaa1"]);
    }

    #[tokio::test]
    async fn test_load_by_ids_with_no_valid_ids_skips_upstream() {
        let server = MockServer::start().await;
        let store = store_for(&server);
        let products = store
            .load_products_by_ids(&["bogus".to_string()])
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_mapped_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/products/records"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})),
            )
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = store
            .list_product_identities(&ProductFilter::active_only())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(err.is_throttled());
    }

    #[tokio::test]
    async fn test_relations_retry_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/brands/records"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/collections/brands/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "brandaaaaaaaaaa", "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let relations = store.list_relations(RelationKind::Brands).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].name, "Acme");
    }

    #[tokio::test]
    async fn test_get_product_not_found_and_inactive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/products/records/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/collections/products/records/hidden"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "hidden", "name": "Hidden", "status": "draft"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.get_product("gone").await.unwrap().is_none());
        assert!(store.get_product("hidden").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_profile_validates_telegram_id() {
        let server = MockServer::start().await;
        let store = store_for(&server);
        let err = store.get_profile("42; drop").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_create_order_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/orders/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "orderaaaaaaaaaa", "order_number": "12345678", "status": "new"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let record = store
            .create_order(NewOrder {
                telegram_id: "42".to_string(),
                items: vec![],
                total_price: 0.0,
                status: "new".to_string(),
                comment: String::new(),
                order_number: "12345678".to_string(),
                user_data: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(record.id, "orderaaaaaaaaaa");
    }
}
