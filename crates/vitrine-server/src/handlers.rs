use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use vitrine_auth::{order_fingerprint, validate, TrustCredential, WebAppUser};
use vitrine_cache::ns;
use vitrine_catalog::{FacetSnapshot, FeedFilter};
use vitrine_core::{normalize_description, ApiError, FeedPage, Product};
use vitrine_store::{CartItem, NewOrder, OrderLine, OrderUserData, ProfileUpdate};

use crate::error::AppError;
use crate::state::AppState;

const CATALOG_CACHE_CONTROL: &str = "s-maxage=300, stale-while-revalidate=600";

// =============================================================================
// Service endpoints
// =============================================================================

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Vitrine Storefront API",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats();
    let body = json!({
        "status": "ok",
        "cache": {
            "healthy": true,
            "totalKeys": stats.namespaces.values().sum::<usize>(),
            "hitRate": stats.hit_rate,
        },
    });
    (StatusCode::OK, Json(body))
}

pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.stats())
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    #[serde(rename = "type")]
    kind: String,
}

pub async fn cache_invalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InvalidateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let expected = state
        .config
        .auth
        .admin_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match (expected, provided) {
        (Some(expected), Some(provided)) if expected == provided => {}
        _ => return Err(ApiError::auth("Unauthorized").into()),
    }

    match body.kind.as_str() {
        "products" => state.cache.invalidate_products(),
        "relations" => state.cache.invalidate_relations(),
        "all" => state.cache.flush_all(),
        other => {
            return Err(ApiError::validation(format!("unknown cache type: {other}")).into());
        }
    }

    Ok(Json(json!({ "success": true, "invalidated": body.kind })))
}

// =============================================================================
// Catalog endpoints
// =============================================================================

pub async fn catalog_filters(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot: FacetSnapshot = state.facets.get_facets().await;
    (
        [(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
        Json(snapshot),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedQuery {
    page: Option<u32>,
    #[serde(rename = "perPage")]
    per_page: Option<u32>,
    seed: Option<String>,
    search: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
}

pub async fn external_products(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(40).clamp(1, 200);
    let seed = query.seed.unwrap_or_default();

    let filter = FeedFilter {
        search: query.search.unwrap_or_default(),
        brand: query.brand.unwrap_or_default(),
        category: query.category.unwrap_or_default(),
        subcategory: query.subcategory.unwrap_or_default(),
    };

    let feed_page: FeedPage = state.feed.get_page(&filter, &seed, page, per_page).await?;
    Ok((
        [(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
        Json(feed_page),
    ))
}

pub async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let id = id.trim().to_string();
    let cache_key = format!("product:{id}");

    if let Some(cached) = state.cache.get_as::<Product>(ns::STORE_SNAPSHOT, &cache_key) {
        return Ok(Json(cached));
    }

    let mut product = state
        .store
        .get_product(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("product {id}")))?;
    product.description = normalize_description(&product.description);

    state
        .cache
        .set_as(ns::STORE_SNAPSHOT, &cache_key, &product, None);
    Ok(Json(product))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "initData", default)]
    init_data: String,
    #[serde(default)]
    items: Vec<OrderItemRequest>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(rename = "hasPrice", default)]
    has_price: Option<bool>,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub ok: bool,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

/// Clamp and filter submitted line items; drops items without an id.
fn normalize_order_items(items: Vec<OrderItemRequest>) -> Vec<OrderLine> {
    items
        .into_iter()
        .filter_map(|item| {
            let id: String = item.id.trim().chars().take(80).collect();
            if id.is_empty() {
                return None;
            }
            let title: String = item
                .title
                .unwrap_or_default()
                .trim()
                .chars()
                .take(120)
                .collect();
            let quantity = item.quantity.unwrap_or(1).clamp(1, 99);
            let has_price = item.has_price.unwrap_or(true);
            let price = item
                .price
                .filter(|p| has_price && p.is_finite() && *p > 0.0);

            Some(OrderLine {
                id,
                title,
                quantity,
                has_price: price.is_some(),
                price,
            })
        })
        .collect()
}

fn order_total(items: &[OrderLine]) -> f64 {
    items
        .iter()
        .filter_map(|item| item.price.map(|p| p * f64::from(item.quantity)))
        .sum()
}

fn truncated_comment(comment: Option<String>) -> String {
    comment
        .unwrap_or_default()
        .trim()
        .chars()
        .take(1000)
        .collect()
}

pub async fn submit_order(
    State(state): State<AppState>,
    Json(body): Json<OrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let Some(secret) = signing_secret(&state) else {
        return Err(ApiError::not_configured("order submission is disabled").into());
    };

    if body.items.is_empty() {
        return Err(ApiError::validation("order has no items").into());
    }

    // Credential first: the replay guard is keyed by the authenticated
    // user id, never by raw request identity.
    let credential: TrustCredential = validate(
        &body.init_data,
        secret,
        state.config.auth.order_init_data_max_age_secs,
    )?;
    let user: WebAppUser = credential
        .require_user()
        .map_err(|_| ApiError::validation("invalid user data"))?
        .clone();
    let user_id = user.id.to_string();

    let items = normalize_order_items(body.items);
    if items.is_empty() {
        return Err(ApiError::validation("order has no valid items").into());
    }

    let fingerprint = order_fingerprint(
        items
            .iter()
            .map(|item| (item.id.as_str(), item.quantity)),
    );
    if !state.replay.should_accept(&user_id, &fingerprint) {
        return Err(
            ApiError::conflict("Order was already submitted. Refresh the app and try again.")
                .into(),
        );
    }
    state.replay.record(&user_id, &fingerprint);

    let total = order_total(&items);
    let order_number = {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("{:08}", millis % 100_000_000)
    };

    let record = state
        .store
        .create_order(NewOrder {
            telegram_id: user_id.clone(),
            items,
            total_price: total,
            status: "new".to_string(),
            comment: truncated_comment(body.comment),
            order_number: order_number.clone(),
            user_data: OrderUserData {
                username: user.username.clone().unwrap_or_default(),
                first_name: user.first_name.clone().unwrap_or_default(),
                last_name: user.last_name.clone().unwrap_or_default(),
            },
        })
        .await?;

    tracing::info!(
        user_id = %user_id,
        order_id = %record.id,
        "order accepted"
    );

    let order_id = if record.id.is_empty() {
        order_number
    } else {
        record.id
    };
    Ok(Json(OrderResponse { ok: true, order_id }))
}

// =============================================================================
// Profile state
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileStateRequest {
    cart: Vec<CartItem>,
    favorites: Vec<String>,
    nickname: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStateResponse {
    pub ok: bool,
    #[serde(rename = "profileExists")]
    pub profile_exists: bool,
    pub cart: Vec<CartItem>,
    pub favorites: Vec<String>,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The configured signing secret, unless blank or absent.
fn signing_secret(state: &AppState) -> Option<&str> {
    state
        .config
        .auth
        .bot_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validate the header credential and extract the authenticated user.
fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<WebAppUser, AppError> {
    let Some(secret) = signing_secret(state) else {
        return Err(ApiError::not_configured("profile endpoints are disabled").into());
    };

    let init_data = headers
        .get("x-telegram-init-data")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let credential = validate(init_data, secret, state.config.auth.init_data_max_age_secs)?;
    let user = credential
        .require_user()
        .map_err(|_| ApiError::validation("invalid user data"))?
        .clone();
    Ok(user)
}

pub async fn profile_state_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileStateResponse>, AppError> {
    let user = authenticated_user(&state, &headers)?;
    let telegram_id = user.id.to_string();
    let cache_key = format!("profile:{telegram_id}");

    if let Some(cached) = state
        .cache
        .get_as::<ProfileStateResponse>(ns::SESSIONS, &cache_key)
    {
        return Ok(Json(cached));
    }

    let profile = state.store.get_profile(&telegram_id).await?;
    let payload = ProfileStateResponse {
        ok: true,
        profile_exists: profile.is_some(),
        cart: profile.as_ref().map(|p| p.cart.clone()).unwrap_or_default(),
        favorites: profile
            .as_ref()
            .map(|p| p.favorites.clone())
            .unwrap_or_default(),
        nickname: profile.map(|p| p.nickname).unwrap_or_default(),
        username: None,
    };

    state.cache.set_as(ns::SESSIONS, &cache_key, &payload, None);
    Ok(Json(payload))
}

pub async fn profile_state_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileStateRequest>,
) -> Result<Json<ProfileStateResponse>, AppError> {
    let user = authenticated_user(&state, &headers)?;
    let telegram_id = user.id.to_string();

    let nickname = body
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| user.nickname());
    let username = body
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| user.username.clone())
        .unwrap_or_default();

    let updated = state
        .store
        .upsert_profile(ProfileUpdate {
            telegram_id: telegram_id.clone(),
            username: username.clone(),
            nickname: nickname.clone(),
            cart: body.cart,
            favorites: body.favorites,
        })
        .await?;

    state
        .cache
        .del(ns::SESSIONS, &format!("profile:{telegram_id}"));

    Ok(Json(ProfileStateResponse {
        ok: true,
        profile_exists: true,
        cart: updated.cart,
        favorites: updated.favorites,
        nickname: if updated.nickname.is_empty() {
            nickname
        } else {
            updated.nickname
        },
        username: Some(if updated.username.is_empty() {
            username
        } else {
            updated.username
        }),
    }))
}
