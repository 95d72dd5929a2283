//! Wire types for the record store's collections API, and the mapping
//! from raw records to the catalog data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vitrine_core::{Product, ProductIdentity};

/// Fallback gallery image for records without photos.
const PLACEHOLDER_IMAGE: &str =
    "https://images.unsplash.com/photo-1542291026-7eec264c27ff?w=1000";

/// Record ids are exactly 15 lowercase-alphanumeric characters. Anything
/// else never reaches a query filter.
pub fn is_valid_record_id(id: &str) -> bool {
    id.len() == 15
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Messenger user ids are 1..=20 digits.
pub fn is_valid_telegram_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id.len() <= 20 && id.bytes().all(|b| b.is_ascii_digit())
}

/// Relation collections the catalog resolves names against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Brands,
    Categories,
    Subcategories,
}

impl RelationKind {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Brands => "brands",
            Self::Categories => "categories",
            Self::Subcategories => "subcategories",
        }
    }
}

/// One record from a relation collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Subcategories carry their parent category relation.
    #[serde(default)]
    pub category: String,
}

/// One page of an upstream collection listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPage<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(rename = "perPage", default)]
    pub per_page: u32,
    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
    #[serde(rename = "totalItems", default)]
    pub total_items: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Validated product query filter; only shape-checked record ids are
/// accepted, so the rendered filter string cannot be injected into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub brand_id: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
}

impl ProductFilter {
    pub fn active_only() -> Self {
        Self::default()
    }

    /// Render the upstream filter expression.
    pub fn to_query(&self) -> String {
        let mut parts = vec![r#"status = "active""#.to_string()];
        if let Some(id) = &self.brand_id {
            parts.push(format!(r#"brand = "{id}""#));
        }
        if let Some(id) = &self.category_id {
            parts.push(format!(r#"category = "{id}""#));
        }
        if let Some(id) = &self.subcategory_id {
            parts.push(format!(r#"subcategory = "{id}""#));
        }
        parts.join(" && ")
    }
}

// =============================================================================
// Raw product records
// =============================================================================

/// A product record as the store returns it, with every legacy field
/// variant the catalog has ever stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub thumbs: Option<String>,
    #[serde(default)]
    pub expand: Option<ProductExpand>,
}

/// Expanded relation objects attached by the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductExpand {
    #[serde(default)]
    pub brand: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
}

/// Best human label for an expanded relation record.
fn pick_record_label(record: &Value) -> String {
    let Some(obj) = record.as_object() else {
        return String::new();
    };
    for key in ["name", "title", "label", "slug"] {
        if let Some(v) = obj.get(key).and_then(Value::as_str) {
            let v = v.trim();
            if !v.is_empty() {
                return v.to_string();
            }
        }
    }
    obj.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

impl ProductRecord {
    fn record_id(&self) -> String {
        let explicit = trimmed(&self.product_id);
        if !explicit.is_empty() {
            return explicit;
        }
        self.id.trim().to_string()
    }

    fn brand_label(&self) -> String {
        if let Some(expand) = &self.expand {
            if let Some(brand) = &expand.brand {
                let label = pick_record_label(brand);
                if !label.is_empty() {
                    return label;
                }
            }
        }
        trimmed(&self.brand)
    }

    fn category_label(&self) -> String {
        if let Some(expand) = &self.expand {
            if let Some(category) = &expand.category {
                let label = pick_record_label(category);
                if !label.is_empty() {
                    return label;
                }
            }
        }
        trimmed(&self.category)
    }

    fn display_name(&self, product_id: &str) -> String {
        for candidate in [&self.name, &self.title] {
            let v = trimmed(candidate);
            if !v.is_empty() {
                return v;
            }
        }
        product_id.to_string()
    }

    fn gallery(&self) -> Vec<String> {
        let raw = [&self.images, &self.photos]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .cloned()
            .unwrap_or_default();

        let mut seen = Vec::new();
        for url in raw {
            let url = url.trim().to_string();
            if !url.is_empty() && !seen.contains(&url) {
                seen.push(url);
            }
        }
        if seen.is_empty() {
            seen.push(PLACEHOLDER_IMAGE.to_string());
        }
        seen
    }

    /// Normalize into the catalog's `Product`, or `None` for records
    /// without a usable id.
    pub fn into_product(self) -> Option<Product> {
        let id = self.record_id();
        if id.is_empty() {
            return None;
        }

        let name = self.display_name(&id);
        let brand = self.brand_label();
        let price = self.price.filter(|p| p.is_finite()).unwrap_or(0.0);
        let thumb = {
            let t = trimmed(&self.thumb);
            if t.is_empty() { trimmed(&self.thumbs) } else { t }
        };

        Some(Product {
            product_id: id.clone(),
            title: name.clone(),
            name: name.clone(),
            season_title: brand.clone(),
            brand,
            category: self.category_label(),
            description: trimmed(&self.description),
            status: trimmed(&self.status),
            price,
            images: self.gallery(),
            thumb,
            in_stock: true,
            id,
        })
    }

    /// Minimal ordering/search projection.
    pub fn into_identity(self) -> Option<ProductIdentity> {
        let id = self.record_id();
        if id.is_empty() {
            return None;
        }
        let title = self.display_name(&id);
        Some(ProductIdentity {
            category: self.category_label(),
            brand: self.brand_label(),
            subcategory: trimmed(&self.subcategory),
            description: trimmed(&self.description),
            title,
            id,
        })
    }
}

// =============================================================================
// Profiles and orders
// =============================================================================

/// One line of a stored cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "hasPrice", default)]
    pub has_price: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: u32,
}

/// Drop cart lines without id/name and clamp quantities into 1..=99.
pub fn normalize_cart(items: Vec<CartItem>) -> Vec<CartItem> {
    items
        .into_iter()
        .filter_map(|mut item| {
            item.id = item.id.trim().to_string();
            item.name = item.name.trim().to_string();
            if item.id.is_empty() || item.name.is_empty() {
                return None;
            }
            item.quantity = item.quantity.clamp(1, 99);
            if !item.has_price || !item.price.is_finite() || item.price <= 0.0 {
                item.has_price = false;
                item.price = 0.0;
            }
            Some(item)
        })
        .collect()
}

/// Stored user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "telegramid", default)]
    pub telegram_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub cart: Vec<CartItem>,
    #[serde(default)]
    pub favorites: Vec<String>,
}

/// Requested profile mutation.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub telegram_id: String,
    pub username: String,
    pub nickname: String,
    pub cart: Vec<CartItem>,
    pub favorites: Vec<String>,
}

/// One submitted order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub quantity: u32,
    #[serde(rename = "hasPrice", default)]
    pub has_price: bool,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Order payload persisted to the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub telegram_id: String,
    pub items: Vec<OrderLine>,
    pub total_price: f64,
    pub status: String,
    #[serde(default)]
    pub comment: String,
    pub order_number: String,
    pub user_data: OrderUserData,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderUserData {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Persisted order, as the store returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_price: f64,
}
