//! Product and feed data model.
//!
//! `Product` is the fully hydrated record served to clients; it carries the
//! legacy aliases (`product_id`, `name`, `season_title`) the storefront
//! frontend still reads, filled in at mapping time. `ProductIdentity` is the
//! minimal projection used for ordering and search without hydrating full
//! records.

use serde::{Deserialize, Serialize};

/// Fully hydrated catalog record, as served on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub name: String,
    pub brand: String,
    pub season_title: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub thumb: String,
    #[serde(rename = "inStock", default)]
    pub in_stock: bool,
}

impl Product {
    /// Preview image for list views: explicit thumb wins, else the first
    /// gallery image, else empty.
    pub fn preview_thumb(&self) -> String {
        let thumb = self.thumb.trim();
        if !thumb.is_empty() {
            return thumb.to_string();
        }
        self.images
            .first()
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    /// Replace the thumb with the derived preview and normalize the
    /// description for client display.
    pub fn into_page_item(mut self) -> Self {
        self.thumb = self.preview_thumb();
        self.description = normalize_description(&self.description);
        self
    }
}

/// Minimal projection used for ordering and token search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl ProductIdentity {
    /// Lowercased haystack for whitespace-token search.
    pub fn search_haystack(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// One page of the assembled feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub products: Vec<Product>,
    pub page: u32,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
    #[serde(rename = "totalItems")]
    pub total_items: u64,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}

impl FeedPage {
    /// An empty single-page result for filters that match nothing.
    pub fn empty(per_page: u32) -> Self {
        Self {
            products: Vec::new(),
            page: 1,
            per_page,
            total_pages: 1,
            total_items: 0,
            has_next_page: false,
        }
    }

    /// Re-run description normalization on every item. Idempotent, applied
    /// on cache hits so older cached payloads converge to the same shape.
    pub fn normalize_descriptions(mut self) -> Self {
        for p in &mut self.products {
            p.description = normalize_description(&p.description);
        }
        self
    }
}

/// A clamped pagination window over `total_items` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Compute the slice window for a page request.
///
/// Total pages is ceiling division with a minimum of 1; the requested page
/// is clamped into `[1, total_pages]`. `end` is capped at `total_items`.
pub fn paginate(total_items: u64, page: u32, per_page: u32) -> PageWindow {
    let per_page = per_page.max(1);
    let total_pages = (total_items.div_ceil(per_page as u64)).max(1) as u32;
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) as u64 * per_page as u64).min(total_items) as usize;
    let end = (start as u64 + per_page as u64).min(total_items) as usize;
    PageWindow {
        page,
        per_page,
        total_pages,
        total_items,
        start,
        end,
    }
}

/// Unescape literal `\r\n` and `\n` sequences into real newlines.
///
/// Spreadsheet-imported descriptions arrive with escaped newlines; running
/// this twice is a no-op.
pub fn normalize_description(s: &str) -> String {
    s.replace("\\r\\n", "\n").replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            product_id: id.to_string(),
            title: format!("Product {id}"),
            name: format!("Product {id}"),
            brand: "Acme".to_string(),
            season_title: "Acme".to_string(),
            category: "shoes".to_string(),
            description: String::new(),
            status: "active".to_string(),
            price: 100.0,
            images: vec!["https://img/one.jpg".to_string()],
            thumb: String::new(),
            in_stock: true,
        }
    }

    #[test]
    fn test_preview_thumb_prefers_explicit_thumb() {
        let mut p = product("p1");
        p.thumb = "https://img/thumb.jpg".to_string();
        assert_eq!(p.preview_thumb(), "https://img/thumb.jpg");
    }

    #[test]
    fn test_preview_thumb_falls_back_to_first_image() {
        let p = product("p1");
        assert_eq!(p.preview_thumb(), "https://img/one.jpg");
    }

    #[test]
    fn test_preview_thumb_empty_when_no_images() {
        let mut p = product("p1");
        p.images.clear();
        assert_eq!(p.preview_thumb(), "");
    }

    #[test]
    fn test_normalize_description_is_idempotent() {
        let raw = "line one\\r\\nline two\\nline three";
        let once = normalize_description(raw);
        assert_eq!(once, "line one\nline two\nline three");
        assert_eq!(normalize_description(&once), once);
    }

    #[test]
    fn test_paginate_basic_window() {
        let w = paginate(10, 2, 3);
        assert_eq!(w.total_pages, 4);
        assert_eq!(w.page, 2);
        assert_eq!((w.start, w.end), (3, 6));
        assert!(w.has_next_page());
    }

    #[test]
    fn test_paginate_clamps_page_and_has_min_one_page() {
        let w = paginate(0, 5, 40);
        assert_eq!(w.total_pages, 1);
        assert_eq!(w.page, 1);
        assert_eq!((w.start, w.end), (0, 0));
        assert!(!w.has_next_page());

        let w = paginate(10, 99, 4);
        assert_eq!(w.total_pages, 3);
        assert_eq!(w.page, 3);
        assert_eq!((w.start, w.end), (8, 10));
    }

    #[test]
    fn test_paginate_union_covers_all_items_once() {
        let total = 23u64;
        let per_page = 5;
        let mut seen = Vec::new();
        let pages = paginate(total, 1, per_page).total_pages;
        for page in 1..=pages {
            let w = paginate(total, page, per_page);
            seen.extend(w.start..w.end);
        }
        assert_eq!(seen, (0..total as usize).collect::<Vec<_>>());
    }

    #[test]
    fn test_feed_page_wire_keys() {
        let page = FeedPage::empty(40);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("perPage").is_some());
        assert!(json.get("totalPages").is_some());
        assert!(json.get("totalItems").is_some());
        assert!(json.get("hasNextPage").is_some());
        assert!(json.get("per_page").is_none());
    }

    #[test]
    fn test_into_page_item_sets_preview() {
        let p = product("p1").into_page_item();
        assert_eq!(p.thumb, "https://img/one.jpg");
    }
}
