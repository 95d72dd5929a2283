//! Core types for the Vitrine storefront backend.
//!
//! This crate holds everything the other crates agree on: the error
//! taxonomy, the product/feed data model, and the deterministic ordering
//! primitives (seeded shuffle and category mixer) used to build the feed.

pub mod error;
pub mod product;
pub mod shuffle;

pub use error::{ApiError, ErrorCategory, Result};
pub use product::{normalize_description, paginate, FeedPage, PageWindow, Product, ProductIdentity};
pub use shuffle::{hash_seed, mix_by_group, shuffle, Xorshift32};
