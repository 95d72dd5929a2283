//! Record store abstraction for Vitrine.
//!
//! The catalog engine never talks to the hosted record store directly; it
//! goes through the [`RecordStore`] trait. [`HttpRecordStore`] is the
//! production implementation over the store's JSON collections API;
//! [`InMemoryRecordStore`] backs unit and integration tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::StoreError;
pub use http::{HttpRecordStore, StoreConfig};
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
pub use types::{
    is_valid_record_id, is_valid_telegram_id, CartItem, NewOrder, OrderLine, OrderRecord,
    OrderUserData, ProductFilter, ProfileRecord, ProfileUpdate, RecordPage, RelationKind,
    RelationRecord,
};
