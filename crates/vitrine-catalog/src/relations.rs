//! Human name -> record id resolution for brand/category/subcategory
//! filters, cached in the `relation-ids` namespace.
//!
//! Resolutions are long-lived (the namespace default, 6 hours); a name
//! that resolves to nothing is cached as an empty sentinel for 5 minutes
//! so repeated bogus filters do not hammer the store.

use std::sync::Arc;
use std::time::Duration;

use vitrine_cache::{ns, CacheManager};
use vitrine_store::{is_valid_record_id, RecordStore, RelationKind, StoreError};

/// TTL for "name resolves to nothing" sentinels.
const MISS_TTL: Duration = Duration::from_secs(300);

/// Resolve a human-readable relation name to its record id.
///
/// Returns `Ok(None)` for blank names, names that match no record, and
/// ids that fail the record id shape check (treated the same as not
/// found, never used in a filter).
pub async fn resolve_relation_id(
    cache: &CacheManager,
    store: &Arc<dyn RecordStore>,
    kind: RelationKind,
    name: &str,
) -> Result<Option<String>, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    let cache_key = format!("relid:{}:{}", kind.collection(), name.to_lowercase());
    if let Some(cached) = cache.get_as::<String>(ns::RELATION_IDS, &cache_key) {
        return Ok(if cached.is_empty() { None } else { Some(cached) });
    }

    let records = store.list_relations(kind).await?;
    let id = records
        .iter()
        .find(|record| record.name.trim() == name)
        .map(|record| record.id.trim().to_string())
        .unwrap_or_default();

    if id.is_empty() || !is_valid_record_id(&id) {
        if !id.is_empty() {
            tracing::warn!(
                collection = kind.collection(),
                id,
                "relation id has unexpected shape, treating as not found"
            );
        }
        cache.set_as(ns::RELATION_IDS, &cache_key, &"", Some(MISS_TTL));
        return Ok(None);
    }

    cache.set_as(ns::RELATION_IDS, &cache_key, &id, None);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_store::{InMemoryRecordStore, RelationRecord};

    fn relation(id: &str, name: &str) -> RelationRecord {
        RelationRecord {
            id: id.to_string(),
            name: name.to_string(),
            category: String::new(),
        }
    }

    fn store_with_brands(brands: Vec<RelationRecord>) -> Arc<dyn RecordStore> {
        Arc::new(InMemoryRecordStore::new().with_relations(RelationKind::Brands, brands))
    }

    #[tokio::test]
    async fn test_resolves_and_caches() {
        let cache = CacheManager::new();
        let store = store_with_brands(vec![relation("brandaaaaaaaaaa", "Acme")]);

        let id = resolve_relation_id(&cache, &store, RelationKind::Brands, "Acme")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("brandaaaaaaaaaa"));

        // Cached under the lowercased name.
        assert_eq!(
            cache.get_as::<String>(ns::RELATION_IDS, "relid:brands:acme"),
            Some("brandaaaaaaaaaa".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_name_caches_miss_sentinel() {
        let cache = CacheManager::new();
        let store = store_with_brands(vec![]);

        let id = resolve_relation_id(&cache, &store, RelationKind::Brands, "Nobody")
            .await
            .unwrap();
        assert_eq!(id, None);
        assert_eq!(
            cache.get_as::<String>(ns::RELATION_IDS, "relid:brands:nobody"),
            Some(String::new())
        );
    }

    #[tokio::test]
    async fn test_invalid_id_shape_is_not_found() {
        let cache = CacheManager::new();
        let store = store_with_brands(vec![relation("BAD-ID", "Acme")]);

        let id = resolve_relation_id(&cache, &store, RelationKind::Brands, "Acme")
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn test_blank_name_short_circuits() {
        let cache = CacheManager::new();
        let store = store_with_brands(vec![]);
        let id = resolve_relation_id(&cache, &store, RelationKind::Brands, "   ")
            .await
            .unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn test_cached_resolution_skips_store() {
        let cache = CacheManager::new();
        let memory = Arc::new(
            InMemoryRecordStore::new()
                .with_relations(RelationKind::Brands, vec![relation("brandaaaaaaaaaa", "Acme")]),
        );
        let store: Arc<dyn RecordStore> = memory.clone();

        resolve_relation_id(&cache, &store, RelationKind::Brands, "Acme")
            .await
            .unwrap();

        // A failing store no longer matters once the id is cached.
        memory.set_fail_reads(Some(vitrine_store::StoreError::http(500, "down")));
        let id = resolve_relation_id(&cache, &store, RelationKind::Brands, "Acme")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("brandaaaaaaaaaa"));
    }
}
