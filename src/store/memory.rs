//! In-memory document store
//!
//! Keeps every collection in a `tokio` `RwLock`ed map. All mutations take
//! the write lock, which makes `increment_field` atomic with respect to
//! concurrent callers.

use async_trait::async_trait;
use chrono::{SecondsFormat, SubsecRound, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    strip_reserved, validate_field_name, Collection, Document, DocumentStore, Fields, SortDirection,
    StoreError, CREATED_AT_FIELD,
};

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    document: Document,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    collections: HashMap<Collection, HashMap<String, Entry>>,
}

/// Process-local document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Total order over optional JSON values: missing and null first, then
/// booleans, numbers, strings and finally composite values.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn sort_key(entry: &Entry, order_field: &str) -> Option<Value> {
    if order_field == CREATED_AT_FIELD {
        // Fixed-width so string order is time order
        let stamp = entry
            .document
            .created_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true);
        Some(Value::String(stamp))
    } else {
        entry.document.fields.get(order_field).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn try_list_all(
        &self,
        collection: Collection,
        order_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError> {
        validate_field_name(order_field)?;

        let inner = self.inner.read().await;
        let mut entries: Vec<(Option<Value>, &Entry)> = inner
            .collections
            .get(&collection)
            .map(|docs| docs.values().map(|e| (sort_key(e, order_field), e)).collect())
            .unwrap_or_default();

        entries.sort_by(|(ka, a), (kb, b)| {
            let ascending = compare_values(ka.as_ref(), kb.as_ref()).then(a.seq.cmp(&b.seq));
            match direction {
                SortDirection::Ascending => ascending,
                SortDirection::Descending => ascending.reverse(),
            }
        });

        Ok(entries.into_iter().map(|(_, e)| e.document.clone()).collect())
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|e| e.document.clone()))
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<Document, StoreError> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().trunc_subsecs(6),
            fields: strip_reserved(fields),
        };

        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        let entry = Entry {
            seq: inner.next_seq,
            document: document.clone(),
        };
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(document.id.clone(), entry);

        Ok(document)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        // Merge-patch semantics: null removes the field
        for (key, value) in strip_reserved(patch) {
            if value.is_null() {
                entry.document.fields.remove(&key);
            } else {
                entry.document.fields.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        validate_field_name(field)?;

        let mut inner = self.inner.write().await;
        let entry = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        let current = match entry.document.fields.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| StoreError::NotNumeric {
                collection,
                id: id.to_string(),
                field: field.to_string(),
            })?,
        };
        entry
            .document
            .fields
            .insert(field.to_string(), Value::from(current + delta));
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .get(&collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::to_fields;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Fields {
        to_fields(&value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryDocumentStore::new();
        let created = store
            .create(Collection::News, fields(json!({"title": "A"})))
            .await
            .unwrap();

        let fetched = store.get_by_id(Collection::News, &created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = MemoryDocumentStore::new();
        let created = store
            .create(Collection::News, fields(json!({"title": "A"})))
            .await
            .unwrap();

        assert!(store.get_by_id(Collection::Posts, &created.id).await.unwrap().is_none());
        assert_eq!(store.count(Collection::Posts).await.unwrap(), 0);
        assert_eq!(store.count(Collection::News).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_descending_with_newest_first_on_ties() {
        let store = MemoryDocumentStore::new();
        let old = store
            .create(Collection::News, fields(json!({"date": "2024-01-01"})))
            .await
            .unwrap();
        let tie_first = store
            .create(Collection::News, fields(json!({"date": "2024-03-01"})))
            .await
            .unwrap();
        let tie_second = store
            .create(Collection::News, fields(json!({"date": "2024-03-01"})))
            .await
            .unwrap();
        let undated = store.create(Collection::News, Fields::new()).await.unwrap();

        let ids: Vec<String> = store
            .try_list_all(Collection::News, "date", SortDirection::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();

        assert_eq!(ids, vec![tie_second.id, tie_first.id, old.id, undated.id]);
    }

    #[tokio::test]
    async fn test_list_by_creation_time_uses_timestamp() {
        let store = MemoryDocumentStore::new();
        let newer = store.create(Collection::Posts, Fields::new()).await.unwrap();
        let older = store.create(Collection::Posts, Fields::new()).await.unwrap();

        {
            let mut inner = store.inner.write().await;
            let posts = inner.collections.get_mut(&Collection::Posts).unwrap();
            let base = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc);
            posts.get_mut(&newer.id).unwrap().document.created_at =
                base + chrono::Duration::microseconds(100_001);
            posts.get_mut(&older.id).unwrap().document.created_at =
                base + chrono::Duration::milliseconds(100);
        }

        let ids: Vec<String> = store
            .try_list_all(Collection::Posts, CREATED_AT_FIELD, SortDirection::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

        let ids: Vec<String> = store
            .try_list_all(Collection::Posts, CREATED_AT_FIELD, SortDirection::Ascending)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    #[tokio::test]
    async fn test_list_orders_numbers_ascending() {
        let store = MemoryDocumentStore::new();
        for votes in [5, -1, 12] {
            store
                .create(Collection::Posts, fields(json!({"votes": votes})))
                .await
                .unwrap();
        }

        let votes: Vec<i64> = store
            .list_all(Collection::Posts, "votes", SortDirection::Ascending)
            .await
            .iter()
            .map(|d| d.fields["votes"].as_i64().unwrap())
            .collect();
        assert_eq!(votes, vec![-1, 5, 12]);
    }

    #[tokio::test]
    async fn test_list_rejects_invalid_order_field_but_list_all_degrades() {
        let store = MemoryDocumentStore::new();
        store.create(Collection::News, Fields::new()).await.unwrap();

        let err = store
            .try_list_all(Collection::News, "date; --", SortDirection::Descending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField(_)));

        let listed = store
            .list_all(Collection::News, "date; --", SortDirection::Descending)
            .await;
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing_document() {
        let store = MemoryDocumentStore::new();
        let created = store
            .create(Collection::News, fields(json!({"title": "A", "summary": "S"})))
            .await
            .unwrap();

        store
            .update(Collection::News, &created.id, fields(json!({"title": "B"})))
            .await
            .unwrap();
        let doc = store.get_by_id(Collection::News, &created.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["title"], "B");
        assert_eq!(doc.fields["summary"], "S");

        let err = store
            .update(Collection::News, "missing", fields(json!({"title": "B"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let store = MemoryDocumentStore::new();
        let created = store.create(Collection::Posts, Fields::new()).await.unwrap();

        assert!(store.delete(Collection::Posts, &created.id).await.unwrap());
        assert!(!store.delete(Collection::Posts, &created.id).await.unwrap());
        assert!(store.get_by_id(Collection::Posts, &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_is_atomic_under_concurrency() {
        let store = Arc::new(MemoryDocumentStore::new());
        let post = store
            .create(Collection::Posts, fields(json!({"votes": 0})))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let id = post.id.clone();
                tokio::spawn(async move {
                    store.increment_field(Collection::Posts, &id, "votes", 1).await
                })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let doc = store.get_by_id(Collection::Posts, &post.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["votes"], 50);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric_field() {
        let store = MemoryDocumentStore::new();
        let post = store
            .create(Collection::Posts, fields(json!({"votes": "many"})))
            .await
            .unwrap();

        let err = store
            .increment_field(Collection::Posts, &post.id, "votes", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotNumeric { .. }));
    }

    #[test]
    fn test_compare_values_ranks() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(1.5)), Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(9)), Some(&json!("a"))), Ordering::Less);
    }
}
