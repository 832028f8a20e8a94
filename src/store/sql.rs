//! SQL-backed document store
//!
//! Documents live as JSON text in the `documents` table. Merges and
//! increments run as single UPDATE statements using the database's JSON
//! functions, so concurrent callers never race on a read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use uuid::Uuid;

use super::{
    strip_reserved, validate_field_name, Collection, Document, DocumentStore, Fields, SortDirection,
    StoreError, CREATED_AT_FIELD,
};
use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;

/// Document store over the application database
pub struct SqlDocumentStore {
    pool: DynDatabasePool,
}

impl SqlDocumentStore {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

fn order_clause(order_field: &str, direction: SortDirection, json_extract: &str) -> String {
    let dir = direction.as_sql();
    if order_field == CREATED_AT_FIELD {
        format!("ORDER BY created_at {dir}, seq {dir}")
    } else {
        format!("ORDER BY {json_extract}(data, ?) {dir}, seq {dir}")
    }
}

fn decode_row(id: String, data: &str, created_at: DateTime<Utc>) -> Result<Document, StoreError> {
    Ok(Document {
        id,
        created_at,
        fields: serde_json::from_str(data)?,
    })
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn try_list_all(
        &self,
        collection: Collection,
        order_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError> {
        validate_field_name(order_field)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(sqlite_pool(&self.pool)?, collection, order_field, direction).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(mysql_pool(&self.pool)?, collection, order_field, direction).await
            }
        }
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sqlite(sqlite_pool(&self.pool)?, collection, id).await,
            DatabaseDriver::Mysql => get_mysql(mysql_pool(&self.pool)?, collection, id).await,
        }
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<Document, StoreError> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().trunc_subsecs(6),
            fields: strip_reserved(fields),
        };
        let data = serde_json::to_string(&document.fields)?;
        let sql = "INSERT INTO documents (collection, id, data, created_at) VALUES (?, ?, ?, ?)";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(collection.as_str())
                    .bind(&document.id)
                    .bind(&data)
                    .bind(document.created_at)
                    .execute(sqlite_pool(&self.pool)?)
                    .await?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(collection.as_str())
                    .bind(&document.id)
                    .bind(&data)
                    .bind(document.created_at)
                    .execute(mysql_pool(&self.pool)?)
                    .await?;
            }
        }

        tracing::debug!(%collection, id = %document.id, "Document created");
        Ok(document)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError> {
        let patch = serde_json::to_string(&strip_reserved(patch))?;

        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("UPDATE documents SET data = json_patch(data, ?) WHERE collection = ? AND id = ?")
                    .bind(&patch)
                    .bind(collection.as_str())
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query("UPDATE documents SET data = JSON_MERGE_PATCH(data, ?) WHERE collection = ? AND id = ?")
                    .bind(&patch)
                    .bind(collection.as_str())
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await?
                    .rows_affected()
            }
        };

        // MySQL reports changed rows, so a no-op merge also yields 0.
        if affected == 0 && !self.exists(collection, id).await? {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let sql = "DELETE FROM documents WHERE collection = ? AND id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(collection.as_str())
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(collection.as_str())
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        validate_field_name(field)?;
        let path = json_path(field);

        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                increment_sqlite(sqlite_pool(&self.pool)?, collection, id, &path, delta).await?
            }
            DatabaseDriver::Mysql => {
                increment_mysql(mysql_pool(&self.pool)?, collection, id, &path, delta).await?
            }
        };

        if affected == 0 {
            return Err(if self.exists(collection, id).await? {
                StoreError::NotNumeric {
                    collection,
                    id: id.to_string(),
                    field: field.to_string(),
                }
            } else {
                StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                }
            });
        }
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let sql = "SELECT COUNT(*) FROM documents WHERE collection = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(collection.as_str())
                    .fetch_one(sqlite_pool(&self.pool)?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(collection.as_str())
                    .fetch_one(mysql_pool(&self.pool)?)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }
}

impl SqlDocumentStore {
    async fn exists(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        Ok(self.get_by_id(collection, id).await?.is_some())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_sqlite(
    pool: &SqlitePool,
    collection: Collection,
    order_field: &str,
    direction: SortDirection,
) -> Result<Vec<Document>, StoreError> {
    let sql = format!(
        "SELECT id, data, created_at FROM documents WHERE collection = ? {}",
        order_clause(order_field, direction, "json_extract")
    );
    let mut query = sqlx::query(&sql).bind(collection.as_str());
    if order_field != CREATED_AT_FIELD {
        query = query.bind(json_path(order_field));
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter()
        .map(|row| decode_row(row.get("id"), row.get::<&str, _>("data"), row.get("created_at")))
        .collect()
}

async fn get_sqlite(pool: &SqlitePool, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query("SELECT id, data, created_at FROM documents WHERE collection = ? AND id = ?")
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| decode_row(row.get("id"), row.get::<&str, _>("data"), row.get("created_at")))
        .transpose()
}

async fn increment_sqlite(
    pool: &SqlitePool,
    collection: Collection,
    id: &str,
    path: &str,
    delta: i64,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET data = json_set(data, ?, COALESCE(json_extract(data, ?), 0) + ?)
        WHERE collection = ? AND id = ?
          AND COALESCE(json_type(data, ?), 'null') IN ('null', 'integer')
        "#,
    )
    .bind(path)
    .bind(path)
    .bind(delta)
    .bind(collection.as_str())
    .bind(id)
    .bind(path)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_mysql(
    pool: &MySqlPool,
    collection: Collection,
    order_field: &str,
    direction: SortDirection,
) -> Result<Vec<Document>, StoreError> {
    let sql = format!(
        "SELECT id, data, created_at FROM documents WHERE collection = ? {}",
        order_clause(order_field, direction, "JSON_EXTRACT")
    );
    let mut query = sqlx::query(&sql).bind(collection.as_str());
    if order_field != CREATED_AT_FIELD {
        query = query.bind(json_path(order_field));
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter()
        .map(|row| decode_row(row.get("id"), row.get::<&str, _>("data"), row.get("created_at")))
        .collect()
}

async fn get_mysql(pool: &MySqlPool, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query("SELECT id, data, created_at FROM documents WHERE collection = ? AND id = ?")
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| decode_row(row.get("id"), row.get::<&str, _>("data"), row.get("created_at")))
        .transpose()
}

async fn increment_mysql(
    pool: &MySqlPool,
    collection: Collection,
    id: &str,
    path: &str,
    delta: i64,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET data = JSON_SET(data, ?, COALESCE(CAST(JSON_EXTRACT(data, ?) AS SIGNED), 0) + ?)
        WHERE collection = ? AND id = ?
          AND COALESCE(JSON_TYPE(JSON_EXTRACT(data, ?)), 'NULL') IN ('NULL', 'INTEGER', 'UNSIGNED INTEGER')
        "#,
    )
    .bind(path)
    .bind(path)
    .bind(delta)
    .bind(collection.as_str())
    .bind(id)
    .bind(path)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{create_pool, create_test_pool, migrations::run_migrations};
    use crate::store::to_fields;
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn setup_store() -> SqlDocumentStore {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlDocumentStore::new(pool)
    }

    fn fields(value: Value) -> Fields {
        to_fields(&value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_document() {
        let store = setup_store().await;
        let created = store
            .create(Collection::News, fields(json!({"title": "Yeni dönem", "tags": ["a"]})))
            .await
            .unwrap();

        let fetched = store.get_by_id(Collection::News, &created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_empty_collection_lists_nothing() {
        let store = setup_store().await;
        let listed = store
            .try_list_all(Collection::Posts, "date", SortDirection::Descending)
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(store.count(Collection::Posts).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_orders_by_field_then_insertion() {
        let store = setup_store().await;
        let old = store
            .create(Collection::News, fields(json!({"date": "2024-01-01"})))
            .await
            .unwrap();
        let tie_first = store
            .create(Collection::News, fields(json!({"date": "2024-05-01"})))
            .await
            .unwrap();
        let tie_second = store
            .create(Collection::News, fields(json!({"date": "2024-05-01"})))
            .await
            .unwrap();
        let undated = store.create(Collection::News, Fields::new()).await.unwrap();

        let desc: Vec<String> = store
            .try_list_all(Collection::News, "date", SortDirection::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(
            desc,
            vec![tie_second.id.clone(), tie_first.id.clone(), old.id.clone(), undated.id.clone()]
        );

        let asc: Vec<String> = store
            .try_list_all(Collection::News, "date", SortDirection::Ascending)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(asc, vec![undated.id, old.id, tie_first.id, tie_second.id]);
    }

    #[tokio::test]
    async fn test_list_by_creation_time() {
        let store = setup_store().await;
        let first = store.create(Collection::Posts, Fields::new()).await.unwrap();
        let second = store.create(Collection::Posts, Fields::new()).await.unwrap();

        let listed = store
            .try_list_all(Collection::Posts, CREATED_AT_FIELD, SortDirection::Descending)
            .await
            .unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_list_degrades_to_empty_when_store_is_closed() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqlDocumentStore::new(pool.clone());
        store.create(Collection::News, Fields::new()).await.unwrap();

        pool.close().await;

        assert!(store
            .try_list_all(Collection::News, "date", SortDirection::Descending)
            .await
            .is_err());
        assert!(store
            .list_all(Collection::News, "date", SortDirection::Descending)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = setup_store().await;
        let created = store
            .create(Collection::News, fields(json!({"title": "A", "summary": "S"})))
            .await
            .unwrap();

        store
            .update(Collection::News, &created.id, fields(json!({"title": "B", "image": "x.png"})))
            .await
            .unwrap();

        let doc = store.get_by_id(Collection::News, &created.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["title"], "B");
        assert_eq!(doc.fields["summary"], "S");
        assert_eq!(doc.fields["image"], "x.png");
        assert_eq!(doc.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = setup_store().await;
        let err = store
            .update(Collection::News, "nope", fields(json!({"title": "B"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = setup_store().await;
        let created = store.create(Collection::News, Fields::new()).await.unwrap();

        assert!(store.delete(Collection::News, &created.id).await.unwrap());
        assert!(!store.delete(Collection::News, &created.id).await.unwrap());
        assert!(store.get_by_id(Collection::News, &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_field() {
        let store = setup_store().await;
        let post = store
            .create(Collection::Posts, fields(json!({"votes": 0})))
            .await
            .unwrap();

        store.increment_field(Collection::Posts, &post.id, "votes", 1).await.unwrap();
        store.increment_field(Collection::Posts, &post.id, "votes", -1).await.unwrap();
        store.increment_field(Collection::Posts, &post.id, "votes", 1).await.unwrap();

        let doc = store.get_by_id(Collection::Posts, &post.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["votes"], 1);
    }

    #[tokio::test]
    async fn test_increment_missing_field_starts_at_zero() {
        let store = setup_store().await;
        let post = store.create(Collection::Posts, Fields::new()).await.unwrap();

        store.increment_field(Collection::Posts, &post.id, "votes", -1).await.unwrap();

        let doc = store.get_by_id(Collection::Posts, &post.id).await.unwrap().unwrap();
        assert_eq!(doc.fields["votes"], -1);
    }

    #[tokio::test]
    async fn test_increment_errors() {
        let store = setup_store().await;
        let post = store
            .create(Collection::Posts, fields(json!({"votes": "lots"})))
            .await
            .unwrap();

        let err = store
            .increment_field(Collection::Posts, &post.id, "votes", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotNumeric { .. }));

        let err = store
            .increment_field(Collection::Posts, "missing", "votes", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store
            .increment_field(Collection::Posts, &post.id, "votes')", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField(_)));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: temp_dir.path().join("docs.db").to_string_lossy().to_string(),
        };
        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = Arc::new(SqlDocumentStore::new(pool));

        let post = store
            .create(Collection::Posts, fields(json!({"votes": 0})))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..20)
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
        assert_eq!(doc.fields["votes"], 20);
    }
}
