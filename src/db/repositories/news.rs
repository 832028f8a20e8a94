//! News repository
//!
//! Two interchangeable backends behind `NewsRepository`:
//! - `SqlxNewsRepository` - the relational `news` table (integer ids)
//! - `DocumentNewsRepository` - the `news` document collection (string ids)
//!
//! Both list newest first: `date` descending, then creation time descending.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, SubsecRound, Utc};
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, MySql, MySqlPool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::{NewNewsItem, NewsItem, NewsPatch, RecordId};
use crate::store::{to_fields, Collection, DynDocumentStore, SortDirection, StoreError};

/// News repository trait
#[async_trait]
pub trait NewsRepository: Send + Sync {
    /// List all news, newest first
    async fn list(&self) -> Result<Vec<NewsItem>>;

    /// Get a news item by ID
    async fn get_by_id(&self, id: &RecordId) -> Result<Option<NewsItem>>;

    /// Create a news item and return it as stored
    async fn create(&self, item: &NewNewsItem) -> Result<NewsItem>;

    /// Apply a partial update. Returns `false` if the item doesn't exist.
    async fn update(&self, id: &RecordId, patch: &NewsPatch) -> Result<bool>;

    /// Delete a news item. Returns `false` if the item doesn't exist.
    async fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Total number of news items
    async fn count(&self) -> Result<u64>;
}

// ============================================================================
// Relational backend
// ============================================================================

const NEWS_COLUMNS: &str = "id, title, summary, content, category, image, author, date, created_at";

/// SQLx-based news repository over the `news` table
pub struct SqlxNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsRepository for SqlxNewsRepository {
    async fn list(&self) -> Result<Vec<NewsItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_mysql(mysql_pool(&self.pool)?).await,
        }
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<NewsItem>> {
        let Some(id) = id.as_int() else {
            return Ok(None);
        };
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn create(&self, item: &NewNewsItem) -> Result<NewsItem> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite_pool(&self.pool)?, item).await?,
            DatabaseDriver::Mysql => create_mysql(mysql_pool(&self.pool)?, item).await?,
        };
        self.get_by_id(&RecordId::Int(id))
            .await?
            .with_context(|| format!("News {} vanished right after insert", id))
    }

    async fn update(&self, id: &RecordId, patch: &NewsPatch) -> Result<bool> {
        let Some(int_id) = id.as_int() else {
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(self.get_by_id(id).await?.is_some());
        }

        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite_pool(&self.pool)?, int_id, patch).await?,
            DatabaseDriver::Mysql => update_mysql(mysql_pool(&self.pool)?, int_id, patch).await?,
        };

        // MySQL counts changed rows only; an identical write reports 0.
        if affected == 0 {
            return Ok(self.get_by_id(id).await?.is_some());
        }
        Ok(true)
    }

    async fn delete(&self, id: &RecordId) -> Result<bool> {
        let Some(id) = id.as_int() else {
            return Ok(false);
        };
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM news WHERE id = ?")
                    .bind(id)
                    .execute(sqlite_pool(&self.pool)?)
                    .await?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM news WHERE id = ?")
                    .bind(id)
                    .execute(mysql_pool(&self.pool)?)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar("SELECT COUNT(*) FROM news")
                    .fetch_one(sqlite_pool(&self.pool)?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar("SELECT COUNT(*) FROM news")
                    .fetch_one(mysql_pool(&self.pool)?)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }
}

/// Column/value pairs for the fields a patch sets
enum PatchValue {
    Text(String),
    Date(NaiveDate),
}

fn patch_columns(patch: &NewsPatch) -> Vec<(&'static str, PatchValue)> {
    let text = |column: &'static str, value: &Option<String>| {
        value.clone().map(|v| (column, PatchValue::Text(v)))
    };
    [
        text("title", &patch.title),
        text("summary", &patch.summary),
        text("content", &patch.content),
        text("category", &patch.category),
        text("image", &patch.image),
        text("author", &patch.author),
        patch.date.map(|d| ("date", PatchValue::Date(d))),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// SQLite implementations

fn row_to_news_sqlite(row: &SqliteRow) -> NewsItem {
    NewsItem {
        id: RecordId::Int(row.get("id")),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        category: row.get("category"),
        image: row.get("image"),
        author: row.get("author"),
        date: row.get("date"),
        created_at: row.get("created_at"),
    }
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<NewsItem>> {
    let sql = format!(
        "SELECT {} FROM news ORDER BY date DESC, created_at DESC, id DESC",
        NEWS_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_news_sqlite).collect())
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<NewsItem>> {
    let sql = format!("SELECT {} FROM news WHERE id = ?", NEWS_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(row_to_news_sqlite))
}

async fn create_sqlite(pool: &SqlitePool, item: &NewNewsItem) -> Result<i64> {
    let result = sqlx::query(
        r#"INSERT INTO news (title, summary, content, category, image, author, date, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&item.title)
    .bind(&item.summary)
    .bind(&item.content)
    .bind(&item.category)
    .bind(&item.image)
    .bind(&item.author)
    .bind(item.date)
    .bind(Utc::now().trunc_subsecs(6))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn update_sqlite(pool: &SqlitePool, id: i64, patch: &NewsPatch) -> Result<u64> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE news SET ");
    {
        let mut set = builder.separated(", ");
        for (column, value) in patch_columns(patch) {
            set.push(format!("{} = ", column));
            match value {
                PatchValue::Text(text) => set.push_bind_unseparated(text),
                PatchValue::Date(date) => set.push_bind_unseparated(date),
            };
        }
    }
    builder.push(" WHERE id = ").push_bind(id);

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

// MySQL implementations

fn row_to_news_mysql(row: &MySqlRow) -> NewsItem {
    NewsItem {
        id: RecordId::Int(row.get("id")),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        category: row.get("category"),
        image: row.get("image"),
        author: row.get("author"),
        date: row.get("date"),
        created_at: row.get("created_at"),
    }
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<NewsItem>> {
    let sql = format!(
        "SELECT {} FROM news ORDER BY date DESC, created_at DESC, id DESC",
        NEWS_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_news_mysql).collect())
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<NewsItem>> {
    let sql = format!("SELECT {} FROM news WHERE id = ?", NEWS_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(row_to_news_mysql))
}

async fn create_mysql(pool: &MySqlPool, item: &NewNewsItem) -> Result<i64> {
    let result = sqlx::query(
        r#"INSERT INTO news (title, summary, content, category, image, author, date, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&item.title)
    .bind(&item.summary)
    .bind(&item.content)
    .bind(&item.category)
    .bind(&item.image)
    .bind(&item.author)
    .bind(item.date)
    .bind(Utc::now().trunc_subsecs(6))
    .execute(pool)
    .await?;

    Ok(result.last_insert_id() as i64)
}

async fn update_mysql(pool: &MySqlPool, id: i64, patch: &NewsPatch) -> Result<u64> {
    let mut builder = QueryBuilder::<MySql>::new("UPDATE news SET ");
    {
        let mut set = builder.separated(", ");
        for (column, value) in patch_columns(patch) {
            set.push(format!("{} = ", column));
            match value {
                PatchValue::Text(text) => set.push_bind_unseparated(text),
                PatchValue::Date(date) => set.push_bind_unseparated(date),
            };
        }
    }
    builder.push(" WHERE id = ").push_bind(id);

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Document backend
// ============================================================================

/// News repository over the `news` document collection
pub struct DocumentNewsRepository {
    store: DynDocumentStore,
}

impl DocumentNewsRepository {
    pub fn new(store: DynDocumentStore) -> Self {
        Self { store }
    }

    pub fn boxed(store: DynDocumentStore) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(store))
    }
}

#[async_trait]
impl NewsRepository for DocumentNewsRepository {
    async fn list(&self) -> Result<Vec<NewsItem>> {
        let documents = self
            .store
            .try_list_all(Collection::News, "date", SortDirection::Descending)
            .await?;

        Ok(documents
            .iter()
            .filter_map(|doc| match doc.decode::<NewsItem>() {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "Skipping malformed news document");
                    None
                }
            })
            .collect())
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<NewsItem>> {
        let doc = self.store.get_by_id(Collection::News, &id.to_string()).await?;
        Ok(doc.map(|d| d.decode()).transpose()?)
    }

    async fn create(&self, item: &NewNewsItem) -> Result<NewsItem> {
        let doc = self.store.create(Collection::News, to_fields(item)?).await?;
        Ok(doc.decode()?)
    }

    async fn update(&self, id: &RecordId, patch: &NewsPatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(self.get_by_id(id).await?.is_some());
        }
        match self
            .store
            .update(Collection::News, &id.to_string(), to_fields(patch)?)
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &RecordId) -> Result<bool> {
        Ok(self.store.delete(Collection::News, &id.to_string()).await?)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.store.count(Collection::News).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::CreateNewsInput;
    use crate::store::MemoryDocumentStore;

    async fn sql_repo() -> Arc<dyn NewsRepository> {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxNewsRepository::boxed(pool)
    }

    fn doc_repo() -> Arc<dyn NewsRepository> {
        DocumentNewsRepository::boxed(Arc::new(MemoryDocumentStore::new()))
    }

    fn item(title: &str, date: Option<&str>) -> NewNewsItem {
        NewNewsItem::from(CreateNewsInput {
            title: title.to_string(),
            summary: format!("{} summary", title),
            content: "Line one\nLine two".to_string(),
            image: Some("http://x/y.png".to_string()),
            date: date.map(|d| d.parse().unwrap()),
            ..Default::default()
        })
    }

    async fn check_crud(repo: Arc<dyn NewsRepository>) {
        assert!(repo.list().await.unwrap().is_empty());

        let created = repo.create(&item("A", None)).await.unwrap();
        assert_eq!(created.title, "A");
        assert_eq!(created.category, "Duyuru");
        assert_eq!(created.author, "Admin");
        assert_eq!(created.date, Utc::now().date_naive());
        assert_eq!(created.image.as_deref(), Some("http://x/y.png"));

        let fetched = repo.get_by_id(&created.id).await.unwrap();
        assert_eq!(fetched.as_ref(), Some(&created));

        let patch = NewsPatch {
            title: Some("B".to_string()),
            category: Some("Etkinlik".to_string()),
            ..Default::default()
        };
        assert!(repo.update(&created.id, &patch).await.unwrap());
        let updated = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "B");
        assert_eq!(updated.category, "Etkinlik");
        assert_eq!(updated.summary, created.summary);
        assert_eq!(updated.created_at, created.created_at);

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete(&created.id).await.unwrap());
        assert!(!repo.delete(&created.id).await.unwrap());
        assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
        assert!(!repo.update(&created.id, &patch).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    async fn check_ordering(repo: Arc<dyn NewsRepository>) {
        let old = repo.create(&item("old", Some("2024-01-10"))).await.unwrap();
        let same_day_first = repo.create(&item("first", Some("2024-06-01"))).await.unwrap();
        let same_day_second = repo.create(&item("second", Some("2024-06-01"))).await.unwrap();
        let middle = repo.create(&item("middle", Some("2024-03-15"))).await.unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec![
                same_day_second.title,
                same_day_first.title,
                middle.title,
                old.title
            ]
        );
    }

    #[tokio::test]
    async fn test_sql_repository_crud() {
        check_crud(sql_repo().await).await;
    }

    #[tokio::test]
    async fn test_document_repository_crud() {
        check_crud(doc_repo()).await;
    }

    #[tokio::test]
    async fn test_sql_repository_ordering() {
        check_ordering(sql_repo().await).await;
    }

    #[tokio::test]
    async fn test_document_repository_ordering() {
        check_ordering(doc_repo()).await;
    }

    #[tokio::test]
    async fn test_sql_ids_are_integers() {
        let repo = sql_repo().await;
        let created = repo.create(&item("A", None)).await.unwrap();
        assert!(matches!(created.id, RecordId::Int(_)));

        let key = RecordId::Key("not-a-number".to_string());
        assert!(repo.get_by_id(&key).await.unwrap().is_none());
        assert!(!repo.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_document_ids_are_keys() {
        let repo = doc_repo();
        let created = repo.create(&item("A", None)).await.unwrap();
        assert!(matches!(created.id, RecordId::Key(_)));
    }

    #[tokio::test]
    async fn test_empty_patch_reports_existence() {
        let repo = sql_repo().await;
        let created = repo.create(&item("A", None)).await.unwrap();
        assert!(repo.update(&created.id, &NewsPatch::default()).await.unwrap());
        assert!(!repo.update(&RecordId::Int(999), &NewsPatch::default()).await.unwrap());
    }
}
