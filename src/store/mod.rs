//! Document store
//!
//! Collection-oriented persistence for news items and forum posts. A
//! document is a JSON object with a store-assigned id and creation
//! timestamp. Two backends exist:
//! - `SqlDocumentStore` - documents kept in the `documents` table
//! - `MemoryDocumentStore` - process-local, for tests and throwaway runs
//!
//! # Ordering
//!
//! `list_all` sorts by one field in the requested direction. Documents
//! missing the field compare lower than any document that has it. Ties
//! are broken by insertion order in the same direction, so a descending
//! listing shows the newest of two equal keys first. The reserved field
//! name `created_at` sorts by the store-assigned timestamp.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kode_news::store::{create_document_store, Collection, SortDirection};
//!
//! let store = create_document_store(&config.store, pool.clone());
//! let posts = store.list_all(Collection::Posts, "date", SortDirection::Descending).await;
//! ```

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::config::{StoreConfig, StoreDriver};
use crate::db::DynDatabasePool;

pub use memory::MemoryDocumentStore;
pub use sql::SqlDocumentStore;

/// Field map of a stored document
pub type Fields = Map<String, Value>;

/// Field name that refers to the store-assigned identifier.
pub const ID_FIELD: &str = "id";

/// Field name that refers to the store-assigned creation timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field name pattern is valid"));

/// Named group of documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    News,
    Posts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::News => "news",
            Collection::Posts => "posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for `list_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Document {
    /// Decode into a typed record.
    ///
    /// `id` and `created_at` are exposed to the record next to the stored
    /// fields.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        map.insert(
            CREATED_AT_FIELD.to_string(),
            serde_json::to_value(self.created_at)?,
        );
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

/// Serialize a typed value into a field map.
///
/// Only JSON objects are accepted. `None` fields are expected to be skipped
/// by the value's `Serialize` impl so that patches carry only set fields.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(strip_reserved(map)),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}

/// Drop store-assigned keys from caller-supplied fields.
pub(crate) fn strip_reserved(mut fields: Fields) -> Fields {
    fields.remove(ID_FIELD);
    fields.remove(CREATED_AT_FIELD);
    fields
}

/// Validate a field name used in ordering or increments.
pub(crate) fn validate_field_name(field: &str) -> Result<(), StoreError> {
    if FIELD_NAME.is_match(field) {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

/// Document store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Field '{field}' of {collection}/{id} is not an integer")]
    NotNumeric {
        collection: Collection,
        id: String,
        field: String,
    },

    #[error("Document body must be a JSON object, got: {0}")]
    NotAnObject(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(#[from] anyhow::Error),
}

/// Collection-oriented document persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List every document of a collection in the given order.
    async fn try_list_all(
        &self,
        collection: Collection,
        order_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError>;

    /// List every document of a collection, degrading to an empty list
    /// when the store fails.
    async fn list_all(
        &self,
        collection: Collection,
        order_field: &str,
        direction: SortDirection,
    ) -> Vec<Document> {
        match self.try_list_all(collection, order_field, direction).await {
            Ok(documents) => documents,
            Err(e) => {
                tracing::error!(%collection, error = %e, "Failed to list documents, returning empty result");
                Vec::new()
            }
        }
    }

    /// Fetch one document.
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Store a new document; id and creation timestamp are assigned here.
    async fn create(&self, collection: Collection, fields: Fields) -> Result<Document, StoreError>;

    /// Merge `patch` into an existing document.
    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError>;

    /// Remove a document. Returns `false` when nothing was removed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    /// Atomically add `delta` to an integer field. A missing field counts as 0.
    async fn increment_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError>;

    /// Number of documents in a collection.
    async fn count(&self, collection: Collection) -> Result<u64, StoreError>;
}

/// Shared document store handle
pub type DynDocumentStore = Arc<dyn DocumentStore>;

/// Create the document store selected by configuration.
pub fn create_document_store(config: &StoreConfig, pool: DynDatabasePool) -> DynDocumentStore {
    match config.driver {
        StoreDriver::Database => Arc::new(SqlDocumentStore::new(pool)),
        StoreDriver::Memory => {
            tracing::warn!("Using in-memory document store, documents are lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
    }
}
