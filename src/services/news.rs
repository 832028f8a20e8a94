//! News service
//!
//! Business rules for news items on top of a `NewsRepository`:
//! - title, summary and content must be non-blank on create
//! - a provided title must be non-blank on update
//! - list reads degrade to an empty result when the backend fails
//!
//! The service doesn't care which backend it runs on; see
//! `db::repositories::news`.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::NewsRepository;
use crate::models::{CreateNewsInput, NewNewsItem, NewsItem, NewsPatch, RecordId};

/// Error types for news service operations
#[derive(Debug, thiserror::Error)]
pub enum NewsServiceError {
    #[error("News not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// News service used by the public and admin APIs
pub struct NewsService {
    repo: Arc<dyn NewsRepository>,
}

impl NewsService {
    pub fn new(repo: Arc<dyn NewsRepository>) -> Self {
        Self { repo }
    }

    /// All news, newest first. Backend failures yield an empty list.
    pub async fn list_news(&self) -> Vec<NewsItem> {
        match self.repo.list().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list news, returning empty result");
                Vec::new()
            }
        }
    }

    pub async fn get_news(&self, id: &RecordId) -> Result<NewsItem, NewsServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load news")?
            .ok_or_else(|| NewsServiceError::NotFound(id.to_string()))
    }

    /// Validate and store a new item.
    pub async fn create_news(&self, input: CreateNewsInput) -> Result<NewsItem, NewsServiceError> {
        validate_create_input(&input)?;

        let item = self
            .repo
            .create(&NewNewsItem::from(input))
            .await
            .context("Failed to create news")?;

        tracing::info!(id = %item.id, title = %item.title, "News created");
        Ok(item)
    }

    /// Validate and apply a partial update, returning the updated item.
    pub async fn update_news(&self, id: &RecordId, patch: NewsPatch) -> Result<NewsItem, NewsServiceError> {
        validate_update_input(&patch)?;

        let found = self
            .repo
            .update(id, &patch)
            .await
            .context("Failed to update news")?;
        if !found {
            return Err(NewsServiceError::NotFound(id.to_string()));
        }

        tracing::info!(%id, "News updated");
        self.get_news(id).await
    }

    /// Delete an item, returning what was removed.
    pub async fn delete_news(&self, id: &RecordId) -> Result<NewsItem, NewsServiceError> {
        let existing = self.get_news(id).await?;

        let removed = self.repo.delete(id).await.context("Failed to delete news")?;
        if !removed {
            return Err(NewsServiceError::NotFound(id.to_string()));
        }

        tracing::info!(%id, "News deleted");
        Ok(existing)
    }

    pub async fn count_news(&self) -> Result<u64, NewsServiceError> {
        Ok(self.repo.count().await.context("Failed to count news")?)
    }
}

fn validate_create_input(input: &CreateNewsInput) -> Result<(), NewsServiceError> {
    require_text("title", &input.title)?;
    require_text("summary", &input.summary)?;
    require_text("content", &input.content)?;
    Ok(())
}

fn validate_update_input(patch: &NewsPatch) -> Result<(), NewsServiceError> {
    if patch.is_empty() {
        return Err(NewsServiceError::ValidationError(
            "No fields to update".to_string(),
        ));
    }
    if let Some(title) = &patch.title {
        require_text("title", title)?;
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<(), NewsServiceError> {
    if value.trim().is_empty() {
        return Err(NewsServiceError::ValidationError(format!(
            "News {} cannot be empty",
            field
        )));
    }
    Ok(())
}
