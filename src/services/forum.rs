//! Forum service
//!
//! Posts live in the `posts` collection of the document store. Votes are
//! applied as atomic increments so concurrent voters never lose updates.

use crate::models::{CreatePostInput, ForumPost, NewForumPost, Vote, ANONYMOUS_AUTHOR};
use crate::store::{to_fields, Collection, DynDocumentStore, SortDirection, StoreError};
use chrono::Utc;

#[derive(Debug, thiserror::Error)]
pub enum ForumServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct ForumService {
    store: DynDocumentStore,
}

impl ForumService {
    pub fn new(store: DynDocumentStore) -> Self {
        Self { store }
    }

    /// All posts, newest first. Store failures yield an empty list.
    pub async fn list_posts(&self) -> Vec<ForumPost> {
        self.store
            .list_all(Collection::Posts, "date", SortDirection::Descending)
            .await
            .into_iter()
            .filter_map(|doc| match doc.decode::<ForumPost>() {
                Ok(post) => Some(post),
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "Skipping malformed post");
                    None
                }
            })
            .collect()
    }

    pub async fn get_post(&self, id: &str) -> Result<ForumPost, ForumServiceError> {
        let doc = self
            .store
            .get_by_id(Collection::Posts, id)
            .await?
            .ok_or_else(|| ForumServiceError::NotFound(id.to_string()))?;
        Ok(doc.decode()?)
    }

    /// Create a post with zero votes, stamped with the current time.
    ///
    /// Title and content are trimmed and must not be empty. A missing or
    /// blank author is stored as "Anonim".
    pub async fn create_post(&self, input: CreatePostInput) -> Result<ForumPost, ForumServiceError> {
        let title = input.title.trim();
        let content = input.content.trim();
        if title.is_empty() {
            return Err(ForumServiceError::ValidationError(
                "Post title cannot be empty".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(ForumServiceError::ValidationError(
                "Post content cannot be empty".to_string(),
            ));
        }

        let author = input
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR);

        let post = NewForumPost {
            title: title.to_string(),
            content: content.to_string(),
            author: author.to_string(),
            date: Utc::now(),
            votes: 0,
        };

        let doc = self.store.create(Collection::Posts, to_fields(&post)?).await?;
        tracing::info!(id = %doc.id, "Forum post created");
        Ok(doc.decode()?)
    }

    /// Apply one vote atomically.
    pub async fn try_vote(&self, post_id: &str, vote: Vote) -> Result<(), ForumServiceError> {
        self.store
            .increment_field(Collection::Posts, post_id, "votes", vote.delta())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { id, .. } => ForumServiceError::NotFound(id),
                other => ForumServiceError::Store(other),
            })
    }

    /// Apply one vote, reporting only whether it was recorded.
    pub async fn vote(&self, post_id: &str, vote: Vote) -> bool {
        match self.try_vote(post_id, vote).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%post_id, error = %e, "Failed to record vote");
                false
            }
        }
    }
}
