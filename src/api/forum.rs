//! Forum API
//!
//! Posts are public: anyone can read, post and vote.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::middleware::{ApiError, AppState, JsonBody};
use crate::models::{CreatePostInput, ForumPost, Vote};

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<ForumPost>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post))
        .route("/posts/{id}/vote", post(vote))
}

/// GET /api/v1/forum/posts
async fn list_posts(State(state): State<AppState>) -> Json<PostListResponse> {
    Json(PostListResponse {
        posts: state.forum_service.list_posts().await,
    })
}

/// GET /api/v1/forum/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ForumPost>, ApiError> {
    Ok(Json(state.forum_service.get_post(&id).await?))
}

/// POST /api/v1/forum/posts
async fn create_post(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreatePostInput>,
) -> Result<(StatusCode, Json<ForumPost>), ApiError> {
    let post = state.forum_service.create_post(body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// POST /api/v1/forum/posts/{id}/vote
///
/// The response does not carry the new total; clients re-read the list.
async fn vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = Vote::try_from(body.vote).map_err(ApiError::validation_error)?;
    state.forum_service.try_vote(&id, vote).await?;
    Ok(Json(VoteResponse { success: true }))
}
