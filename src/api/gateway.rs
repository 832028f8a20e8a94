//! News REST gateway
//!
//! CRUD over the relational `news` table at `/api/news`. This surface keeps
//! its own contract, separate from the versioned API:
//! - `GET /` and `GET /{id}` return bare records
//! - `POST /` needs title, summary, content and image, answers 201
//! - `PUT /{id}` is a partial update, `DELETE /{id}` echoes the title
//! - ids must be numeric, anything else is "Endpoint not found"
//!
//! Store failures are never masked here; they answer 500.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::middleware::{endpoint_not_found, ApiError, AppState};
use crate::models::{CreateNewsInput, NewNewsItem, NewsItem, NewsPatch, RecordId};

#[derive(Serialize)]
struct CreatedNews {
    #[serde(flatten)]
    item: NewsItem,
    message: &'static str,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct DeletedNews {
    message: &'static str,
    title: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/news",
            get(list_news).post(create_news).fallback(endpoint_not_found),
        )
        .route(
            "/api/news/{id}",
            get(get_news)
                .put(update_news)
                .delete(delete_news)
                .fallback(endpoint_not_found),
        )
}

/// GET /api/news
async fn list_news(State(state): State<AppState>) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let items = state.gateway_repo.list().await.map_err(store_failure)?;
    Ok(Json(items))
}

/// GET /api/news/{id}
async fn get_news(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<NewsItem>, ApiError> {
    let id = numeric_id(&raw_id)?;
    let item = state
        .gateway_repo
        .get_by_id(&id)
        .await
        .map_err(store_failure)?
        .ok_or_else(news_not_found)?;
    Ok(Json(item))
}

/// POST /api/news
async fn create_news(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: CreateNewsInput = parse_body(&body)?;

    require_text(&input.title, "Title cannot be empty")?;
    require_text(&input.summary, "Summary cannot be empty")?;
    require_text(&input.content, "Content cannot be empty")?;
    require_text(
        input.image.as_deref().unwrap_or_default(),
        "Image URL cannot be empty",
    )?;

    let item = state
        .gateway_repo
        .create(&NewNewsItem::from(input))
        .await
        .map_err(store_failure)?;
    tracing::info!(id = %item.id, "News created through gateway");

    Ok((
        StatusCode::CREATED,
        Json(CreatedNews {
            item,
            message: "News created successfully",
        }),
    ))
}

/// PUT /api/news/{id}
async fn update_news(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = numeric_id(&raw_id)?;

    state
        .gateway_repo
        .get_by_id(&id)
        .await
        .map_err(store_failure)?
        .ok_or_else(news_not_found)?;

    let patch: NewsPatch = parse_body(&body)?;
    if let Some(title) = &patch.title {
        require_text(title, "Title cannot be empty")?;
    }
    if let Some(image) = &patch.image {
        require_text(image, "Image URL cannot be empty")?;
    }
    if patch.is_empty() {
        return Err(ApiError::validation_error("No data to update"));
    }

    let updated = state
        .gateway_repo
        .update(&id, &patch)
        .await
        .map_err(store_failure)?;
    if !updated {
        return Err(news_not_found());
    }

    Ok(Json(MessageResponse {
        message: "News updated successfully",
    }))
}

/// DELETE /api/news/{id}
async fn delete_news(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeletedNews>, ApiError> {
    let id = numeric_id(&raw_id)?;

    let existing = state
        .gateway_repo
        .get_by_id(&id)
        .await
        .map_err(store_failure)?
        .ok_or_else(news_not_found)?;

    let removed = state.gateway_repo.delete(&id).await.map_err(store_failure)?;
    if !removed {
        return Err(news_not_found());
    }

    Ok(Json(DeletedNews {
        message: "News deleted successfully",
        title: existing.title,
    }))
}

/// Only digit ids are routed; anything else is an unknown endpoint.
/// Digit strings too large for a row id cannot match a record.
fn numeric_id(raw: &str) -> Result<RecordId, ApiError> {
    match RecordId::parse(raw) {
        id @ RecordId::Int(_) => Ok(id),
        RecordId::Key(key) if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) => {
            Err(news_not_found())
        }
        RecordId::Key(_) => Err(ApiError::not_found("Endpoint not found")),
    }
}

/// Decode a JSON body. A missing or non-object body counts as `{}` so the
/// field checks report what is missing.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Default::default()),
    };
    serde_json::from_value(value)
        .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))
}

fn require_text(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation_error(message));
    }
    Ok(())
}

fn news_not_found() -> ApiError {
    ApiError::not_found("News not found")
}

fn store_failure(e: anyhow::Error) -> ApiError {
    tracing::error!(error = %e, "Gateway store operation failed");
    ApiError::internal_error(format!("{:#}", e))
}
