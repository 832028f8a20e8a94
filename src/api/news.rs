//! Public news API

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::middleware::{ApiError, AppState};
use crate::models::{NewsItem, RecordId};

#[derive(Debug, Serialize)]
pub struct NewsListResponse {
    pub news: Vec<NewsItem>,
    pub total: usize,
}

/// News detail with content already split for rendering
#[derive(Debug, Serialize)]
pub struct NewsDetailResponse {
    #[serde(flatten)]
    pub item: NewsItem,
    pub paragraphs: Vec<String>,
}

impl From<NewsItem> for NewsDetailResponse {
    fn from(item: NewsItem) -> Self {
        let paragraphs = item.paragraphs().into_iter().map(String::from).collect();
        Self { item, paragraphs }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_news))
        .route("/{id}", get(get_news))
}

/// GET /api/v1/news
async fn list_news(State(state): State<AppState>) -> Json<NewsListResponse> {
    let news = state.news_service.list_news().await;
    Json(NewsListResponse {
        total: news.len(),
        news,
    })
}

/// GET /api/v1/news/{id}
async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NewsDetailResponse>, ApiError> {
    let item = state.news_service.get_news(&RecordId::parse(&id)).await?;
    Ok(Json(item.into()))
}
