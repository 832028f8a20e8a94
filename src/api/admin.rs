//! Admin API
//!
//! Login/logout are public. Everything else sits behind `require_admin`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::middleware::{
    extract_session_token, require_admin, AdminClaim, ApiError, AppState, ClientIp, JsonBody,
    SESSION_COOKIE,
};
use crate::models::{CreateNewsInput, NewsItem, NewsPatch, RecordId};
use crate::services::AuthError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewsListResponse {
    pub news: Vec<NewsItem>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub title: String,
}

/// Public admin routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Routes that require an admin session
pub fn protected_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/session", get(session))
        .route("/news", get(list_news).post(create_news))
        .route(
            "/news/{id}",
            get(get_news).put(update_news).delete(delete_news),
        )
        .route_layer(axum_middleware::from_fn_with_state(state, require_admin))
}

/// POST /api/v1/admin/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = ip {
        if state.rate_limiter.is_limited(ip).await {
            tracing::warn!(%ip, "Admin login throttled");
            return Err(ApiError::too_many_requests(
                "Too many failed attempts, try again in 15 minutes",
            ));
        }
    }

    let session = match state.auth_service.login(&body.password).await {
        Ok(session) => session,
        Err(e) => {
            if let Some(ip) = ip {
                state.rate_limiter.record_failure(ip).await;
            }
            tracing::warn!(ip = ?ip, error = %e, "Admin login failed");
            return Err(match e {
                AuthError::Disabled => ApiError::unauthorized("Admin login is disabled"),
                AuthError::InvalidPassword => ApiError::unauthorized("Invalid password"),
            });
        }
    };

    if let Some(ip) = ip {
        state.rate_limiter.clear(ip).await;
    }

    let max_age = state.auth_service.session_ttl().num_seconds();
    let cookie = session_cookie(&session.token, max_age)?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/v1/admin/logout
///
/// Always clears the cookie, even when the session was already gone.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.auth_service.logout(&token).await;
    }

    let cookie = session_cookie("", 0)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "success": true })),
    ))
}

/// GET /api/v1/admin/session
async fn session(claim: AdminClaim) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        created_at: claim.created_at,
        expires_at: claim.expires_at,
    })
}

/// GET /api/v1/admin/news
async fn list_news(State(state): State<AppState>) -> Json<NewsListResponse> {
    let news = state.news_service.list_news().await;
    // Reads degrade like the list itself
    let total = match state.news_service.count_news().await {
        Ok(total) => total,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count news");
            news.len() as u64
        }
    };
    Json(NewsListResponse { news, total })
}

/// GET /api/v1/admin/news/{id}
async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NewsItem>, ApiError> {
    Ok(Json(state.news_service.get_news(&RecordId::parse(&id)).await?))
}

/// POST /api/v1/admin/news
async fn create_news(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateNewsInput>,
) -> Result<(StatusCode, Json<NewsItem>), ApiError> {
    let item = state.news_service.create_news(body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/v1/admin/news/{id}
async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<NewsPatch>,
) -> Result<Json<NewsItem>, ApiError> {
    let item = state
        .news_service
        .update_news(&RecordId::parse(&id), patch)
        .await?;
    Ok(Json(item))
}

/// DELETE /api/v1/admin/news/{id}
async fn delete_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state.news_service.delete_news(&RecordId::parse(&id)).await?;
    Ok(Json(DeleteResponse {
        message: "News deleted successfully",
        title: removed.title,
    }))
}

fn session_cookie(token: &str, max_age: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))
}
