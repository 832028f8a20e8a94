//! API middleware
//!
//! Contains:
//! - Shared application state
//! - `ApiError`, the JSON error body every handler returns
//! - Admin authentication (session token validation)
//! - Client address extraction for login throttling

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::{Config, NewsBackend};
use crate::db::repositories::{DocumentNewsRepository, NewsRepository, SqlxNewsRepository};
use crate::db::DynDatabasePool;
use crate::models::AdminSession;
use crate::services::{
    AdminAuthService, ForumService, ForumServiceError, LoginRateLimiter, NewsService,
    NewsServiceError,
};
use crate::store::create_document_store;

/// Name of the cookie carrying the admin session token
pub const SESSION_COOKIE: &str = "admin_session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    /// Relational table served by the `/api/news` gateway
    pub gateway_repo: Arc<dyn NewsRepository>,
    pub news_service: Arc<NewsService>,
    pub forum_service: Arc<ForumService>,
    pub auth_service: Arc<AdminAuthService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Wire repositories and services for the configured backends.
    pub fn new(config: &Config, pool: DynDatabasePool) -> Self {
        let store = create_document_store(&config.store, pool.clone());
        let gateway_repo = SqlxNewsRepository::boxed(pool.clone());

        let news_repo = match config.news.backend {
            NewsBackend::Document => DocumentNewsRepository::boxed(store.clone()),
            NewsBackend::Relational => gateway_repo.clone(),
        };

        Self {
            pool,
            gateway_repo,
            news_service: Arc::new(NewsService::new(news_repo)),
            forum_service: Arc::new(ForumService::new(store)),
            auth_service: Arc::new(AdminAuthService::new(&config.admin)),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
        }
    }
}

/// Validated admin session attached to the request
#[derive(Debug, Clone, Serialize)]
pub struct AdminClaim {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<AdminSession> for AdminClaim {
    fn from(session: AdminSession) -> Self {
        Self {
            token: session.token,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

impl<S> FromRequestParts<S> for AdminClaim
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminClaim>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Admin login required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TOO_MANY_REQUESTS", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "TOO_MANY_REQUESTS" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<NewsServiceError> for ApiError {
    fn from(e: NewsServiceError) -> Self {
        match e {
            NewsServiceError::NotFound(_) => ApiError::not_found("News not found"),
            NewsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            NewsServiceError::Store(e) => {
                tracing::error!(error = %e, "News operation failed");
                ApiError::internal_error(format!("{:#}", e))
            }
        }
    }
}

impl From<ForumServiceError> for ApiError {
    fn from(e: ForumServiceError) -> Self {
        match e {
            ForumServiceError::NotFound(_) => ApiError::not_found("Post not found"),
            ForumServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ForumServiceError::Store(e) => {
                tracing::error!(error = %e, "Forum operation failed");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

/// JSON request body whose rejections answer as `ApiError`.
///
/// Malformed JSON, a wrong content type and mistyped fields all become
/// 400 `VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Extract the admin session token from the request
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

/// Admin authentication middleware
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Admin login required"))?;

    let session = state
        .auth_service
        .validate(&token)
        .await
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AdminClaim::from(session));
    Ok(next.run(request).await)
}

/// Answer every OPTIONS request with an empty 200.
///
/// Preflights with CORS headers are handled by the `CorsLayer` before
/// reaching this point.
pub async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// Response for any path or method without a handler
pub async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

/// Client address used for login throttling.
///
/// Checks X-Forwarded-For and X-Real-IP, then falls back to the connection
/// info. `None` when nothing usable is present.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_headers = forwarded_ip(&parts.headers);
        let from_connection = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(from_headers.or(from_connection)))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        // First hop is the client
        if let Some(ip) = forwarded.split(',').next().and_then(|s| s.trim().parse().ok()) {
            return Some(ip);
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&map), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; admin_session=abc; other=1")]);
        assert_eq!(extract_session_token(&map), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "admin_session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&map), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        assert!(extract_session_token(&headers(&[(header::AUTHORIZATION, "Basic xyz")])).is_none());
        assert!(extract_session_token(&headers(&[(header::COOKIE, "session=abc")])).is_none());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::too_many_requests("x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::internal_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_body() {
        let body = serde_json::to_value(ApiError::not_found("News not found")).unwrap();
        assert_eq!(body, serde_json::json!({"error": "News not found", "code": "NOT_FOUND"}));
    }

    #[test]
    fn test_forwarded_ip() {
        let map = headers(&[(
            header::HeaderName::from_static("x-forwarded-for"),
            "203.0.113.7, 10.0.0.1",
        )]);
        assert_eq!(forwarded_ip(&map), Some("203.0.113.7".parse().unwrap()));

        let map = headers(&[(header::HeaderName::from_static("x-real-ip"), "::1")]);
        assert_eq!(forwarded_ip(&map), Some("::1".parse().unwrap()));

        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}
