//! Admin authentication
//!
//! A single shared password unlocks the admin area. A successful check
//! issues an opaque session token that the client presents as a cookie or
//! bearer token. Sessions are kept in memory and expire after the
//! configured lifetime; a restart logs every admin out.

use chrono::Duration;
use moka::future::Cache;
use std::time::Duration as StdDuration;

use crate::config::AdminConfig;
use crate::models::AdminSession;

/// Upper bound on concurrently held admin sessions
const MAX_SESSIONS: u64 = 10_000;

/// Longest accepted session lifetime (one year)
const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Admin login is disabled")]
    Disabled,

    #[error("Invalid password")]
    InvalidPassword,
}

pub struct AdminAuthService {
    password: Option<String>,
    ttl: Duration,
    sessions: Cache<String, AdminSession>,
}

impl AdminAuthService {
    pub fn new(config: &AdminConfig) -> Self {
        let password = config
            .password
            .clone()
            .filter(|p| !p.is_empty());
        if password.is_none() {
            tracing::warn!("No admin password configured, admin login is disabled");
        }

        let ttl_secs = config.session_ttl_seconds.clamp(1, MAX_SESSION_TTL_SECS);
        if ttl_secs != config.session_ttl_seconds {
            tracing::warn!(
                configured = config.session_ttl_seconds,
                used = ttl_secs,
                "Admin session lifetime out of range, clamped"
            );
        }
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_live(StdDuration::from_secs(ttl_secs))
            .build();

        Self {
            password,
            ttl: Duration::seconds(ttl_secs as i64),
            sessions,
        }
    }

    /// Session lifetime
    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    /// Check the admin password and open a session.
    pub async fn login(&self, password: &str) -> Result<AdminSession, AuthError> {
        let expected = self.password.as_deref().ok_or(AuthError::Disabled)?;
        if password != expected {
            return Err(AuthError::InvalidPassword);
        }

        let session = AdminSession::issue(self.ttl);
        self.sessions
            .insert(session.token.clone(), session.clone())
            .await;
        tracing::info!("Admin logged in");
        Ok(session)
    }

    /// Resolve a token to a live session.
    pub async fn validate(&self, token: &str) -> Option<AdminSession> {
        let session = self.sessions.get(token).await?;
        if session.is_expired() {
            self.sessions.invalidate(token).await;
            return None;
        }
        Some(session)
    }

    /// End a session. Returns `false` when the token was unknown.
    pub async fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).await.is_some();
        if removed {
            tracing::info!("Admin logged out");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(password: Option<&str>) -> AdminAuthService {
        AdminAuthService::new(&AdminConfig {
            password: password.map(str::to_string),
            session_ttl_seconds: 3600,
        })
    }

    #[tokio::test]
    async fn test_login_validate_logout() {
        let auth = service(Some("gizli"));

        let session = auth.login("gizli").await.unwrap();
        assert_eq!(auth.validate(&session.token).await, Some(session.clone()));

        assert!(auth.logout(&session.token).await);
        assert_eq!(auth.validate(&session.token).await, None);
        assert!(!auth.logout(&session.token).await);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let auth = service(Some("gizli"));

        assert_eq!(auth.login("Gizli").await, Err(AuthError::InvalidPassword));
        assert_eq!(auth.login("").await, Err(AuthError::InvalidPassword));
        assert_eq!(auth.validate("not-a-token").await, None);
    }

    #[tokio::test]
    async fn test_login_disabled_without_password() {
        assert_eq!(service(None).login("").await, Err(AuthError::Disabled));
        assert_eq!(service(Some("")).login("").await, Err(AuthError::Disabled));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let auth = service(Some("gizli"));

        let first = auth.login("gizli").await.unwrap();
        let second = auth.login("gizli").await.unwrap();
        assert_ne!(first.token, second.token);

        auth.logout(&first.token).await;
        assert!(auth.validate(&second.token).await.is_some());
    }

    #[test]
    fn test_session_ttl_from_config() {
        assert_eq!(service(Some("x")).session_ttl(), Duration::hours(1));
    }

    #[tokio::test]
    async fn test_session_ttl_is_clamped() {
        let auth = AdminAuthService::new(&AdminConfig {
            password: Some("gizli".to_string()),
            session_ttl_seconds: u64::MAX,
        });
        assert_eq!(auth.session_ttl(), Duration::days(365));

        let session = auth.login("gizli").await.unwrap();
        assert!(auth.validate(&session.token).await.is_some());

        let auth = AdminAuthService::new(&AdminConfig {
            password: Some("gizli".to_string()),
            session_ttl_seconds: 0,
        });
        assert_eq!(auth.session_ttl(), Duration::seconds(1));
    }
}
