//! Admin session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof of a successful admin password check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSession {
    /// Bearer token handed to the client
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    /// Issue a fresh session that lives for `ttl`.
    pub fn issue(ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_expiry() {
        let session = AdminSession::issue(Duration::minutes(5));
        assert!(!session.is_expired());
        assert_eq!(session.expires_at - session.created_at, Duration::minutes(5));
        assert_ne!(session.token, AdminSession::issue(Duration::minutes(5)).token);
    }

    #[test]
    fn test_expired_session() {
        let session = AdminSession::issue(Duration::seconds(-1));
        assert!(session.is_expired());
    }
}
