//! Rate limiter for admin login attempts
//!
//! Failed password checks are tracked per client IP. An address with 5
//! failures in the last 15 minutes is refused until older failures age out.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_FAILURES: usize = 5;
const WINDOW_MINUTES: i64 = 15;

/// Login rate limiter
pub struct LoginRateLimiter {
    failures: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check if an address has used up its failed attempts.
    pub async fn is_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - Duration::minutes(WINDOW_MINUTES);
        let mut failures = self.failures.write().await;

        match failures.get_mut(&ip) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= MAX_FAILURES
            }
            None => false,
        }
    }

    /// Record a failed password check.
    pub async fn record_failure(&self, ip: IpAddr) {
        let mut failures = self.failures.write().await;
        failures.entry(ip).or_default().push(Utc::now());
    }

    /// Forget failures after a successful login.
    pub async fn clear(&self, ip: IpAddr) {
        self.failures.write().await.remove(&ip);
    }

    /// Drop expired entries (called periodically)
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - Duration::minutes(WINDOW_MINUTES);
        let mut failures = self.failures.write().await;
        failures.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.failures.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
