//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and persistence:
//! - validating input before anything is written
//! - degrading list reads when a backend is unavailable
//! - keeping admin sessions and login throttling in memory

pub mod auth;
pub mod forum;
pub mod news;
pub mod rate_limiter;

pub use auth::{AdminAuthService, AuthError};
pub use forum::{ForumService, ForumServiceError};
pub use news::{NewsService, NewsServiceError};
pub use rate_limiter::LoginRateLimiter;
