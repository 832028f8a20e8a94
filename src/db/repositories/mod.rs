//! Database repositories
//!
//! Repository pattern implementations for news persistence.

pub mod news;

pub use news::{DocumentNewsRepository, NewsRepository, SqlxNewsRepository};
