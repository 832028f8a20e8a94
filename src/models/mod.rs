//! Data models
//!
//! Entities and input types shared by the repositories, services and API:
//! news items, forum posts and admin sessions.

mod news;
mod post;
mod session;

pub use news::{
    split_paragraphs, CreateNewsInput, NewNewsItem, NewsItem, NewsPatch, RecordId, DEFAULT_AUTHOR,
    DEFAULT_CATEGORY,
};
pub(crate) use post::NewForumPost;
pub use post::{CreatePostInput, ForumPost, Vote, ANONYMOUS_AUTHOR};
pub use session::AdminSession;
