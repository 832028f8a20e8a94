//! News model
//!
//! This module provides:
//! - `NewsItem` entity as returned by both news backends
//! - `RecordId` for backend-specific identifiers
//! - `CreateNewsInput` / `NewNewsItem` for creation (before and after defaults)
//! - `NewsPatch` for partial updates

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned when none is given
pub const DEFAULT_CATEGORY: &str = "Duyuru";

/// Author assigned when none is given
pub const DEFAULT_AUTHOR: &str = "Admin";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Store-assigned identifier.
///
/// The relational table hands out integers, the document store hands out
/// opaque string keys. Serialized untagged, so JSON shows a plain number
/// or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Key(String),
}

impl RecordId {
    /// Interpret a path segment. All-digit segments become integers.
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<i64>() {
                return RecordId::Int(n);
            }
        }
        RecordId::Key(raw.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordId::Int(n) => Some(*n),
            RecordId::Key(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Key(k) => f.write_str(k),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<String> for RecordId {
    fn from(key: String) -> Self {
        RecordId::Key(key)
    }
}

/// News item entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: RecordId,
    pub title: String,
    pub summary: String,
    /// Newline-delimited paragraphs
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "today")]
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl NewsItem {
    /// Content split into paragraphs, blank lines dropped.
    pub fn paragraphs(&self) -> Vec<&str> {
        split_paragraphs(&self.content)
    }
}

/// Split text on newlines, trimming each line and skipping blank ones.
pub fn split_paragraphs(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Input for creating a news item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNewsInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A news item ready to be written, defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNewsItem {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub author: String,
    pub date: NaiveDate,
}

impl From<CreateNewsInput> for NewNewsItem {
    fn from(input: CreateNewsInput) -> Self {
        Self {
            title: input.title,
            summary: input.summary,
            content: input.content,
            category: input.category.unwrap_or_else(default_category),
            image: input.image,
            author: input.author.unwrap_or_else(default_author),
            date: input.date.unwrap_or_else(today),
        }
    }
}

/// Partial update of a news item.
///
/// Only fields that are `Some` are written. Unknown JSON keys are ignored
/// on deserialization, so a request can never touch `id` or `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl NewsPatch {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.image.is_none()
            && self.author.is_none()
            && self.date.is_none()
    }
}
