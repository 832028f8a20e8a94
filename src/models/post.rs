//! Forum post model

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Author shown for posts submitted without a name
pub const ANONYMOUS_AUTHOR: &str = "Anonim";

fn anonymous() -> String {
    ANONYMOUS_AUTHOR.to_string()
}

/// Forum post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "anonymous")]
    pub author: String,
    /// Creation timestamp
    pub date: DateTime<Utc>,
    /// Only changed through atomic increments
    #[serde(default)]
    pub votes: i64,
}

/// Input for creating a forum post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// A post as written to the store
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewForumPost {
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(serialize_with = "fixed_width_timestamp")]
    pub date: DateTime<Utc>,
    pub votes: i64,
}

/// Stored dates are ordered as strings, so every value gets the same width.
fn fixed_width_timestamp<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// A single up or down vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn delta(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

impl TryFrom<i64> for Vote {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Vote::Up),
            -1 => Ok(Vote::Down),
            other => Err(format!("Vote must be 1 or -1, got {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_from_delta() {
        assert_eq!(Vote::try_from(1), Ok(Vote::Up));
        assert_eq!(Vote::try_from(-1), Ok(Vote::Down));
        assert!(Vote::try_from(0).is_err());
        assert!(Vote::try_from(2).is_err());
        assert_eq!(Vote::Up.delta() + Vote::Down.delta(), 0);
    }

    #[test]
    fn test_stored_dates_sort_as_strings() {
        use chrono::TimeZone;

        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(120);

        let encode = |date| {
            let post = NewForumPost {
                title: "t".into(),
                content: "c".into(),
                author: anonymous(),
                date,
                votes: 0,
            };
            serde_json::to_value(post).unwrap()["date"]
                .as_str()
                .unwrap()
                .to_string()
        };

        assert_eq!(encode(whole), "2024-05-01T12:00:00.000000Z");
        assert!(encode(whole) < encode(later));

        let decoded: DateTime<Utc> = serde_json::from_value(serde_json::json!(encode(later))).unwrap();
        assert_eq!(decoded, later);
    }
}
