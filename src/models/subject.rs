use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{millis_to_datetime, SubjectId, SubjectKind};
use crate::error::AppResult;

/// Local record of a post or event that comment threads attach to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub kind: SubjectKind,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let kind: String = row.get("kind");
        Ok(Subject {
            id: SubjectId(row.get("id")),
            kind: kind.parse()?,
            likes_count: row.get("like_count"),
            comments_count: row.get("comment_count"),
            created_at: millis_to_datetime(row.get("created")),
        })
    }
}
