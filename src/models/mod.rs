// Domain types shared by the store, the HTTP layer and the client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

pub mod comment;
pub mod like;
pub mod subject;

pub use comment::{Comment, CommentNode};
pub use like::{Like, LikeState};
pub use subject::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

/// Id of a post or event owned by the external subject store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

/// Id issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub String);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(id: &str) -> Self {
        ViewerId(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Post,
    Event,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post",
            SubjectKind::Event => "event",
        }
    }
}

impl FromStr for SubjectKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "post" => Ok(SubjectKind::Post),
            "event" => Ok(SubjectKind::Event),
            _ => Err(AppError::Validation(format!("Unknown subject kind: {}", s))),
        }
    }
}

/// What a like points at. `Post` covers every subject, events included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeableKind {
    Post,
    Comment,
}

impl LikeableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeableKind::Post => "post",
            LikeableKind::Comment => "comment",
        }
    }

    /// Table carrying the denormalized counter for this kind.
    pub(crate) fn counter_table(&self) -> &'static str {
        match self {
            LikeableKind::Post => "subjects",
            LikeableKind::Comment => "comments",
        }
    }
}

impl FromStr for LikeableKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "post" | "event" | "subject" => Ok(LikeableKind::Post),
            "comment" => Ok(LikeableKind::Comment),
            _ => Err(AppError::Validation(format!("Unknown likeable kind: {}", s))),
        }
    }
}

impl fmt::Display for LikeableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
