use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{millis_to_datetime, CommentId, SubjectId, ViewerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author_id: ViewerId,
    pub subject_id: SubjectId,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub depth: i32,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Comment {
            id: CommentId(row.get("id")),
            author_id: ViewerId(row.get("author_id")),
            subject_id: SubjectId(row.get("subject_id")),
            parent_id: row.get::<Option<i64>, _>("parent_id").map(CommentId),
            content: row.get("content"),
            depth: row.get("depth"),
            likes_count: row.get("like_count"),
            created_at: millis_to_datetime(row.get("created")),
            updated_at: millis_to_datetime(row.get("updated")),
        }
    }
}

/// A comment as seen by one viewer, with its replies nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub liked: bool,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn leaf(comment: Comment, liked: bool) -> Self {
        Self {
            comment,
            liked,
            replies: Vec::new(),
        }
    }

    pub fn id(&self) -> CommentId {
        self.comment.id
    }

    /// Number of nodes in this subtree, itself included.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

/// Depth-first search over a forest without recursion.
pub fn find_node_mut(nodes: &mut [CommentNode], id: CommentId) -> Option<&mut CommentNode> {
    let mut stack: Vec<&mut CommentNode> = nodes.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if node.comment.id == id {
            return Some(node);
        }
        stack.extend(node.replies.iter_mut());
    }
    None
}
