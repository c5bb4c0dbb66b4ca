use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LikeableKind, ViewerId};

/// One row of the like ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub viewer_id: ViewerId,
    pub entity_id: i64,
    pub entity_kind: LikeableKind,
    pub created_at: DateTime<Utc>,
}

/// Like state of one entity from one viewer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}

impl LikeState {
    pub fn new(liked: bool, likes_count: i64) -> Self {
        Self { liked, likes_count }
    }

    /// State after flipping `liked` locally, before the server answers.
    pub fn flipped(self) -> Self {
        if self.liked {
            Self::new(false, (self.likes_count - 1).max(0))
        } else {
            Self::new(true, self.likes_count + 1)
        }
    }
}
