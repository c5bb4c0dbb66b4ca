// Like Ledger - one like per (viewer, entity), with denormalized counters
// kept on the subjects and comments tables.

use sqlx::{Executor, Row, Sqlite};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{AppError, AppResult},
    infrastructure::ThreadDatabase,
    models::{
        current_time_millis, millis_to_datetime, CommentId, Like, LikeState, LikeableKind,
        SubjectId, ViewerId,
    },
};

#[derive(Clone)]
pub struct LikeLedger {
    db: Arc<ThreadDatabase>,
}

impl LikeLedger {
    pub fn new(db: Arc<ThreadDatabase>) -> Self {
        Self { db }
    }

    /// Flip the viewer's like on an entity and return the state afterwards.
    ///
    /// The like row and the counter move in one transaction. A unique
    /// violation from a racing toggle is reported as the current state
    /// rather than an error.
    #[instrument(skip(self), fields(viewer = %viewer_id))]
    pub async fn toggle_like(
        &self,
        viewer_id: &ViewerId,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<LikeState> {
        match self.try_toggle(viewer_id, entity_id, kind).await {
            Err(AppError::Conflict(msg)) => {
                debug!("Concurrent toggle on {} {}: {}", kind, entity_id, msg);
                Ok(LikeState::new(
                    self.has_liked(viewer_id, entity_id, kind).await?,
                    self.stored_likes_count(entity_id, kind).await?,
                ))
            }
            result => result,
        }
    }

    async fn try_toggle(
        &self,
        viewer_id: &ViewerId,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<LikeState> {
        let table = kind.counter_table();
        let mut tx = self.db.pool.begin().await?;

        // Opening with a write takes the database write lock up front, so
        // toggles on the same row run one after another.
        let removed = sqlx::query(
            "DELETE FROM likes WHERE viewer_id = ? AND entity_id = ? AND entity_kind = ?",
        )
        .bind(viewer_id.0.as_str())
        .bind(entity_id)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let liked = if removed > 0 {
            let sql = format!(
                "UPDATE {} SET like_count = MAX(like_count - 1, 0) WHERE id = ?",
                table
            );
            sqlx::query(&sql).bind(entity_id).execute(&mut *tx).await?;
            false
        } else {
            let inserted = sqlx::query(
                "INSERT INTO likes (viewer_id, entity_id, entity_kind, created) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(viewer_id, entity_id, entity_kind) DO NOTHING",
            )
            .bind(viewer_id.0.as_str())
            .bind(entity_id)
            .bind(kind.as_str())
            .bind(current_time_millis())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted > 0 {
                let sql = format!("UPDATE {} SET like_count = like_count + 1 WHERE id = ?", table);
                sqlx::query(&sql).bind(entity_id).execute(&mut *tx).await?;
            } else {
                debug!("Like on {} {} already recorded", kind, entity_id);
            }
            true
        };

        let sql = format!("SELECT like_count FROM {} WHERE id = ?", table);
        let likes_count: Option<i64> = sqlx::query_scalar(&sql)
            .bind(entity_id)
            .fetch_optional(&mut *tx)
            .await?;

        // Dropping `tx` here rolls back the like row written above
        let Some(likes_count) = likes_count else {
            return Err(AppError::NotFound(format!("{} {} not found", kind, entity_id)));
        };

        tx.commit().await?;
        info!(
            "{} {} {} ({} likes)",
            viewer_id,
            if liked { "liked" } else { "unliked" },
            entity_id,
            likes_count
        );
        Ok(LikeState::new(liked, likes_count))
    }

    pub async fn has_liked(
        &self,
        viewer_id: &ViewerId,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM likes WHERE viewer_id = ? AND entity_id = ? AND entity_kind = ?",
        )
        .bind(viewer_id.0.as_str())
        .bind(entity_id)
        .bind(kind.as_str())
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Number of like rows. Zero for entities nobody liked, even unknown ones.
    pub async fn count_likes(&self, entity_id: i64, kind: LikeableKind) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM likes WHERE entity_id = ? AND entity_kind = ?",
        )
        .bind(entity_id)
        .bind(kind.as_str())
        .fetch_one(&self.db.pool)
        .await?;
        Ok(count)
    }

    /// The denormalized counter stored on the entity itself.
    pub async fn stored_likes_count(&self, entity_id: i64, kind: LikeableKind) -> AppResult<i64> {
        let sql = format!("SELECT like_count FROM {} WHERE id = ?", kind.counter_table());
        let count: Option<i64> = sqlx::query_scalar(&sql)
            .bind(entity_id)
            .fetch_optional(&self.db.pool)
            .await?;
        count.ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind, entity_id)))
    }

    pub async fn like_state(
        &self,
        viewer_id: Option<&ViewerId>,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<LikeState> {
        let likes_count = self.stored_likes_count(entity_id, kind).await?;
        let liked = match viewer_id {
            Some(viewer_id) => self.has_liked(viewer_id, entity_id, kind).await?,
            None => false,
        };
        Ok(LikeState::new(liked, likes_count))
    }

    /// Comments of one subject the viewer has liked.
    pub async fn liked_comments(
        &self,
        viewer_id: &ViewerId,
        subject_id: SubjectId,
    ) -> AppResult<HashSet<CommentId>> {
        Self::liked_comments_with(&self.db.pool, viewer_id, subject_id).await
    }

    /// Same as `liked_comments`, on a caller-supplied connection or transaction.
    pub(crate) async fn liked_comments_with<'e, E>(
        executor: E,
        viewer_id: &ViewerId,
        subject_id: SubjectId,
    ) -> AppResult<HashSet<CommentId>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT l.entity_id FROM likes l \
             JOIN comments c ON c.id = l.entity_id \
             WHERE l.viewer_id = ? AND l.entity_kind = 'comment' AND c.subject_id = ?",
        )
        .bind(viewer_id.0.as_str())
        .bind(subject_id.0)
        .fetch_all(executor)
        .await?;
        Ok(ids.into_iter().map(CommentId).collect())
    }

    pub async fn recent_likes(
        &self,
        entity_id: i64,
        kind: LikeableKind,
        limit: u32,
    ) -> AppResult<Vec<Like>> {
        let rows = sqlx::query(
            "SELECT viewer_id, created FROM likes WHERE entity_id = ? AND entity_kind = ? \
             ORDER BY created DESC, viewer_id ASC LIMIT ?",
        )
        .bind(entity_id)
        .bind(kind.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Like {
                viewer_id: ViewerId(row.get("viewer_id")),
                entity_id,
                entity_kind: kind,
                created_at: millis_to_datetime(row.get("created")),
            })
            .collect())
    }

    /// Recompute every stored counter from the like rows. Returns how many
    /// counters were wrong.
    #[instrument(skip(self))]
    pub async fn reconcile_counters(&self) -> AppResult<u64> {
        let mut tx = self.db.pool.begin().await?;
        let mut repaired = 0;

        for kind in [LikeableKind::Post, LikeableKind::Comment] {
            let table = kind.counter_table();
            let sql = format!(
                "UPDATE {table} SET like_count = \
                 (SELECT COUNT(*) FROM likes WHERE likes.entity_id = {table}.id AND likes.entity_kind = ?) \
                 WHERE like_count != \
                 (SELECT COUNT(*) FROM likes WHERE likes.entity_id = {table}.id AND likes.entity_kind = ?)"
            );
            repaired += sqlx::query(&sql)
                .bind(kind.as_str())
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        if repaired > 0 {
            warn!("Repaired {} drifted like counters", repaired);
        }
        Ok(repaired)
    }
}
