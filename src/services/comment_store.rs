// Comment Store - persistence and ordered retrieval of comments

use sqlx::{Executor, Sqlite};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::{
    error::{AppError, AppResult},
    infrastructure::{Cache, IdGenerator, ThreadDatabase},
    models::{millis_to_datetime, Comment, CommentId, SubjectId, ViewerId},
};

const COMMENT_COLUMNS: &str =
    "id, subject_id, parent_id, author_id, content, depth, like_count, created, updated";

/// What a reply needs to know about its parent. Never changes once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParentInfo {
    subject_id: SubjectId,
    depth: i32,
}

pub struct CommentStore {
    db: Arc<ThreadDatabase>,
    ids: Arc<IdGenerator>,
    parents: Mutex<Cache<CommentId, ParentInfo>>,
    max_depth: i32,
}

impl CommentStore {
    pub fn new(
        db: Arc<ThreadDatabase>,
        ids: Arc<IdGenerator>,
        cache_capacity: usize,
        max_depth: i32,
    ) -> Self {
        Self {
            db,
            ids,
            parents: Mutex::new(Cache::new(cache_capacity)),
            max_depth,
        }
    }

    /// Persist a root comment. Content must already be validated.
    #[instrument(skip(self, content), fields(author = %author_id))]
    pub async fn create_comment(
        &self,
        author_id: &ViewerId,
        subject_id: SubjectId,
        content: &str,
    ) -> AppResult<Comment> {
        self.insert(author_id, subject_id, None, content).await
    }

    /// Persist a reply one level below `parent_id`.
    #[instrument(skip(self, content), fields(author = %author_id))]
    pub async fn create_reply(
        &self,
        author_id: &ViewerId,
        subject_id: SubjectId,
        parent_id: CommentId,
        content: &str,
    ) -> AppResult<Comment> {
        let parent = self
            .parent_info(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", parent_id)))?;

        if parent.subject_id != subject_id {
            return Err(AppError::Validation(format!(
                "Invalid subject_id/parent_id combination: comment {} belongs to subject {}",
                parent_id, parent.subject_id
            )));
        }

        let depth = parent.depth + 1;
        if depth > self.max_depth {
            return Err(AppError::Validation(format!(
                "Max comment depth of {} reached",
                self.max_depth
            )));
        }

        self.insert(author_id, subject_id, Some((parent_id, depth)), content)
            .await
    }

    async fn insert(
        &self,
        author_id: &ViewerId,
        subject_id: SubjectId,
        parent: Option<(CommentId, i32)>,
        content: &str,
    ) -> AppResult<Comment> {
        let id = self.ids.next_id();
        // Creation time comes from the id so that ordering by time and by id agree
        let created = IdGenerator::extract_timestamp(id);
        let depth = parent.map(|(_, depth)| depth).unwrap_or(0);
        let parent_id = parent.map(|(parent_id, _)| parent_id);

        let mut tx = self.db.pool.begin().await?;

        let bumped = sqlx::query("UPDATE subjects SET comment_count = comment_count + 1 WHERE id = ?")
            .bind(subject_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if bumped == 0 {
            return Err(AppError::NotFound(format!("Subject {} not found", subject_id)));
        }

        sqlx::query(
            "INSERT INTO comments (id, subject_id, parent_id, author_id, content, depth, like_count, created, updated) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(subject_id.0)
        .bind(parent_id.map(|p| p.0))
        .bind(author_id.0.as_str())
        .bind(content)
        .bind(depth)
        .bind(created)
        .bind(created)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.parents
            .lock()
            .await
            .insert(CommentId(id), ParentInfo { subject_id, depth });

        info!(
            "Created comment {} on subject {} at depth {}",
            id, subject_id, depth
        );
        Ok(Comment {
            id: CommentId(id),
            author_id: author_id.clone(),
            subject_id,
            parent_id,
            content: content.to_string(),
            depth,
            likes_count: 0,
            created_at: millis_to_datetime(created),
            updated_at: millis_to_datetime(created),
        })
    }

    async fn parent_info(&self, id: CommentId) -> AppResult<Option<ParentInfo>> {
        if let Some(info) = self.parents.lock().await.get(&id).copied() {
            debug!("Parent cache hit for {}", id);
            return Ok(Some(info));
        }

        let row: Option<(i64, i32)> =
            sqlx::query_as("SELECT subject_id, depth FROM comments WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.db.pool)
                .await?;

        let info = row.map(|(subject_id, depth)| ParentInfo {
            subject_id: SubjectId(subject_id),
            depth,
        });
        if let Some(info) = info {
            self.parents.lock().await.insert(id, info);
        }
        Ok(info)
    }

    /// Top-level comments of a subject, newest first.
    pub async fn find_roots(&self, subject_id: SubjectId) -> AppResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE subject_id = ? AND parent_id IS NULL \
             ORDER BY created DESC, id DESC",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(subject_id.0)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows.iter().map(Comment::from_row).collect())
    }

    /// Direct replies of a comment, oldest first.
    pub async fn find_children(&self, parent_id: CommentId) -> AppResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE parent_id = ? ORDER BY created ASC, id ASC",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(parent_id.0)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows.iter().map(Comment::from_row).collect())
    }

    /// Every comment of a subject in one read, oldest first.
    pub async fn find_by_subject(&self, subject_id: SubjectId) -> AppResult<Vec<Comment>> {
        Self::find_by_subject_with(&self.db.pool, subject_id).await
    }

    pub(crate) async fn find_by_subject_with<'e, E>(
        executor: E,
        subject_id: SubjectId,
    ) -> AppResult<Vec<Comment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM comments WHERE subject_id = ? ORDER BY created ASC, id ASC",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(subject_id.0)
            .fetch_all(executor)
            .await?;
        Ok(rows.iter().map(Comment::from_row).collect())
    }

    pub async fn get(&self, id: CommentId) -> AppResult<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.as_ref().map(Comment::from_row))
    }
}
