// Local registry of the posts and events that threads attach to.
// The subject store owns them; only the id, kind and counters live here.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    error::{AppError, AppResult},
    infrastructure::ThreadDatabase,
    models::{current_time_millis, Subject, SubjectId, SubjectKind},
};

#[derive(Clone)]
pub struct SubjectRegistry {
    db: Arc<ThreadDatabase>,
}

impl SubjectRegistry {
    pub fn new(db: Arc<ThreadDatabase>) -> Self {
        Self { db }
    }

    /// Idempotent. Re-registering an id under a different kind is a conflict.
    #[instrument(skip(self))]
    pub async fn register(&self, id: SubjectId, kind: SubjectKind) -> AppResult<Subject> {
        let inserted = sqlx::query(
            "INSERT INTO subjects (id, kind, created) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(id.0)
        .bind(kind.as_str())
        .bind(current_time_millis())
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        let subject = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Subject {} vanished after insert", id)))?;

        if subject.kind != kind {
            return Err(AppError::Conflict(format!(
                "Subject {} is already registered as {}",
                id,
                subject.kind.as_str()
            )));
        }
        if inserted > 0 {
            info!("Registered {} {}", kind.as_str(), id);
        }
        Ok(subject)
    }

    pub async fn get(&self, id: SubjectId) -> AppResult<Option<Subject>> {
        let row = sqlx::query(
            "SELECT id, kind, like_count, comment_count, created FROM subjects WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.db.pool)
        .await?;

        row.as_ref().map(Subject::from_row).transpose()
    }

    pub async fn get_enforce(&self, id: SubjectId) -> AppResult<Subject> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", id)))
    }
}
