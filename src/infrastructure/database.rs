use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, AppResult};

/// SQLite pool holding subjects, comments and the like ledger.
pub struct ThreadDatabase {
    pub pool: SqlitePool,
}

impl ThreadDatabase {
    pub async fn new(database_url: &str, max_connections: u32) -> AppResult<Self> {
        if let Some(parent) = database_file(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::DatabaseError(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::DatabaseError(format!("Invalid database url {}: {}", database_url, e))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to open {}: {}", database_url, e)))?;

        info!("Connected to {} ({} connections)", database_url, max_connections.max(1));
        Ok(Self { pool })
    }

    /// Each SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Invalid in-memory url: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn init(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                comment_count INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
                created INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create subjects table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                subject_id INTEGER NOT NULL REFERENCES subjects(id),
                parent_id INTEGER REFERENCES comments(id),
                author_id TEXT NOT NULL,
                content TEXT NOT NULL,
                depth INTEGER NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        // Primary key is the one-like-per-viewer guarantee
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                viewer_id TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                entity_kind TEXT NOT NULL,
                created INTEGER NOT NULL,
                PRIMARY KEY (viewer_id, entity_id, entity_kind)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create likes table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_subject_parent ON comments(subject_id, parent_id, created)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id, created)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create comments parent index: {}", e))
            })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_entity ON likes(entity_id, entity_kind)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create likes index: {}", e)))?;

        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// File path named by a sqlite url, if it names one.
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_init_is_idempotent() {
        let db = ThreadDatabase::new_in_memory().await.unwrap();
        db.init().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("threads.db").display());
        let db = ThreadDatabase::new(&url, 2).await.unwrap();
        db.init().await.unwrap();
        db.health_check().await.unwrap();
        assert!(dir.path().join("threads.db").exists());
    }

    #[tokio::test]
    async fn test_missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("threads.db");
        let url = format!("sqlite:{}", path.display());

        let db = ThreadDatabase::new(&url, 1).await.unwrap();
        db.init().await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file("sqlite:data/event_threads.db"),
            Some(Path::new("data/event_threads.db"))
        );
        assert_eq!(
            database_file("sqlite:///tmp/t.db?mode=rwc"),
            Some(Path::new("/tmp/t.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }
}
