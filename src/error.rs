use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Database(anyhow::Error),
    DatabaseError(String),
    NotFound(String),
    Validation(String),
    Conflict(String),
    Unauthorized(String),
    Upstream(String),
    TimeoutError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream unavailable: {}", msg),
            AppError::TimeoutError(msg) => write!(f, "Timeout error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::TimeoutError(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Text that is safe to show to an end user. Storage failures collapse
    /// into a generic message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
            AppError::Upstream(_) => "Service temporarily unavailable, please retry".to_string(),
            AppError::TimeoutError(_) => "The request took too long, please retry".to_string(),
            AppError::Database(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                "Something went wrong".to_string()
            }
        }
    }

    /// Rebuild an error from an HTTP status and the message carried in an
    /// error body.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => AppError::Validation(message),
            401 => AppError::Unauthorized(message),
            404 => AppError::NotFound(message),
            408 => AppError::TimeoutError(message),
            409 => AppError::Conflict(message),
            503 => AppError::Upstream(message),
            _ => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                "Internal server error".to_string()
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                self.user_message()
            }
            AppError::TimeoutError(msg) => {
                tracing::warn!("Timeout: {}", msg);
                self.user_message()
            }
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Upstream(format!("Database unavailable: {}", err))
            }
            _ => AppError::Database(err.into()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_user_message_hides_storage_details() {
        let err = AppError::DatabaseError("no such table: likes".to_string());
        assert_eq!(err.user_message(), "Something went wrong");

        let err = AppError::Validation("Comment content must not be empty".to_string());
        assert_eq!(err.user_message(), "Comment content must not be empty");
    }

    #[test]
    fn test_from_status_round_trips_variant() {
        let err = AppError::from_status(404, "Comment 7 not found".to_string());
        assert!(matches!(err, AppError::NotFound(_)));
        let err = AppError::from_status(502, "bad gateway".to_string());
        assert!(matches!(err, AppError::Internal(_)));
    }
}
