use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::ErrorBody;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for the whole backend.
///
/// Everything a handler or service can fail with collapses into one of these
/// variants; the boundary translates them into structured responses so no raw
/// internal error ever leaks to a caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// User-correctable input problem, with the offending field named.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// The caller's role lacks permission for the action.
    #[error("permission denied: {0}")]
    Authorization(String),

    /// The system is missing setup an operator must provide (for example no
    /// director account exists when a parent tries to message).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint fired (duplicate payment title, duplicate
    /// absence report, taken username).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.message().to_string())
            }
            _ => AppError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Validation { field, message } => ErrorBody {
                error: message.clone(),
                field: Some(field.clone()),
            },
            AppError::Internal(err) => {
                error!("internal error: {:#}", err);
                ErrorBody {
                    error: "internal server error".to_string(),
                    field: None,
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                field: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_carries_field() {
        let err = AppError::validation("receiver_id", "receiver is required");
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "receiver_id");
                assert_eq!(message, "receiver is required");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
