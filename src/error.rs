use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy surfaced by every workflow.
///
/// Each variant maps to exactly one HTTP status; the body is the uniform
/// `{statusCode, message, success: false}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Authorization("invalid or expired token".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Authorization(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Database(err) => classify_sqlx_error(err),
        };

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": message,
            "success": false,
        }));

        (status, body).into_response()
    }
}

/// Classify a sqlx error into a status and a sanitized message.
///
/// Unique violations (23505) become 409 so a create that loses the
/// uniqueness race still reports a conflict; foreign-key violations (23503)
/// become 404 since the referenced row is gone.
fn classify_sqlx_error(err: sqlx::Error) -> (StatusCode, String) {
    match &err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "resource not found".to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => (
                StatusCode::CONFLICT,
                "duplicate value violates a unique constraint".to_string(),
            ),
            Some("23503") => (
                StatusCode::NOT_FOUND,
                "referenced resource not found".to_string(),
            ),
            _ => {
                tracing::error!(error = %db_err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        },
        other => {
            tracing::error!(error = %other, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (AppError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("c".into()), StatusCode::CONFLICT),
            (
                AppError::Authentication("a".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Authorization("a".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (
                AppError::Internal("i".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_message_is_not_leaked() {
        let response = AppError::Internal("secret pool detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn jwt_errors_become_authorization() {
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        let err = AppError::from(jwt_err);
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
