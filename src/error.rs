//! Error taxonomy shared by the store, the manager, and the HTTP layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

pub type SurveyResult<T> = Result<T, SurveyError>;

#[derive(Debug, Error)]
pub enum SurveyError {
    /// The request or entity is malformed or violates a lifecycle rule.
    #[error("invalid survey: {0}")]
    Validation(String),

    #[error("survey {0} not found")]
    NotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl SurveyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SurveyError::Validation(_) => StatusCode::BAD_REQUEST,
            SurveyError::NotFound(_) => StatusCode::NOT_FOUND,
            SurveyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SurveyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log.
        let message = match &self {
            SurveyError::Storage(e) => {
                error!(error = %e, "Survey storage failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SurveyError::validation("empty body").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SurveyError::NotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SurveyError::Storage(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_body_is_generic() {
        let response = SurveyError::Storage(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
