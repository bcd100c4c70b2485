use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::curriculum::draft::DraftError;
use crate::curriculum::publish::{PublishError, ValidationIssue};
use crate::curriculum::tree::EditError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Publish validation failed; the session stays editable.
    #[error("Publish rejected with {} issue(s)", .0.len())]
    PublishRejected(Vec<ValidationIssue>),

    /// A recoverable persistence failure. The in-memory session is intact and
    /// the caller may retry.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("S3 error: {0}")]
    S3(String),
}

impl From<EditError> for AppError {
    fn from(e: EditError) -> Self {
        if e.is_not_found() {
            AppError::NotFound(e.to_string())
        } else {
            AppError::Validation(e.to_string())
        }
    }
}

impl From<DraftError> for AppError {
    fn from(e: DraftError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl From<PublishError> for AppError {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::Rejected(issues) => AppError::PublishRejected(issues),
            PublishError::AlreadyValidating => AppError::Conflict(e.to_string()),
            other => AppError::Unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::PublishRejected(issues) => {
                let body = Json(json!({
                    "error": {
                        "code": "PUBLISH_REJECTED",
                        "message": self.to_string(),
                        "issues": issues,
                    }
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Unavailable(msg) => {
                tracing::warn!("Storage unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Storage is temporarily unavailable; retry later".to_string(),
                )
            }
            AppError::S3(msg) => {
                tracing::error!("S3 error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::publish::IssueKind;
    use crate::models::ids::TopicId;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let response = AppError::NotFound("session x".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "session x");
    }

    #[tokio::test]
    async fn test_publish_rejected_carries_issues() {
        let issues = vec![ValidationIssue::new(
            IssueKind::EmptyTitle,
            "Session title is empty",
        )];
        let response = AppError::PublishRejected(issues).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "PUBLISH_REJECTED");
        assert_eq!(json["error"]["issues"][0]["kind"], "empty_title");
    }

    #[test]
    fn test_edit_error_mapping() {
        let e: AppError = EditError::TopicNotFound(TopicId::new()).into();
        assert!(matches!(e, AppError::NotFound(_)));
        let e: AppError = EditError::EmptyBlockKeys.into();
        assert!(matches!(e, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unavailable_is_503() {
        let response = AppError::Unavailable("redis down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
