use crate::services::relay::RelayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Body of every non-2xx response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        tracing::debug!("Relay failure: {:?}", e);
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "detail": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_relay_errors_are_internal_with_detail() {
        let (status, body) = render(AppError::from(RelayError::ScriptFailed {
            exit_code: Some(1),
            stderr: "Execution halted".to_string(),
        }))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Analysis script failed: Execution halted");
    }

    #[test]
    fn test_every_relay_error_becomes_internal() {
        let errors = vec![
            RelayError::Upload(std::io::Error::other("disk full")),
            RelayError::ScriptFailed {
                exit_code: Some(2),
                stderr: "boom".to_string(),
            },
            RelayError::InvalidOutput(serde_json::from_str::<serde_json::Value>("nope").unwrap_err()),
        ];

        for err in errors {
            let expected = err.to_string();
            match AppError::from(err) {
                AppError::Internal(msg) => assert_eq!(msg, expected),
                other => panic!("expected Internal, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_client_errors_keep_their_status() {
        let (status, body) = render(AppError::UnprocessableEntity("No file provided".into())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, json!({"detail": "No file provided"}));

        let (status, _) = render(AppError::PayloadTooLarge("too big".into())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
