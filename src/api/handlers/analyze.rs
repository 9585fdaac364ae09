use crate::AppState;
use crate::api::error::AppError;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde_json::Value;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart form accepted by `/analyze`
#[derive(ToSchema)]
pub struct AnalyzeForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/analyze",
    request_body(content = AnalyzeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "JSON produced by the analysis script, passed through unchanged"),
        (status = 413, description = "Upload exceeds the size limit", body = crate::api::error::ErrorResponse),
        (status = 422, description = "No file field in the form", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Upload, execution or parse failure", body = crate::api::error::ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(e.body_text())
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let reader = StreamReader::new(field.map_err(std::io::Error::other));

        let result = state.relay.handle(reader, filename.as_deref()).await?;
        return Ok(Json(result));
    }

    Err(AppError::UnprocessableEntity("No file provided".to_string()))
}
