use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

pub const STATUS_MESSAGE: &str = "Data Gravity Backend is running";

#[derive(Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Interpreter that the next analysis would launch
    pub executable: String,
    pub executable_fallback: bool,
    pub script_present: bool,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is online", body = RootResponse)
    ),
    tag = "system"
)]
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: STATUS_MESSAGE.to_string(),
        status: "online".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Analysis toolchain status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let runner = state.relay.runner().status();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        executable: runner.command,
        executable_fallback: runner.fallback,
        script_present: runner.script_present,
    })
}
