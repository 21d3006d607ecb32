//! Service endpoints.

use axum::Json;

use crate::{
    api::{ApiResponse, RouteError},
    Error,
};

/// Reports liveness of the service.
#[expect(clippy::unused_async, reason = "`async` is required by `axum`")]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP" }))
}

/// Greets on the root path.
#[expect(clippy::unused_async, reason = "`async` is required by `axum`")]
pub async fn root() -> ApiResponse<serde_json::Value> {
    ApiResponse::ok(
        "Visit management service is running",
        serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Responds to a request of an unknown route.
#[expect(clippy::unused_async, reason = "`async` is required by `axum`")]
pub async fn not_found() -> Error {
    RouteError::NotFound.into()
}
