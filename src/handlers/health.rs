use axum::Json;
use crate::models::{HealthResponse, ReadyResponse};
use tracing::debug;

/// Liveness endpoint for process supervision
pub async fn root() -> &'static str {
    "OK"
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check() -> Json<ReadyResponse> {
    debug!("Readiness check requested");
    Json(ReadyResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_answers_static_ok() {
        assert_eq!(root().await, "OK");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
    }
}
