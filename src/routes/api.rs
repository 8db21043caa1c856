use crate::handlers::{diagnostics, health_check, ready_check};
use crate::ws::handler::collaboration_handler;
use crate::ws::registry::SessionRegistry;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/v1/health", get(health_check))
        .route("/v1/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .with_state(registry)
}

/// Create the collaboration WebSocket route
pub fn create_collab_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route(
            "/collaboration/:workspace_slug/:project_id/:page_id",
            get(collaboration_handler),
        )
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::content_api::{ContentApiClient, Credential};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_registry() -> Arc<SessionRegistry> {
        let client = Arc::new(ContentApiClient::new(
            "http://127.0.0.1:1".to_string(),
            Credential::Static("test-token".to_string()),
            Duration::from_secs(1),
        ));
        SessionRegistry::new(client, Duration::from_secs(600), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn health_route_answers_ok() {
        let app = create_api_routes(test_registry());
        let response = app
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn collaboration_route_requires_an_upgrade() {
        let app = create_collab_routes(test_registry());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/collaboration/acme/p1/pg1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // A plain GET without the WebSocket handshake headers is rejected
        // before any session work happens.
        assert_ne!(response.status(), StatusCode::OK);
    }
}
