mod bridge;
mod clients;
mod config;
mod docs;
mod handlers;
mod models;
mod routes;
mod ws;

use axum::{routing::get, Router};
use std::panic;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clients::content_api::ContentApiClient;
use config::Config;
use docs::ApiDoc;
use routes::api::{create_api_routes, create_collab_routes};
use ws::registry::SessionRegistry;

#[tokio::main(flavor = "current_thread")]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "pages_relay=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Every outbound content API call must carry a credential; refuse to
    // start without one rather than clobbering pages unauthenticated.
    let credential = match config.credential() {
        Ok(credential) => credential,
        Err(e) => {
            error!("Failed to resolve content API credential: {}", e);
            std::process::exit(1);
        }
    };

    let client = Arc::new(ContentApiClient::new(
        config.content_api_url.clone(),
        credential,
        Duration::from_secs(config.content_api_timeout_secs),
    ));

    let registry = SessionRegistry::new(
        client,
        Duration::from_secs(config.save_interval_secs),
        Duration::from_secs(config.idle_grace_secs),
    );

    // Combine all routes
    let app_routes = Router::new()
        // Plain liveness probe
        .route("/", get(handlers::root))
        // Collaboration WebSocket endpoint
        .merge(create_collab_routes(registry.clone()))
        // Mount API routes
        .nest("/api", create_api_routes(registry))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Start the HTTP server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 Collaboration endpoint at ws://{}/collaboration", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
