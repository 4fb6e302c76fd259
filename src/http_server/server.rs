//! # HTTP Server
//!
//! Wraps the resource router with the health route, request tracing and
//! CORS, then serves it.

use std::io;
use std::net::SocketAddr;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use crate::observability::Event;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// HTTP server for the resource API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server around an already built resource router
    pub fn new(config: HttpServerConfig, api: Router) -> Self {
        let router = Self::build_router(&config, api);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, api: Router) -> Router {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        let cors = if config.allowed_origins.is_empty() {
            cors.allow_origin(Any)
        } else {
            cors.allow_origin(AllowOrigin::list(config.origin_headers()))
        };

        Router::new()
            .route("/health", get(health_handler))
            .merge(api)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the shutdown signal resolves
    pub async fn start(self) -> Result<(), io::Error> {
        let addr = self.config.socket_addr();

        let listener = TcpListener::bind(addr).await?;
        info!(event = Event::ServerListening.as_str(), %addr, "serving");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(event = Event::ShutdownStart.as_str());
    }
}
