//! # HTTP Server Module
//!
//! Serves the resource API over Axum.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/<resource>/…` - Routes registered by the API registry

pub mod config;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
