//! retailpos - point-of-sale REST backend
//!
//! Declarative resources over SQLite: each entity gets list, fetch,
//! create, bulk update, patch and delete routes with query-string
//! filtering, pagination, projection and shop-scoped permissions.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod http_server;
pub mod model;
pub mod observability;
pub mod rest_api;
pub mod store;
