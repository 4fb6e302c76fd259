//! # REST API Module
//!
//! Declarative resources over the store: filtering, pagination,
//! projection, permission checks and the HTTP routes that serve them.

pub mod association;
pub mod definition;
pub mod errors;
pub mod filter;
pub mod parser;
pub mod resource;
pub mod response;
pub mod server;

pub use association::{AssociationAction, AssociationResource, BatchFailure};
pub use definition::{AuthRequirement, ResourceConfig, DEFAULT_LIMIT, MAX_LIMIT};
pub use errors::{RestError, RestResult};
pub use filter::{FilterExpr, FilterOperator};
pub use parser::QueryParams;
pub use resource::{ModelResource, Page};
pub use response::{BatchResponse, CreatedResponse, ListResponse, MessageResponse};
pub use server::ApiRegistry;
