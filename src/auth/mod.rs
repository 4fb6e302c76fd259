//! # Auth Module
//!
//! Caller identity, bearer tokens and row-level access policies for the
//! resource layer.

pub mod errors;
pub mod jwt;
pub mod policy;
pub mod principal;

pub use errors::{AuthError, AuthResult};
pub use jwt::{JwtClaims, JwtConfig, JwtManager};
pub use policy::{AccessPolicy, OpenAccess, ShopScoped, ShopSource, WriteAction};
pub use principal::Principal;
