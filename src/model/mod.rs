//! # Entity Model
//!
//! Field registry, entity definitions and the schema that loads and dumps
//! records. Domain entities are declared in `catalog`.

pub mod entity;
pub mod field;
pub mod schema;

pub use entity::{to_underscore, EntityDef, Relation};
pub use field::{FieldDef, FieldKind};
pub use schema::{Projection, Record, Schema, ValidationErrors};
