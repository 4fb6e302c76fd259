//! # Entity Store
//!
//! SQLite-backed persistence for catalog entities.
//!
//! Queries are composed as `SelectQuery` values over compiled `Predicate`s;
//! writes go through the row helpers inside a caller-owned transaction or
//! savepoint.

mod database;
mod errors;
mod query;

pub use database::{
    count_rows, delete_record, fetch_by_id, fetch_one, fetch_rows, insert_record, select_all,
    update_record, Database,
};
pub use errors::{StoreError, StoreResult};
pub use query::{quote_ident, Predicate, SelectQuery};
