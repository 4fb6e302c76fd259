//! # Database
//!
//! One SQLite connection shared behind a mutex. A request holds the lock for
//! its whole unit of work; concurrency beyond that is left to SQLite.
//!
//! The row helpers take `&Connection` so they run unchanged inside a
//! `Transaction` or a `Savepoint` (both deref to `Connection`).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use tracing::info;

use super::errors::{StoreError, StoreResult};
use super::query::{quote_ident, Predicate, SelectQuery};
use crate::model::{EntityDef, Record};
use crate::observability::Event;

/// Shared database handle
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection for one unit of work
    pub fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Create every entity's table in a single transaction
    pub fn migrate(&self, entities: &[&EntityDef]) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for entity in entities {
            tx.execute_batch(&entity.create_table_sql())?;
        }
        tx.commit()?;
        info!(event = Event::SchemaMigrated.as_str(), tables = entities.len(), "schema migrated");
        Ok(())
    }
}

/// Base query selecting every declared column of the entity
pub fn select_all(entity: &EntityDef) -> SelectQuery {
    SelectQuery::new(entity.table(), entity.column_names())
}

/// Run a query and decode the rows by the entity's field kinds
pub fn fetch_rows(
    conn: &Connection,
    entity: &EntityDef,
    query: &SelectQuery,
) -> StoreResult<Vec<Record>> {
    let (sql, params) = query.to_sql();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (idx, field) in entity.fields().iter().enumerate() {
            let value = field.kind.sql_to_json(row.get_ref(idx)?);
            record.insert(field.name.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

/// First row matching the query, if any
pub fn fetch_one(
    conn: &Connection,
    entity: &EntityDef,
    query: SelectQuery,
) -> StoreResult<Option<Record>> {
    Ok(fetch_rows(conn, entity, &query.limit(1))?.into_iter().next())
}

/// Fetch a row by id, ignoring any permission narrowing
pub fn fetch_by_id(conn: &Connection, entity: &EntityDef, id: &str) -> StoreResult<Option<Record>> {
    let query = select_all(entity).filter(Predicate::eq("id", SqlValue::Text(id.to_string())));
    fetch_one(conn, entity, query)
}

pub fn count_rows(conn: &Connection, query: &SelectQuery) -> StoreResult<usize> {
    let (sql, params) = query.count_sql();
    let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
    Ok(count as usize)
}

/// Insert the declared fields present in `record`
pub fn insert_record(conn: &Connection, entity: &EntityDef, record: &Record) -> StoreResult<()> {
    let (columns, values) = bind_fields(entity, record)?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(entity.table()),
        columns.join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

/// Apply `changes` to the row with `id`; returns the number of rows touched
pub fn update_record(
    conn: &Connection,
    entity: &EntityDef,
    id: &str,
    changes: &Record,
) -> StoreResult<usize> {
    let (columns, mut values) = bind_fields(entity, changes)?;
    let mut assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c)).collect();
    if entity.stamps_updates() {
        assignments.push(format!("{} = CURRENT_TIMESTAMP", quote_ident("updated_on")));
    }
    if assignments.is_empty() {
        return Ok(0);
    }
    values.push(SqlValue::Text(id.to_string()));

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(entity.table()),
        assignments.join(", "),
        quote_ident("id")
    );
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub fn delete_record(conn: &Connection, entity: &EntityDef, id: &str) -> StoreResult<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(entity.table()),
        quote_ident("id")
    );
    Ok(conn.execute(&sql, [id])?)
}

fn bind_fields(entity: &EntityDef, record: &Record) -> StoreResult<(Vec<String>, Vec<SqlValue>)> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (key, value) in record {
        let Some(field) = entity.get_field(key) else {
            continue;
        };
        let bound = field.kind.json_to_sql(value).ok_or_else(|| {
            StoreError::Internal(format!(
                "{}.{} cannot store {}",
                entity.table(),
                key,
                value_kind(value)
            ))
        })?;
        columns.push(quote_ident(key));
        values.push(bound);
    }
    Ok((columns, values))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
