//! # Field Registry
//!
//! Typed field declarations for entities. Every filter, ordering and
//! projection a resource declares is checked against these at registration.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::Serialize;
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::store::quote_ident;

/// Canonical storage format for timestamps (matches SQLite `CURRENT_TIMESTAMP`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Uuid,
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Uuid => "uuid",
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
            FieldKind::Real => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "datetime",
        }
    }

    /// SQLite column affinity
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Uuid | FieldKind::Text | FieldKind::Timestamp => "TEXT",
            FieldKind::Integer | FieldKind::Boolean => "INTEGER",
            FieldKind::Real => "REAL",
        }
    }

    /// Convert a JSON payload value into a storage value.
    ///
    /// Returns `None` when the value does not have the shape this kind needs.
    /// No implicit coercion: `"5"` is not an integer.
    pub fn json_to_sql(&self, value: &Value) -> Option<SqlValue> {
        if value.is_null() {
            return Some(SqlValue::Null);
        }

        match self {
            FieldKind::Uuid => value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(|id| SqlValue::Text(id.to_string())),
            FieldKind::Text => value.as_str().map(|s| SqlValue::Text(s.to_string())),
            FieldKind::Integer => value.as_i64().map(SqlValue::Integer),
            FieldKind::Real => value.as_f64().map(SqlValue::Real),
            FieldKind::Boolean => value.as_bool().map(|b| SqlValue::Integer(b as i64)),
            FieldKind::Timestamp => value
                .as_str()
                .and_then(parse_timestamp)
                .map(|ts| SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string())),
        }
    }

    /// Re-render a payload value as storage will hold it: UUIDs in
    /// lowercase hyphenated form, timestamps in `TIMESTAMP_FORMAT`.
    pub fn canonical_json(&self, value: &Value) -> Option<Value> {
        let canonical = match self.json_to_sql(value)? {
            SqlValue::Null | SqlValue::Blob(_) => Value::Null,
            SqlValue::Integer(i) if *self == FieldKind::Boolean => Value::Bool(i != 0),
            SqlValue::Integer(i) => Value::Number(i.into()),
            SqlValue::Real(f) => Value::Number(Number::from_f64(f)?),
            SqlValue::Text(text) => Value::String(text),
        };
        Some(canonical)
    }

    /// Convert a raw query-string operand into a storage value.
    pub fn parse_operand(&self, raw: &str) -> Option<SqlValue> {
        match self {
            FieldKind::Uuid => Uuid::parse_str(raw)
                .ok()
                .map(|id| SqlValue::Text(id.to_string())),
            FieldKind::Text => Some(SqlValue::Text(raw.to_string())),
            FieldKind::Integer => raw.trim().parse::<i64>().ok().map(SqlValue::Integer),
            FieldKind::Real => raw.trim().parse::<f64>().ok().map(SqlValue::Real),
            FieldKind::Boolean => match raw {
                "true" | "1" => Some(SqlValue::Integer(1)),
                "false" | "0" => Some(SqlValue::Integer(0)),
                _ => None,
            },
            FieldKind::Timestamp => parse_timestamp(raw)
                .map(|ts| SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string())),
        }
    }

    /// Convert a stored column value back into JSON
    pub fn sql_to_json(&self, value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => match self {
                FieldKind::Boolean => Value::Bool(i != 0),
                FieldKind::Real => Number::from_f64(i as f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                _ => Value::Number(i.into()),
            },
            ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(_) => Value::Null,
        }
    }
}

/// Parse an ISO-8601 timestamp (RFC 3339, naive date-time, or bare date).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A single declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Must be present in create payloads
    pub required: bool,
    pub nullable: bool,
    pub unique: bool,
    /// Server-assigned; never accepted from payloads
    pub read_only: bool,
    /// Referenced table for foreign keys
    pub references: Option<String>,
    /// SQL literal used as the column default
    pub default_sql: Option<String>,
}

impl FieldDef {
    /// Optional, nullable field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: true,
            unique: false,
            read_only: false,
            references: None,
            default_sql: None,
        }
    }

    /// Server-assigned UUID primary key
    pub fn id() -> Self {
        Self {
            nullable: false,
            read_only: true,
            ..Self::new("id", FieldKind::Uuid)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Not null, but filled from the column default when omitted
    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.nullable = false;
        self.default_sql = Some(literal.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.name == "id"
    }

    /// Column definition for `CREATE TABLE`
    pub fn column_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.kind.sql_type());
        if self.is_primary_key() {
            sql.push_str(" PRIMARY KEY NOT NULL");
            return sql;
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_sql {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(table) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE CASCADE",
                quote_ident(table),
                quote_ident("id")
            ));
        }
        sql
    }
}
