//! # Schema
//!
//! Loads request payloads into records and dumps records for responses.
//!
//! Loading never touches storage. It either yields a record whose values all
//! convert to their declared kinds, or field-level `ValidationErrors`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::entity::EntityDef;
use super::field::FieldDef;

/// A row as exchanged with the schema and the store
pub type Record = Map<String, Value>;

/// Key used for errors that are not about a single field
pub const SCHEMA_KEY: &str = "_schema";

/// Field-level validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Merge another set under a key prefix (`"1.name"`)
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.0 {
            let key = format!("{}.{}", prefix, field);
            self.0.entry(key).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Field selection applied when dumping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// When non-empty, only these keys are emitted
    pub only: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn includes(&self, name: &str) -> bool {
        (self.only.is_empty() || self.only.iter().any(|o| o == name))
            && !self.exclude.iter().any(|e| e == name)
    }
}

/// Payload loader and record dumper for one entity
#[derive(Debug, Clone)]
pub struct Schema {
    entity: Arc<EntityDef>,
}

impl Schema {
    pub fn new(entity: Arc<EntityDef>) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    /// Load a create payload. Assigns a fresh `id`; read-only keys are dropped.
    pub fn load(&self, payload: &Value) -> Result<Record, ValidationErrors> {
        let object = self.expect_object(payload)?;
        let mut errors = ValidationErrors::new();
        let mut record = Record::new();

        self.reject_undeclared(object, &mut errors);

        for field in self.entity.fields() {
            if field.read_only {
                continue;
            }
            match object.get(&field.name) {
                Some(value) => match load_value(field, value) {
                    Ok(value) => {
                        record.insert(field.name.clone(), value);
                    }
                    Err(message) => errors.add(&field.name, message),
                },
                None if field.required => {
                    errors.add(&field.name, "Missing data for required field.");
                }
                None => {}
            }
        }

        record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        errors.into_result(record)
    }

    /// Load a partial payload: only the keys present are validated and returned.
    pub fn load_partial(&self, payload: &Value) -> Result<Record, ValidationErrors> {
        let object = self.expect_object(payload)?;
        let mut errors = ValidationErrors::new();
        let mut record = Record::new();

        self.reject_undeclared(object, &mut errors);

        for (key, value) in object {
            let Some(field) = self.entity.get_field(key) else {
                continue;
            };
            if field.read_only {
                continue;
            }
            match load_value(field, value) {
                Ok(value) => {
                    record.insert(key.clone(), value);
                }
                Err(message) => errors.add(key, message),
            }
        }

        errors.into_result(record)
    }

    /// Overlay `changes` onto an existing record
    pub fn merge(&self, instance: &Record, changes: &Record) -> Record {
        let mut merged = instance.clone();
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Emit the record restricted to the projection
    pub fn dump(&self, record: &Record, projection: &Projection) -> Value {
        let dumped: Map<String, Value> = record
            .iter()
            .filter(|(key, _)| projection.includes(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(dumped)
    }

    fn expect_object<'a>(&self, payload: &'a Value) -> Result<&'a Map<String, Value>, ValidationErrors> {
        payload
            .as_object()
            .ok_or_else(|| ValidationErrors::single(SCHEMA_KEY, "Invalid input type."))
    }

    fn reject_undeclared(&self, object: &Map<String, Value>, errors: &mut ValidationErrors) {
        for key in object.keys() {
            if self.entity.relation(key).is_some() {
                errors.add(key, "Nested writes are not supported.");
            } else if !self.entity.has_field(key) {
                errors.add(key, "Unknown field.");
            }
        }
    }
}

/// Values are stored in canonical form, so policies and lookups that run
/// before the write see the same text the store will hold.
fn load_value(field: &FieldDef, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err("Field may not be null.".to_string())
        };
    }
    field
        .kind
        .canonical_json(value)
        .ok_or_else(|| format!("Not a valid {}.", field.kind.as_str()))
}
