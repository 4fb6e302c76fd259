//! # Association Resource
//!
//! Link entities (product ↔ tag) are edited with a batch of tagged
//! operations:
//!
//! ```text
//! [{"__action": "add",    "product_id": "…", "tag_id": "…"},
//!  {"__action": "update", "id": "…", …},
//!  {"__action": "remove", "product_id": "…", "tag_id": "…"}]
//! ```
//!
//! This is a partial-commit batch. Each item runs in its own savepoint and
//! is committed before the next one starts. The first failing item rolls
//! back only itself and ends the batch; its error is reported together with
//! the outcomes of the items already committed.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::definition::ResourceConfig;
use super::errors::{RestError, RestResult};
use super::resource::{batch_items, record_id, ModelResource};
use crate::auth::{AccessPolicy, Principal, WriteAction};
use crate::model::{EntityDef, Record};
use crate::store::{
    delete_record, fetch_by_id, fetch_one, insert_record, quote_ident, update_record, Database,
    Predicate, StoreError,
};

const ACTION_KEY: &str = "__action";
const OBJECT_NOT_FOUND: &str = "Object not Found";
const PERMISSION_DENIED: &str = "Permission Denied";

/// Operation named by an item's `__action`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationAction {
    Add,
    Update,
    Remove,
}

impl AssociationAction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "add" => Some(AssociationAction::Add),
            "update" => Some(AssociationAction::Update),
            "remove" => Some(AssociationAction::Remove),
            _ => None,
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            AssociationAction::Add => "adding relation",
            AssociationAction::Update => "updating relation",
            AssociationAction::Remove => "deleting relation",
        }
    }

    fn status(&self) -> &'static str {
        match self {
            AssociationAction::Add => "added",
            AssociationAction::Update => "updated",
            AssociationAction::Remove => "removed",
        }
    }
}

/// The item that stopped a batch, plus what was committed before it
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Position of the failing item
    pub index: usize,
    pub error: RestError,
    /// Outcomes of the items committed before the failure
    pub applied: Vec<Value>,
}

impl BatchFailure {
    pub fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    pub fn envelope(&self) -> Value {
        let mut body = self.error.envelope();
        body["index"] = json!(self.index);
        body["applied"] = Value::Array(self.applied.clone());
        body
    }
}

impl IntoResponse for BatchFailure {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

/// Resource over a link entity
#[derive(Debug)]
pub struct AssociationResource {
    inner: ModelResource,
}

impl AssociationResource {
    pub fn new(
        entity: Arc<EntityDef>,
        config: ResourceConfig,
        policy: impl AccessPolicy + 'static,
    ) -> RestResult<Self> {
        Ok(Self {
            inner: ModelResource::new(entity, config, policy)?,
        })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn config(&self) -> &ResourceConfig {
        self.inner.config()
    }

    /// Apply a batch of tagged operations in order
    pub fn apply(
        &self,
        db: &Database,
        principal: &Principal,
        payload: Value,
    ) -> Result<Vec<Value>, BatchFailure> {
        let fail = |index: usize, error: RestError, applied: Vec<Value>| BatchFailure {
            index,
            error,
            applied,
        };

        let (items, _) = batch_items(payload).map_err(|e| fail(0, e, Vec::new()))?;
        let mut conn = db.lock().map_err(|e| fail(0, e.into(), Vec::new()))?;

        let mut applied = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let outcome = match conn.savepoint() {
                Ok(savepoint) => self
                    .apply_item(&savepoint, principal, &item)
                    .and_then(|outcome| {
                        savepoint.commit().map_err(|e| {
                            RestError::from_store(StoreError::from(e), item.clone(), "applying relation")
                        })?;
                        Ok(outcome)
                    }),
                Err(e) => Err(StoreError::from(e).into()),
            };

            match outcome {
                Ok(outcome) => applied.push(outcome),
                Err(error) => {
                    warn!(
                        resource = %self.name(),
                        index,
                        error = %error,
                        committed = applied.len(),
                        "association batch stopped"
                    );
                    return Err(fail(index, error, applied));
                }
            }
        }
        debug!(resource = %self.name(), count = applied.len(), "association batch applied");
        Ok(applied)
    }

    fn apply_item(&self, conn: &Connection, principal: &Principal, item: &Value) -> RestResult<Value> {
        let Some(object) = item.as_object() else {
            return Err(custom(item, "expected a JSON object", "applying relation", 400));
        };
        let Some(token) = object.get(ACTION_KEY).and_then(Value::as_str) else {
            return Err(custom(
                item,
                "missing or invalid \"__action\"",
                "applying relation",
                400,
            ));
        };
        let Some(action) = AssociationAction::from_token(token) else {
            warn!(resource = %self.name(), action = token, "unknown association action skipped");
            return Ok(json!({ ACTION_KEY: token, "status": "skipped" }));
        };

        let mut fields: Map<String, Value> = object.clone();
        fields.remove(ACTION_KEY);
        let fields = Value::Object(fields);

        let record = match action {
            AssociationAction::Add => self.add(conn, principal, &fields),
            AssociationAction::Update => self.update(conn, principal, &fields),
            AssociationAction::Remove => self.remove(conn, principal, &fields),
        }
        .map_err(|error| typed(error, item, action.operation()))?;

        let data = self
            .inner
            .serialize(conn, std::slice::from_ref(&record), &self.inner.default_projection())
            .map_err(|error| typed(error, item, action.operation()))?
            .pop()
            .unwrap_or(Value::Null);

        Ok(json!({ ACTION_KEY: token, "status": action.status(), "data": data }))
    }

    fn add(&self, conn: &Connection, principal: &Principal, fields: &Value) -> RestResult<Record> {
        let record = self
            .inner
            .schema()
            .load(fields)
            .map_err(RestError::Validation)?;
        if !self.inner.allowed(conn, principal, &record, WriteAction::Add)? {
            return Err(RestError::PermissionDenied(PERMISSION_DENIED.to_string()));
        }
        insert_record(conn, self.inner.entity(), &record)
            .map_err(|e| RestError::from_store(e, fields.clone(), "adding relation"))?;
        fetch_by_id(conn, self.inner.entity(), record_id(&record)?)?
            .ok_or_else(|| RestError::Internal("inserted relation not readable".to_string()))
    }

    fn update(&self, conn: &Connection, principal: &Principal, fields: &Value) -> RestResult<Record> {
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RestError::InvalidBody("update requires \"id\"".to_string()))?;
        let existing = self
            .inner
            .find_visible(conn, principal, id)
            .map_err(|error| match error {
                RestError::NotFound(_) => RestError::NotFound(OBJECT_NOT_FOUND.to_string()),
                other => other,
            })?;

        let changes = self
            .inner
            .schema()
            .load_partial(fields)
            .map_err(RestError::Validation)?;
        self.inner
            .check_change(conn, principal, &existing, &changes)
            .map_err(|error| match error {
                RestError::PermissionDenied(_) => {
                    RestError::PermissionDenied(PERMISSION_DENIED.to_string())
                }
                other => other,
            })?;

        let id = record_id(&existing)?;
        update_record(conn, self.inner.entity(), id, &changes)
            .map_err(|e| RestError::from_store(e, fields.clone(), "updating relation"))?;
        fetch_by_id(conn, self.inner.entity(), id)?
            .ok_or_else(|| RestError::NotFound(OBJECT_NOT_FOUND.to_string()))
    }

    /// Matches on every entity field present in the item; several matches
    /// resolve to the first in insertion order.
    fn remove(&self, conn: &Connection, principal: &Principal, fields: &Value) -> RestResult<Record> {
        let entity = self.inner.entity();
        let mut query = self.inner.base_query(principal);
        let mut matched = 0;

        if let Some(object) = fields.as_object() {
            for (key, value) in object {
                let Some(field) = entity.get_field(key) else {
                    continue;
                };
                let bound = field.kind.json_to_sql(value).ok_or_else(|| {
                    RestError::InvalidBody(format!("\"{}\" is not a valid {}", key, field.kind.as_str()))
                })?;
                let predicate = if value.is_null() {
                    Predicate::new(format!("{} IS NULL", quote_ident(key)), Vec::new())
                } else {
                    Predicate::eq(key, bound)
                };
                query = query.filter(predicate);
                matched += 1;
            }
        }
        if matched == 0 {
            return Err(RestError::InvalidBody(
                "remove requires at least one field to match on".to_string(),
            ));
        }

        let existing = fetch_one(conn, entity, query)?
            .ok_or_else(|| RestError::NotFound(OBJECT_NOT_FOUND.to_string()))?;
        if !self.inner.allowed(conn, principal, &existing, WriteAction::Delete)? {
            return Err(RestError::PermissionDenied(PERMISSION_DENIED.to_string()));
        }
        delete_record(conn, entity, record_id(&existing)?)
            .map_err(|e| RestError::from_store(e, fields.clone(), "deleting relation"))?;
        Ok(existing)
    }
}

fn custom(item: &Value, message: &str, operation: &str, status: u16) -> RestError {
    RestError::Custom {
        data: item.clone(),
        message: message.to_string(),
        operation: operation.to_string(),
        status,
    }
}

/// Attach the offending item and operation to an item-level error
fn typed(error: RestError, item: &Value, operation: &str) -> RestError {
    match error {
        typed @ (RestError::Integrity { .. }
        | RestError::Operational { .. }
        | RestError::Custom { .. }
        | RestError::Internal(_)) => typed,
        other => custom(item, &other.to_string(), operation, other.status_code().as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tokens() {
        assert_eq!(AssociationAction::from_token("add"), Some(AssociationAction::Add));
        assert_eq!(AssociationAction::from_token("remove"), Some(AssociationAction::Remove));
        assert_eq!(AssociationAction::from_token("delete"), None);
    }

    #[test]
    fn test_typed_keeps_status() {
        let item = json!({"__action": "remove", "tag_id": "x"});
        let error = typed(
            RestError::NotFound(OBJECT_NOT_FOUND.to_string()),
            &item,
            "deleting relation",
        );
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            error.envelope(),
            json!({
                "error": true,
                "message": "Object not Found",
                "data": {"__action": "remove", "tag_id": "x"},
                "operation": "deleting relation"
            })
        );
    }

    #[test]
    fn test_failure_envelope_reports_applied_items() {
        let failure = BatchFailure {
            index: 1,
            error: RestError::PermissionDenied(PERMISSION_DENIED.to_string()),
            applied: vec![json!({"__action": "add", "status": "added"})],
        };
        let body = failure.envelope();
        assert_eq!(failure.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(body["index"], 1);
        assert_eq!(body["applied"].as_array().unwrap().len(), 1);
    }
}
