//! # Model Resource
//!
//! Binds one entity to its filtering, pagination, permission and CRUD
//! contract.
//!
//! Reads go through the policy-narrowed query, so rows another tenant owns
//! are reported as missing rather than forbidden. Writes run inside one
//! transaction per request: schema validation happens before storage is
//! touched, the write check runs against the loaded record, and any error
//! drops the transaction, which rolls it back.

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info};

use super::definition::ResourceConfig;
use super::errors::{RestError, RestResult};
use super::filter::FilterExpr;
use super::parser::QueryParams;
use crate::auth::{AccessPolicy, Principal, WriteAction};
use crate::model::{EntityDef, FieldKind, Projection, Record, Relation, Schema, ValidationErrors};
use crate::store::{
    count_rows, delete_record, fetch_by_id, fetch_one, fetch_rows, insert_record, select_all,
    update_record, Database, Predicate, SelectQuery, StoreError,
};

pub const NOT_FOUND: &str = "Resource not found";
pub const EMPTY_PAGE: &str = "No Resource Found";
pub const DENIED_ADD: &str = "Forbidden Permission Denied To Add Resource";
pub const DENIED_CHANGE: &str = "Forbidden Permission Denied To Change Resource";
pub const DENIED_DELETE: &str = "Forbidden Permission Denied To Delete Resource";

/// One page of serialized rows
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Rows matching before pagination
    pub total: usize,
}

/// Generic resource over one entity
pub struct ModelResource {
    name: String,
    entity: Arc<EntityDef>,
    schema: Schema,
    config: ResourceConfig,
    policy: Arc<dyn AccessPolicy>,
}

impl std::fmt::Debug for ModelResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResource")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl ModelResource {
    /// Validate `config` against the entity and build the resource.
    ///
    /// The resource is served under the entity's table name.
    pub fn new(
        entity: Arc<EntityDef>,
        config: ResourceConfig,
        policy: impl AccessPolicy + 'static,
    ) -> RestResult<Self> {
        config.validate(&entity)?;
        Ok(Self {
            name: entity.table().to_string(),
            schema: Schema::new(Arc::clone(&entity)),
            entity,
            config,
            policy: Arc::new(policy),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// All rows, narrowed to what `principal` may read
    pub fn base_query(&self, principal: &Principal) -> SelectQuery {
        self.policy.can_read(principal, select_all(&self.entity))
    }

    /// AND each allowed filter onto the query. Filters this resource does
    /// not allow leave the query unchanged.
    pub fn apply_filters(&self, mut query: SelectQuery, filters: &[FilterExpr]) -> RestResult<SelectQuery> {
        for filter in filters {
            let field = match self.entity.get_field(&filter.field) {
                Some(field) if self.config.allows(&filter.field, filter.operator) => field,
                _ => {
                    debug!(resource = %self.name, field = %filter.field, "filter not allowed, skipped");
                    continue;
                }
            };
            query = query.filter(filter.compile(field)?);
        }
        Ok(query)
    }

    pub fn apply_ordering(&self, query: SelectQuery, order_by: Option<&str>) -> SelectQuery {
        match order_by {
            Some(field) if self.config.orderable(field) => query.order_by(field),
            _ => query,
        }
    }

    /// Projection used for write responses and association outcomes
    pub fn default_projection(&self) -> Projection {
        QueryParams::default_projection(&self.config)
    }

    /// Filter, order and paginate; an empty page is a not-found condition
    pub fn list(&self, db: &Database, principal: &Principal, params: &QueryParams) -> RestResult<Page> {
        let conn = db.lock()?;

        let query = self.base_query(principal);
        let query = self.apply_filters(query, &params.filters)?;
        let query = self.apply_ordering(query, params.order_by.as_deref());

        let total = count_rows(&conn, &query)?;
        let rows = fetch_rows(
            &conn,
            &self.entity,
            &query.paginate(params.page, params.limit),
        )?;
        debug!(
            resource = %self.name,
            page = params.page,
            limit = params.limit,
            total,
            returned = rows.len(),
            "list"
        );

        if rows.is_empty() {
            return Err(RestError::NotFound(EMPTY_PAGE.to_string()));
        }
        let items = self.serialize(&conn, &rows, &params.projection)?;
        Ok(Page { items, total })
    }

    /// Single row visible to `principal`
    pub fn fetch(
        &self,
        db: &Database,
        principal: &Principal,
        id: &str,
        projection: &Projection,
    ) -> RestResult<Value> {
        let conn = db.lock()?;
        let record = self.find_visible(&conn, principal, id)?;
        let mut items = self.serialize(&conn, std::slice::from_ref(&record), projection)?;
        Ok(items.pop().unwrap_or(Value::Null))
    }

    /// Create one or many rows in a single transaction
    pub fn create(&self, db: &Database, principal: &Principal, payload: Value) -> RestResult<Vec<Value>> {
        let (items, many) = batch_items(payload)?;

        let mut records = Vec::with_capacity(items.len());
        let mut errors = ValidationErrors::new();
        for (index, item) in items.iter().enumerate() {
            match self.schema.load(item) {
                Ok(record) => records.push(record),
                Err(item_errors) => merge_errors(&mut errors, index, many, item_errors),
            }
        }
        if !errors.is_empty() {
            return Err(RestError::Validation(errors));
        }

        let data = Value::Array(items);
        let mut conn = db.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        for record in &records {
            if !self.allowed(&tx, principal, record, WriteAction::Add)? {
                return Err(RestError::PermissionDenied(DENIED_ADD.to_string()));
            }
        }

        let mut created = Vec::with_capacity(records.len());
        for record in &records {
            insert_record(&tx, &self.entity, record)
                .map_err(|e| RestError::from_store(e, data.clone(), "adding resource"))?;
            let id = record_id(record)?;
            if let Some(stored) = fetch_by_id(&tx, &self.entity, id)? {
                created.push(stored);
            }
        }
        tx.commit()
            .map_err(|e| RestError::from_store(e.into(), data.clone(), "adding resource"))?;
        info!(resource = %self.name, count = created.len(), "resources added");

        self.serialize(&conn, &created, &self.default_projection())
    }

    /// Update existing rows by `id`; every item commits or none does
    pub fn bulk_update(&self, db: &Database, principal: &Principal, payload: Value) -> RestResult<usize> {
        let (items, many) = batch_items(payload)?;

        let mut conn = db.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        for (index, item) in items.iter().enumerate() {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| RestError::InvalidBody(format!("item {} is missing \"id\"", index)))?;
            let existing = self.find_visible(&tx, principal, id)?;

            let changes = self.schema.load_partial(item).map_err(|item_errors| {
                let mut errors = ValidationErrors::new();
                merge_errors(&mut errors, index, many, item_errors);
                RestError::Validation(errors)
            })?;

            self.check_change(&tx, principal, &existing, &changes)?;

            update_record(&tx, &self.entity, record_id(&existing)?, &changes)
                .map_err(|e| RestError::from_store(e, item.clone(), "updating resource"))?;
        }

        tx.commit()
            .map_err(|e| RestError::from_store(e.into(), Value::Array(items.clone()), "updating resource"))?;
        info!(resource = %self.name, count = items.len(), "resources updated");
        Ok(items.len())
    }

    /// Partial update of a single row
    pub fn patch(&self, db: &Database, principal: &Principal, id: &str, payload: Value) -> RestResult<()> {
        let mut conn = db.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let existing = self.find_visible(&tx, principal, id)?;
        if !self.allowed(&tx, principal, &existing, WriteAction::Change)? {
            return Err(RestError::PermissionDenied(DENIED_CHANGE.to_string()));
        }

        let changes = self.schema.load_partial(&payload).map_err(RestError::Validation)?;
        self.check_change(&tx, principal, &existing, &changes)?;

        update_record(&tx, &self.entity, record_id(&existing)?, &changes)
            .map_err(|e| RestError::from_store(e, payload.clone(), "updating resource"))?;
        tx.commit()
            .map_err(|e| RestError::from_store(e.into(), payload.clone(), "updating resource"))?;
        debug!(resource = %self.name, id, "resource patched");
        Ok(())
    }

    /// Hard delete of a single row
    pub fn delete(&self, db: &Database, principal: &Principal, id: &str) -> RestResult<()> {
        let mut conn = db.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let existing = self.find_visible(&tx, principal, id)?;
        if !self.allowed(&tx, principal, &existing, WriteAction::Delete)? {
            return Err(RestError::PermissionDenied(DENIED_DELETE.to_string()));
        }

        let data = Value::Object(existing.clone());
        delete_record(&tx, &self.entity, record_id(&existing)?)
            .map_err(|e| RestError::from_store(e, data.clone(), "deleting resource"))?;
        tx.commit()
            .map_err(|e| RestError::from_store(e.into(), data, "deleting resource"))?;
        info!(resource = %self.name, id, "resource deleted");
        Ok(())
    }

    /// Resolve `id` through the read-narrowed query
    pub(crate) fn find_visible(&self, conn: &Connection, principal: &Principal, id: &str) -> RestResult<Record> {
        let not_found = || RestError::NotFound(NOT_FOUND.to_string());
        let id = FieldKind::Uuid.parse_operand(id).ok_or_else(not_found)?;
        let query = self.base_query(principal).filter(Predicate::eq("id", id));
        fetch_one(conn, &self.entity, query)?.ok_or_else(not_found)
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn allowed(
        &self,
        conn: &Connection,
        principal: &Principal,
        record: &Record,
        action: WriteAction,
    ) -> RestResult<bool> {
        let allowed = self.policy.can_write(conn, principal, record, action)?;
        if !allowed {
            info!(
                resource = %self.name,
                action = action.as_str(),
                user = principal.user_id.as_deref().unwrap_or("anonymous"),
                "permission denied"
            );
        }
        Ok(allowed)
    }

    /// The caller must be allowed to change the row both before and after
    /// the changes, so a row cannot be moved into a shop it has no access to.
    pub(crate) fn check_change(
        &self,
        conn: &Connection,
        principal: &Principal,
        existing: &Record,
        changes: &Record,
    ) -> RestResult<()> {
        let merged = self.schema.merge(existing, changes);
        if self.allowed(conn, principal, existing, WriteAction::Change)?
            && self.allowed(conn, principal, &merged, WriteAction::Change)?
        {
            Ok(())
        } else {
            Err(RestError::PermissionDenied(DENIED_CHANGE.to_string()))
        }
    }

    /// Expand relations the projection keeps, then apply the projection
    pub(crate) fn serialize(
        &self,
        conn: &Connection,
        records: &[Record],
        projection: &Projection,
    ) -> RestResult<Vec<Value>> {
        records
            .iter()
            .map(|record| {
                let mut expanded = record.clone();
                for relation in self.entity.relations() {
                    if projection.includes(relation.name()) {
                        let value = expand_relation(conn, relation, record)?;
                        expanded.insert(relation.name().to_string(), value);
                    }
                }
                Ok(self.schema.dump(&expanded, projection))
            })
            .collect()
    }
}

fn expand_relation(conn: &Connection, relation: &Relation, record: &Record) -> RestResult<Value> {
    match relation {
        Relation::BelongsTo {
            target,
            foreign_key,
            ..
        } => {
            let Some(target_id) = record.get(foreign_key).and_then(Value::as_str) else {
                return Ok(Value::Null);
            };
            Ok(fetch_by_id(conn, target, target_id)?
                .map(Value::Object)
                .unwrap_or(Value::Null))
        }
        Relation::HasMany {
            target,
            foreign_key,
            ..
        } => {
            let Some(Value::String(id)) = record.get("id") else {
                return Ok(Value::Array(Vec::new()));
            };
            let query = select_all(target).filter(Predicate::eq(
                foreign_key,
                rusqlite::types::Value::Text(id.clone()),
            ));
            let rows = fetch_rows(conn, target, &query)?;
            Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }
    }
}

/// A body is one object or an array of objects
pub(crate) fn batch_items(payload: Value) -> RestResult<(Vec<Value>, bool)> {
    match payload {
        Value::Array(items) => Ok((items, true)),
        object @ Value::Object(_) => Ok((vec![object], false)),
        _ => Err(RestError::InvalidBody(
            "expected a JSON object or an array of objects".to_string(),
        )),
    }
}

fn merge_errors(errors: &mut ValidationErrors, index: usize, many: bool, item_errors: ValidationErrors) {
    if many {
        errors.extend_prefixed(&index.to_string(), item_errors);
    } else {
        *errors = item_errors;
    }
}

pub(crate) fn record_id(record: &Record) -> RestResult<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RestError::Internal("record without id".to_string()))
}
