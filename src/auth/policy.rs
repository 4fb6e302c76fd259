//! # Access Policies
//!
//! Row-level access control for resources.
//!
//! Reads are never denied outright: `can_read` narrows the query so that rows
//! the principal may not see simply do not come back. Writes are a boolean
//! gate evaluated against the concrete record, after it has been loaded but
//! before anything is persisted.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use super::principal::Principal;
use crate::model::{FieldKind, Record};
use crate::store::{quote_ident, Predicate, SelectQuery, StoreResult};

/// Kind of mutation being authorised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Add,
    Change,
    Delete,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Add => "add",
            WriteAction::Change => "change",
            WriteAction::Delete => "delete",
        }
    }
}

/// Per-entity permission capability
pub trait AccessPolicy: Send + Sync {
    /// Narrow a read query to the rows visible to `principal`
    fn can_read(&self, principal: &Principal, query: SelectQuery) -> SelectQuery;

    /// Decide whether `principal` may apply `action` to `record`.
    ///
    /// Gets the connection of the enclosing unit of work so decisions that
    /// depend on related rows see uncommitted writes of the same batch.
    fn can_write(
        &self,
        conn: &Connection,
        principal: &Principal,
        record: &Record,
        action: WriteAction,
    ) -> StoreResult<bool>;
}

/// No narrowing, every write allowed
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

impl AccessPolicy for OpenAccess {
    fn can_read(&self, _principal: &Principal, query: SelectQuery) -> SelectQuery {
        query
    }

    fn can_write(
        &self,
        _conn: &Connection,
        _principal: &Principal,
        _record: &Record,
        _action: WriteAction,
    ) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Where a row's owning shop comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopSource {
    /// A column on the row itself
    Field(String),
    /// A column on a parent row referenced through `foreign_key`
    Parent {
        foreign_key: String,
        table: String,
        shop_field: String,
    },
}

/// Tenant isolation by retail shop, optionally gated by named permissions
#[derive(Debug, Clone)]
pub struct ShopScoped {
    source: ShopSource,
    view: Option<String>,
    add: Option<String>,
    change: Option<String>,
    delete: Option<String>,
}

impl ShopScoped {
    pub fn new(source: ShopSource) -> Self {
        Self {
            source,
            view: None,
            add: None,
            change: None,
            delete: None,
        }
    }

    /// Rows carry their shop in `field`
    pub fn field(field: impl Into<String>) -> Self {
        Self::new(ShopSource::Field(field.into()))
    }

    /// Rows inherit the shop of the parent they reference
    pub fn parent(
        foreign_key: impl Into<String>,
        table: impl Into<String>,
        shop_field: impl Into<String>,
    ) -> Self {
        Self::new(ShopSource::Parent {
            foreign_key: foreign_key.into(),
            table: table.into(),
            shop_field: shop_field.into(),
        })
    }

    /// Require `view_<noun>`, `create_<noun>`, `change_<noun>` and `remove_<noun>`
    pub fn with_permissions(self, noun: &str) -> Self {
        self.with_view(format!("view_{}", noun))
            .with_add(format!("create_{}", noun))
            .with_change(format!("change_{}", noun))
            .with_delete(format!("remove_{}", noun))
    }

    pub fn with_view(mut self, permission: impl Into<String>) -> Self {
        self.view = Some(permission.into());
        self
    }

    pub fn with_add(mut self, permission: impl Into<String>) -> Self {
        self.add = Some(permission.into());
        self
    }

    pub fn with_change(mut self, permission: impl Into<String>) -> Self {
        self.change = Some(permission.into());
        self
    }

    pub fn with_delete(mut self, permission: impl Into<String>) -> Self {
        self.delete = Some(permission.into());
        self
    }

    pub fn source(&self) -> &ShopSource {
        &self.source
    }

    fn required_permission(&self, action: WriteAction) -> Option<&str> {
        match action {
            WriteAction::Add => self.add.as_deref(),
            WriteAction::Change => self.change.as_deref(),
            WriteAction::Delete => self.delete.as_deref(),
        }
    }

    /// Resolve the owning shop of `record`, if it has one
    fn shop_of(&self, conn: &Connection, record: &Record) -> StoreResult<Option<String>> {
        match &self.source {
            ShopSource::Field(field) => Ok(record.get(field).and_then(Value::as_str).map(str::to_string)),
            ShopSource::Parent {
                foreign_key,
                table,
                shop_field,
            } => {
                let Some(parent_id) = record
                    .get(foreign_key)
                    .and_then(Value::as_str)
                    .and_then(|raw| FieldKind::Uuid.parse_operand(raw))
                else {
                    return Ok(None);
                };
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} = ?",
                    quote_ident(shop_field),
                    quote_ident(table),
                    quote_ident("id")
                );
                let shop: Option<Option<String>> = conn
                    .query_row(&sql, [parent_id], |row| row.get(0))
                    .optional()?;
                Ok(shop.flatten())
            }
        }
    }
}

impl AccessPolicy for ShopScoped {
    fn can_read(&self, principal: &Principal, query: SelectQuery) -> SelectQuery {
        if let Some(view) = &self.view {
            if !principal.has_permission(view) {
                return query.filter(Predicate::never());
            }
        }

        let shops: Vec<SqlValue> = principal
            .retail_shop_ids
            .iter()
            .map(|id| SqlValue::Text(id.clone()))
            .collect();
        if shops.is_empty() {
            return query.filter(Predicate::never());
        }

        let predicate = match &self.source {
            ShopSource::Field(field) => Predicate::in_list(field, shops),
            ShopSource::Parent {
                foreign_key,
                table,
                shop_field,
            } => {
                let inner = Predicate::in_list(shop_field, shops);
                Predicate::new(
                    format!(
                        "{} IN (SELECT {} FROM {} WHERE {})",
                        quote_ident(foreign_key),
                        quote_ident("id"),
                        quote_ident(table),
                        inner.sql
                    ),
                    inner.params,
                )
            }
        };
        query.filter(predicate)
    }

    fn can_write(
        &self,
        conn: &Connection,
        principal: &Principal,
        record: &Record,
        action: WriteAction,
    ) -> StoreResult<bool> {
        if let Some(permission) = self.required_permission(action) {
            if !principal.has_permission(permission) {
                return Ok(false);
            }
        }
        Ok(self
            .shop_of(conn, record)?
            .map(|shop| principal.has_shop_access(&shop))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHOP: &str = "6f1c1b8e-4a53-4c1e-9a43-6f7a3f1d2a10";
    const OTHER: &str = "9a1c1b8e-4a53-4c1e-9a43-6f7a3f1d2a99";
    const PRODUCT: &str = "0b9e8a52-2f0c-44a5-8e3f-5c1b9a7d6e21";

    fn query() -> SelectQuery {
        SelectQuery::new("tag", vec!["id".to_string()])
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE product (id TEXT PRIMARY KEY, retail_shop_id TEXT);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO product (id, retail_shop_id) VALUES (?1, ?2)",
            [PRODUCT, SHOP],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_read_without_view_permission_matches_nothing() {
        let policy = ShopScoped::field("retail_shop_id").with_permissions("tag");
        let principal = Principal::authenticated("u").with_shop(SHOP);

        let narrowed = policy.can_read(&principal, query());
        assert_eq!(narrowed.predicates(), [Predicate::never()]);
    }

    #[test]
    fn test_read_narrows_to_member_shops() {
        let policy = ShopScoped::field("retail_shop_id").with_permissions("tag");
        let principal = Principal::authenticated("u")
            .with_permission("view_tag")
            .with_shop(SHOP);

        let narrowed = policy.can_read(&principal, query());
        assert_eq!(
            narrowed.predicates(),
            [Predicate::in_list(
                "retail_shop_id",
                vec![SqlValue::Text(SHOP.to_string())]
            )]
        );
    }

    #[test]
    fn test_parent_read_uses_subquery() {
        let policy = ShopScoped::parent("product_id", "product", "retail_shop_id");
        let principal = Principal::authenticated("u").with_shop(SHOP);

        let narrowed = policy.can_read(&principal, query());
        let predicate = &narrowed.predicates()[0];
        assert_eq!(
            predicate.sql,
            "\"product_id\" IN (SELECT \"id\" FROM \"product\" WHERE \"retail_shop_id\" IN (?))"
        );
        assert_eq!(predicate.params.len(), 1);
    }

    #[test]
    fn test_write_requires_permission_and_shop() {
        let conn = conn();
        let policy = ShopScoped::field("retail_shop_id").with_permissions("tag");
        let tag = record(json!({"name": "Snacks", "retail_shop_id": SHOP}));

        let member = Principal::authenticated("u")
            .with_permission("create_tag")
            .with_shop(SHOP);
        assert!(policy.can_write(&conn, &member, &tag, WriteAction::Add).unwrap());
        assert!(!policy.can_write(&conn, &member, &tag, WriteAction::Delete).unwrap());

        let outsider = Principal::authenticated("v")
            .with_permission("create_tag")
            .with_shop(OTHER);
        assert!(!policy.can_write(&conn, &outsider, &tag, WriteAction::Add).unwrap());
    }

    #[test]
    fn test_parent_write_resolves_shop_through_parent() {
        let conn = conn();
        let policy = ShopScoped::parent("product_id", "product", "retail_shop_id");
        let link = record(json!({"product_id": PRODUCT, "tag_id": OTHER}));

        let member = Principal::authenticated("u").with_shop(SHOP);
        assert!(policy.can_write(&conn, &member, &link, WriteAction::Add).unwrap());

        let dangling = record(json!({"product_id": OTHER}));
        assert!(!policy.can_write(&conn, &member, &dangling, WriteAction::Add).unwrap());
    }

    #[test]
    fn test_parent_lookup_accepts_uppercase_key() {
        let conn = conn();
        let policy = ShopScoped::parent("product_id", "product", "retail_shop_id");
        let link = record(json!({"product_id": PRODUCT.to_uppercase()}));

        let member = Principal::authenticated("u").with_shop(SHOP);
        assert!(policy.can_write(&conn, &member, &link, WriteAction::Add).unwrap());
    }

    #[test]
    fn test_open_access() {
        let conn = conn();
        let principal = Principal::anonymous();
        assert_eq!(OpenAccess.can_read(&principal, query()), query());
        assert!(OpenAccess
            .can_write(&conn, &principal, &Record::new(), WriteAction::Delete)
            .unwrap());
    }
}
