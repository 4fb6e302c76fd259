//! # Entity Definitions
//!
//! An `EntityDef` is the explicit registry of an entity's fields and
//! relations. Resources resolve every field name they are configured with
//! against it once, at registration time.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::field::{FieldDef, FieldKind};
use crate::store::quote_ident;

/// Convert a CamelCase type name into lower_snake_case.
///
/// `RetailShop` becomes `retail_shop`, `HTTPStatus` becomes `http_status`.
pub fn to_underscore(name: &str) -> String {
    static WORD: OnceLock<Regex> = OnceLock::new();
    static TAIL: OnceLock<Regex> = OnceLock::new();

    let word = WORD.get_or_init(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"));
    let tail = TAIL.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));

    let first = word.replace_all(name, "${1}_${2}");
    tail.replace_all(&first, "${1}_${2}").to_lowercase()
}

/// A dump-only relation to another entity
#[derive(Debug, Clone)]
pub enum Relation {
    /// `record[foreign_key]` points at a single target row
    BelongsTo {
        name: String,
        target: Arc<EntityDef>,
        foreign_key: String,
    },
    /// Target rows whose `foreign_key` equals this record's id
    HasMany {
        name: String,
        target: Arc<EntityDef>,
        foreign_key: String,
    },
}

impl Relation {
    pub fn name(&self) -> &str {
        match self {
            Relation::BelongsTo { name, .. } | Relation::HasMany { name, .. } => name,
        }
    }

    pub fn target(&self) -> &EntityDef {
        match self {
            Relation::BelongsTo { target, .. } | Relation::HasMany { target, .. } => target,
        }
    }
}

/// Entity type definition
#[derive(Debug, Clone)]
pub struct EntityDef {
    name: String,
    table: String,
    fields: Vec<FieldDef>,
    unique_together: Vec<Vec<String>>,
    relations: Vec<Relation>,
}

impl EntityDef {
    /// New entity with a server-assigned `id`; the table is named after the type.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = to_underscore(&name);
        Self {
            name,
            table,
            fields: vec![FieldDef::id()],
            unique_together: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds `created_on` (column default) and `updated_on` (stamped on update)
    pub fn timestamps(self) -> Self {
        self.field(
            FieldDef::new("created_on", FieldKind::Timestamp)
                .read_only()
                .with_default("CURRENT_TIMESTAMP"),
        )
        .field(FieldDef::new("updated_on", FieldKind::Timestamp).read_only())
    }

    pub fn unique_together(mut self, columns: &[&str]) -> Self {
        self.unique_together
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        target: &Arc<EntityDef>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation::BelongsTo {
            name: name.into(),
            target: Arc::clone(target),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: &Arc<EntityDef>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation::HasMany {
            name: name.into(),
            target: Arc::clone(target),
            foreign_key: foreign_key.into(),
        });
        self
    }

    /// CamelCase type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// lower_snake_case table (and URL) name
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name() == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn stamps_updates(&self) -> bool {
        self.has_field("updated_on")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this entity
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.fields.iter().map(FieldDef::column_sql).collect();
        for columns in &self.unique_together {
            let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
            parts.push(format!("UNIQUE ({})", quoted.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.table),
            parts.join(",\n    ")
        )
    }
}
