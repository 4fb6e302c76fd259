//! # Query Builder
//!
//! Predicates are SQL fragments with positional parameters. A
//! `SelectQuery` is an immutable value: every narrowing step returns a new
//! query, so two queries can be compared to see whether a step changed
//! anything.

use rusqlite::types::Value as SqlValue;

/// Quote an identifier for SQLite (`order` is a keyword and a table name)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A compiled WHERE fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Matches no row
    pub fn never() -> Self {
        Self::new("0", Vec::new())
    }

    pub fn eq(column: &str, value: SqlValue) -> Self {
        Self::new(format!("{} = ?", quote_ident(column)), vec![value])
    }

    /// `column IN (…)`; an empty list matches nothing
    pub fn in_list(column: &str, values: Vec<SqlValue>) -> Self {
        if values.is_empty() {
            return Self::never();
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Self::new(
            format!("{} IN ({})", quote_ident(column), placeholders),
            values,
        )
    }
}

/// SELECT over one table
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    order_by: Option<String>,
    limit: Option<usize>,
    offset: i64,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            predicates: Vec::new(),
            order_by: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// Page numbers start at 1. A page whose offset does not fit in an
    /// `i64` lands past every row.
    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.limit = Some(per_page);
        self.offset = page
            .saturating_sub(1)
            .checked_mul(per_page)
            .and_then(|offset| i64::try_from(offset).ok())
            .unwrap_or(i64::MAX);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn ordering(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    fn where_clause(&self) -> (String, Vec<SqlValue>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut params = Vec::new();
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| {
                params.extend(p.params.iter().cloned());
                format!("({})", p.sql)
            })
            .collect();
        (format!(" WHERE {}", parts.join(" AND ")), params)
    }

    /// Render the row query. Rows without an explicit ordering come back
    /// in insertion order so pages are stable.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let (where_sql, mut params) = self.where_clause();

        let mut sql = format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            quote_ident(&self.table),
            where_sql
        );
        match &self.order_by {
            Some(column) => sql.push_str(&format!(" ORDER BY {}, rowid", quote_ident(column))),
            None => sql.push_str(" ORDER BY rowid"),
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            params.push(SqlValue::Integer(self.offset));
        }
        (sql, params)
    }

    /// Render `COUNT(*)` over the same predicates, ignoring pagination
    pub fn count_sql(&self) -> (String, Vec<SqlValue>) {
        let (where_sql, params) = self.where_clause();
        (
            format!("SELECT COUNT(*) FROM {}{}", quote_ident(&self.table), where_sql),
            params,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SelectQuery {
        SelectQuery::new("order", vec!["id".to_string(), "total".to_string()])
    }

    #[test]
    fn test_plain_select() {
        let (sql, params) = query().to_sql();
        assert_eq!(sql, "SELECT \"id\", \"total\" FROM \"order\" ORDER BY rowid");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filtered_paginated_select() {
        let (sql, params) = query()
            .filter(Predicate::eq("id", SqlValue::Text("a".into())))
            .filter(Predicate::never())
            .order_by("total")
            .paginate(3, 10)
            .to_sql();

        assert_eq!(
            sql,
            "SELECT \"id\", \"total\" FROM \"order\" WHERE (\"id\" = ?) AND (0) ORDER BY \"total\", rowid LIMIT ? OFFSET ?"
        );
        assert_eq!(
            params,
            vec![
                SqlValue::Text("a".into()),
                SqlValue::Integer(10),
                SqlValue::Integer(20)
            ]
        );
    }

    #[test]
    fn test_page_beyond_i64_lands_past_every_row() {
        let (_, params) = query().paginate(usize::MAX, 1).to_sql();
        assert_eq!(params, vec![SqlValue::Integer(1), SqlValue::Integer(i64::MAX)]);

        let (_, params) = query().paginate(usize::MAX / 2, 4).to_sql();
        assert_eq!(params[1], SqlValue::Integer(i64::MAX));
    }

    #[test]
    fn test_count_ignores_pagination() {
        let (sql, params) = query()
            .filter(Predicate::in_list(
                "id",
                vec![SqlValue::Integer(1), SqlValue::Integer(2)],
            ))
            .paginate(2, 5)
            .count_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"order\" WHERE (\"id\" IN (?, ?))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        assert_eq!(Predicate::in_list("id", vec![]), Predicate::never());
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
