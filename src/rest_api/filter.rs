//! # Filter Operators
//!
//! The fixed operator registry. Each operator compiles a field and its raw
//! query-string operands into a SQL `Predicate`.
//!
//! Arity is checked: an operator given the wrong number of operands, or an
//! operand that does not parse as the field's kind, is a request error.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

use super::errors::{RestError, RestResult};
use crate::model::field::{parse_timestamp, DATE_FORMAT};
use crate::model::{FieldDef, FieldKind};
use crate::store::{quote_ident, Predicate};

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equal,
    In,
    /// Case-insensitive substring. SQLite folds ASCII letters only, so
    /// `É` and `é` are distinct.
    Contains,
    /// `"false"` is false, any other literal is true
    Bool,
    /// Inclusive range
    Between,
    Gt,
    Lt,
    Gte,
    Lte,
    DateEqual,
    DateGte,
    DateLte,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 12] = [
        FilterOperator::Equal,
        FilterOperator::In,
        FilterOperator::Contains,
        FilterOperator::Bool,
        FilterOperator::Between,
        FilterOperator::Gt,
        FilterOperator::Lt,
        FilterOperator::Gte,
        FilterOperator::Lte,
        FilterOperator::DateEqual,
        FilterOperator::DateGte,
        FilterOperator::DateLte,
    ];

    /// Get the operator token used in query parameter names
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "equal",
            FilterOperator::In => "in",
            FilterOperator::Contains => "contains",
            FilterOperator::Bool => "bool",
            FilterOperator::Between => "between",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::DateEqual => "date_equal",
            FilterOperator::DateGte => "date_gte",
            FilterOperator::DateLte => "date_lte",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == token)
    }

    /// Whether this operator makes sense for a field of `kind`
    pub fn supports(&self, kind: FieldKind) -> bool {
        match self {
            FilterOperator::Equal | FilterOperator::In => true,
            FilterOperator::Contains => matches!(kind, FieldKind::Text | FieldKind::Uuid),
            FilterOperator::Bool => kind == FieldKind::Boolean,
            FilterOperator::Between
            | FilterOperator::Gt
            | FilterOperator::Lt
            | FilterOperator::Gte
            | FilterOperator::Lte => kind != FieldKind::Boolean,
            FilterOperator::DateEqual | FilterOperator::DateGte | FilterOperator::DateLte => {
                kind == FieldKind::Timestamp
            }
        }
    }

    /// Compile `field <op> operand` into a predicate
    pub fn compile(&self, field: &FieldDef, operand: &[String]) -> RestResult<Predicate> {
        let column = quote_ident(&field.name);
        match self {
            FilterOperator::Equal => {
                let value = parse_value(field, single(self, field, operand)?)?;
                Ok(Predicate::new(format!("{} = ?", column), vec![value]))
            }
            FilterOperator::In => {
                let values = split_values(operand)
                    .into_iter()
                    .map(|raw| parse_value(field, &raw))
                    .collect::<RestResult<Vec<_>>>()?;
                if values.is_empty() {
                    return Err(arity_error(self, field, "at least one value"));
                }
                Ok(Predicate::in_list(&field.name, values))
            }
            FilterOperator::Contains => {
                let needle = escape_like(single(self, field, operand)?);
                Ok(Predicate::new(
                    format!("lower({}) LIKE '%' || lower(?) || '%' ESCAPE '\\'", column),
                    vec![SqlValue::Text(needle)],
                ))
            }
            FilterOperator::Bool => {
                let flag = single(self, field, operand)? != "false";
                Ok(Predicate::new(
                    format!("{} = ?", column),
                    vec![SqlValue::Integer(flag as i64)],
                ))
            }
            FilterOperator::Between => {
                let bounds = if operand.len() == 1 {
                    split_values(operand)
                } else {
                    operand.to_vec()
                };
                let [low, high] = bounds.as_slice() else {
                    return Err(arity_error(self, field, "exactly two values"));
                };
                Ok(Predicate::new(
                    format!("{} BETWEEN ? AND ?", column),
                    vec![parse_value(field, low)?, parse_value(field, high)?],
                ))
            }
            FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte => {
                let value = parse_value(field, single(self, field, operand)?)?;
                Ok(Predicate::new(
                    format!("{} {} ?", column, self.comparison()),
                    vec![value],
                ))
            }
            FilterOperator::DateEqual | FilterOperator::DateGte | FilterOperator::DateLte => {
                let raw = single(self, field, operand)?;
                let day = parse_timestamp(raw)
                    .map(|ts| ts.date().format(DATE_FORMAT).to_string())
                    .ok_or_else(|| {
                        RestError::InvalidFilter(format!(
                            "{}: '{}' is not a valid ISO-8601 timestamp",
                            field.name, raw
                        ))
                    })?;
                Ok(Predicate::new(
                    format!("date({}) {} ?", column, self.comparison()),
                    vec![SqlValue::Text(day)],
                ))
            }
        }
    }

    fn comparison(&self) -> &'static str {
        match self {
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte | FilterOperator::DateGte => ">=",
            FilterOperator::Lte | FilterOperator::DateLte => "<=",
            _ => "=",
        }
    }
}

/// One parsed `(field, operator, operand)` filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    pub operand: Vec<String>,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, operand: Vec<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            operand,
        }
    }

    pub fn compile(&self, field: &FieldDef) -> RestResult<Predicate> {
        self.operator.compile(field, &self.operand)
    }
}

fn single<'a>(op: &FilterOperator, field: &FieldDef, operand: &'a [String]) -> RestResult<&'a str> {
    match operand {
        [value] => Ok(value.as_str()),
        _ => Err(arity_error(op, field, "exactly one value")),
    }
}

fn arity_error(op: &FilterOperator, field: &FieldDef, expected: &str) -> RestError {
    RestError::InvalidFilter(format!(
        "{}__{} expects {}",
        field.name,
        op.as_str(),
        expected
    ))
}

fn parse_value(field: &FieldDef, raw: &str) -> RestResult<SqlValue> {
    field.kind.parse_operand(raw).ok_or_else(|| {
        RestError::InvalidFilter(format!(
            "{}: '{}' is not a valid {}",
            field.name,
            raw,
            field.kind.as_str()
        ))
    })
}

/// Comma-joined and repeated values normalize to the same list
fn split_values(operand: &[String]) -> Vec<String> {
    operand
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn integer() -> FieldDef {
        FieldDef::new("quantity", FieldKind::Integer)
    }

    #[test]
    fn test_token_round_trip() {
        for op in FilterOperator::ALL {
            assert_eq!(FilterOperator::from_token(op.as_str()), Some(op));
        }
        assert_eq!(FilterOperator::from_token("like"), None);
    }

    #[test]
    fn test_in_accepts_joined_or_repeated_values() {
        let joined = FilterOperator::In
            .compile(&integer(), &strings(&["1,2,3"]))
            .unwrap();
        let repeated = FilterOperator::In
            .compile(&integer(), &strings(&["1", "2", "3"]))
            .unwrap();
        assert_eq!(joined, repeated);
        assert_eq!(joined.sql, "\"quantity\" IN (?, ?, ?)");
    }

    #[test]
    fn test_bool_literal_quirk() {
        let field = FieldDef::new("is_disabled", FieldKind::Boolean);
        let compile = |raw: &str| FilterOperator::Bool.compile(&field, &strings(&[raw])).unwrap();

        assert_eq!(compile("false").params, vec![SqlValue::Integer(0)]);
        assert_eq!(compile("true").params, vec![SqlValue::Integer(1)]);
        assert_eq!(compile("yes").params, vec![SqlValue::Integer(1)]);
        assert_eq!(compile("").params, vec![SqlValue::Integer(1)]);
    }

    #[test]
    fn test_between_arity() {
        let joined = FilterOperator::Between
            .compile(&integer(), &strings(&["1,5"]))
            .unwrap();
        assert_eq!(joined.sql, "\"quantity\" BETWEEN ? AND ?");
        assert_eq!(joined.params, vec![SqlValue::Integer(1), SqlValue::Integer(5)]);

        let err = FilterOperator::Between
            .compile(&integer(), &strings(&["1"]))
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidFilter(_)));
    }

    #[test]
    fn test_single_operand_operators_reject_extra_values() {
        let err = FilterOperator::Equal
            .compile(&integer(), &strings(&["1", "2"]))
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidFilter(_)));
    }

    #[test]
    fn test_unparseable_operand_is_an_error() {
        let err = FilterOperator::Gt
            .compile(&integer(), &strings(&["abc"]))
            .unwrap_err();
        assert!(err.to_string().contains("not a valid integer"));
    }

    #[test]
    fn test_contains_is_case_insensitive_and_escaped() {
        let field = FieldDef::new("name", FieldKind::Text);
        let predicate = FilterOperator::Contains
            .compile(&field, &strings(&["50%_off"]))
            .unwrap();
        assert_eq!(
            predicate.sql,
            "lower(\"name\") LIKE '%' || lower(?) || '%' ESCAPE '\\'"
        );
        assert_eq!(predicate.params, vec![SqlValue::Text("50\\%\\_off".into())]);
    }

    #[test]
    fn test_date_operators_truncate_to_day() {
        let field = FieldDef::new("created_on", FieldKind::Timestamp);
        let predicate = FilterOperator::DateGte
            .compile(&field, &strings(&["2024-03-09T18:45:00"]))
            .unwrap();
        assert_eq!(predicate.sql, "date(\"created_on\") >= ?");
        assert_eq!(predicate.params, vec![SqlValue::Text("2024-03-09".into())]);

        let err = FilterOperator::DateEqual
            .compile(&field, &strings(&["09/03/2024"]))
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidFilter(_)));
    }

    #[test]
    fn test_supports() {
        assert!(FilterOperator::Contains.supports(FieldKind::Text));
        assert!(!FilterOperator::Bool.supports(FieldKind::Integer));
        assert!(FilterOperator::DateLte.supports(FieldKind::Timestamp));
        assert!(!FilterOperator::DateLte.supports(FieldKind::Text));
    }
}
