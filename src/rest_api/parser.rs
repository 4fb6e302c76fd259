//! # Query Parameter Parser
//!
//! Decodes list query parameters against a resource's configuration.
//!
//! Grammar:
//! - filters: `__<field>__<operator>=<value>`, repeatable
//! - pagination: `__page=<int>`, `__limit=<int>`
//! - projection: `__only`, `__exclude`, `__include` (comma-joined or repeated)
//! - ordering: `__order_by=<field>`
//!
//! Filters on fields or operators the resource does not allow are dropped.

use std::collections::BTreeMap;

use tracing::debug;

use super::definition::ResourceConfig;
use super::errors::{RestError, RestResult};
use super::filter::{FilterExpr, FilterOperator};
use crate::model::Projection;

const PAGE: &str = "__page";
const LIMIT: &str = "__limit";
const ONLY: &str = "__only";
const EXCLUDE: &str = "__exclude";
const INCLUDE: &str = "__include";
const ORDER_BY: &str = "__order_by";

const RESERVED: [&str; 6] = [PAGE, LIMIT, ONLY, EXCLUDE, INCLUDE, ORDER_BY];

/// Parsed query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub filters: Vec<FilterExpr>,
    /// 1-based
    pub page: usize,
    pub limit: usize,
    pub projection: Projection,
    pub order_by: Option<String>,
}

impl QueryParams {
    /// Parse repeated `(key, value)` pairs as they appear in the query string
    pub fn parse(pairs: &[(String, String)], config: &ResourceConfig) -> RestResult<Self> {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            grouped.entry(key.as_str()).or_default().push(value.clone());
        }

        let page = match first(&grouped, PAGE) {
            Some(raw) => parse_positive(PAGE, raw)?,
            None => 1,
        };

        let limit = match first(&grouped, LIMIT) {
            Some(raw) => {
                let requested = parse_positive(LIMIT, raw)?;
                if requested > config.max_limit() {
                    config.default_limit()
                } else {
                    requested
                }
            }
            None => config.default_limit(),
        };

        let order_by = first(&grouped, ORDER_BY).and_then(|field| {
            if config.orderable(field) {
                Some(field.to_string())
            } else {
                debug!(field, "ignoring __order_by outside the allow-list");
                None
            }
        });

        Ok(Self {
            filters: parse_filters(&grouped, config),
            page,
            limit,
            projection: Self::projection(&grouped, config),
            order_by,
        })
    }

    /// Projection used when no projection parameters are given
    pub fn default_projection(config: &ResourceConfig) -> Projection {
        Self::projection(&BTreeMap::new(), config)
    }

    fn projection(grouped: &BTreeMap<&str, Vec<String>>, config: &ResourceConfig) -> Projection {
        let only = match grouped.get(ONLY) {
            Some(values) => name_list(values),
            None => config.default_only().to_vec(),
        };

        let mut exclude = grouped.get(EXCLUDE).map(|v| name_list(v)).unwrap_or_default();
        exclude.extend(config.default_exclude().iter().cloned());

        let included = grouped.get(INCLUDE).map(|v| name_list(v)).unwrap_or_default();
        exclude.extend(
            config
                .optional_relations()
                .iter()
                .filter(|relation| !included.contains(relation))
                .cloned(),
        );

        Projection { only, exclude }
    }
}

fn first<'a>(grouped: &'a BTreeMap<&str, Vec<String>>, key: &str) -> Option<&'a str> {
    grouped
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
}

fn parse_positive(key: &str, raw: &str) -> RestResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(RestError::InvalidQueryParam(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

/// One comma-joined value or several repeated ones
fn name_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_filters(grouped: &BTreeMap<&str, Vec<String>>, config: &ResourceConfig) -> Vec<FilterExpr> {
    let mut filters = Vec::new();
    for (key, values) in grouped {
        if RESERVED.contains(key) {
            continue;
        }
        let Some((field, token)) = key.strip_prefix("__").and_then(|rest| rest.rsplit_once("__")) else {
            continue;
        };
        let Some(operator) = FilterOperator::from_token(token) else {
            debug!(key, "dropping filter with unknown operator");
            continue;
        };
        if !config.allows(field, operator) {
            debug!(key, "dropping filter not allowed on this resource");
            continue;
        }
        filters.push(FilterExpr::new(field, operator, values.clone()));
    }
    filters
}
