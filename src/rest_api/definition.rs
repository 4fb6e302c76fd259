//! # Resource Definitions
//!
//! Immutable per-resource configuration. A `ResourceConfig` is built once at
//! registration and checked against the entity's field registry there, so a
//! misnamed filter or ordering field fails at startup rather than being
//! silently ignored on every request.

use std::collections::BTreeMap;

use super::errors::{RestError, RestResult};
use super::filter::FilterOperator;
use crate::auth::{AuthError, AuthResult, Principal};
use crate::model::EntityDef;

/// Default page size
pub const DEFAULT_LIMIT: usize = 50;

/// Largest page size a caller may request
pub const MAX_LIMIT: usize = 100;

/// Role gating evaluated by the dispatcher before the resource runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequirement {
    pub auth_required: bool,
    /// Every one of these must be held
    pub roles_required: Vec<String>,
    /// At least one of these must be held, when non-empty
    pub roles_accepted: Vec<String>,
}

impl AuthRequirement {
    /// Open to anonymous callers
    pub fn none() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            auth_required: true,
            ..Self::default()
        }
    }

    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.roles_required.push(role.into());
        self
    }

    pub fn accept_role(mut self, role: impl Into<String>) -> Self {
        self.roles_accepted.push(role.into());
        self
    }

    /// Nothing is checked unless `auth_required` is set
    pub fn check(&self, principal: &Principal) -> AuthResult<()> {
        if !self.auth_required {
            return Ok(());
        }
        if !principal.is_authenticated() {
            return Err(AuthError::AuthenticationRequired);
        }
        if let Some(missing) = self.roles_required.iter().find(|r| !principal.has_role(r)) {
            return Err(AuthError::MissingRole(missing.clone()));
        }
        if !self.roles_accepted.is_empty()
            && !self.roles_accepted.iter().any(|r| principal.has_role(r))
        {
            return Err(AuthError::RoleNotAccepted);
        }
        Ok(())
    }
}

/// Declarative contract of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    filters: BTreeMap<String, Vec<FilterOperator>>,
    order_by: Vec<String>,
    max_limit: usize,
    default_limit: usize,
    only: Vec<String>,
    exclude: Vec<String>,
    optional: Vec<String>,
    auth: AuthRequirement,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            order_by: Vec::new(),
            max_limit: MAX_LIMIT,
            default_limit: DEFAULT_LIMIT,
            only: Vec::new(),
            exclude: Vec::new(),
            optional: Vec::new(),
            auth: AuthRequirement::none(),
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl ResourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `operators` on `field`
    pub fn filter(mut self, field: &str, operators: &[FilterOperator]) -> Self {
        self.filters
            .entry(field.to_string())
            .or_default()
            .extend_from_slice(operators);
        self
    }

    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.order_by = owned(fields);
        self
    }

    pub fn limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    pub fn only(mut self, fields: &[&str]) -> Self {
        self.only = owned(fields);
        self
    }

    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.exclude = owned(fields);
        self
    }

    /// Relations left out of responses unless named in `__include`
    pub fn optional(mut self, relations: &[&str]) -> Self {
        self.optional = owned(relations);
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn filters(&self) -> &BTreeMap<String, Vec<FilterOperator>> {
        &self.filters
    }

    pub fn allows(&self, field: &str, operator: FilterOperator) -> bool {
        self.filters
            .get(field)
            .map(|ops| ops.contains(&operator))
            .unwrap_or(false)
    }

    pub fn orderable(&self, field: &str) -> bool {
        self.order_by.iter().any(|f| f == field)
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn default_only(&self) -> &[String] {
        &self.only
    }

    pub fn default_exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn optional_relations(&self) -> &[String] {
        &self.optional
    }

    pub fn auth_requirement(&self) -> &AuthRequirement {
        &self.auth
    }

    /// Check every configured name against the entity
    pub fn validate(&self, entity: &EntityDef) -> RestResult<()> {
        let invalid = |what: String| {
            Err(RestError::Config(format!("{}: {}", entity.name(), what)))
        };

        for (name, operators) in &self.filters {
            let Some(field) = entity.get_field(name) else {
                return invalid(format!("filter on unknown field '{}'", name));
            };
            if let Some(op) = operators.iter().find(|op| !op.supports(field.kind)) {
                return invalid(format!(
                    "operator '{}' does not apply to {} field '{}'",
                    op.as_str(),
                    field.kind.as_str(),
                    name
                ));
            }
        }
        if let Some(name) = self.order_by.iter().find(|f| !entity.has_field(f)) {
            return invalid(format!("ordering on unknown field '{}'", name));
        }
        if let Some(name) = self.optional.iter().find(|r| entity.relation(r).is_none()) {
            return invalid(format!("optional '{}' is not a relation", name));
        }
        if let Some(name) = self
            .only
            .iter()
            .chain(&self.exclude)
            .find(|n| !entity.has_field(n) && entity.relation(n).is_none())
        {
            return invalid(format!("projection names unknown field '{}'", name));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return invalid(format!(
                "default_limit {} must be between 1 and max_limit {}",
                self.default_limit, self.max_limit
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, FieldKind};
    use std::sync::Arc;

    fn tag() -> EntityDef {
        let shop = Arc::new(EntityDef::new("RetailShop"));
        EntityDef::new("Tag")
            .field(FieldDef::new("name", FieldKind::Text).required())
            .field(FieldDef::new("retail_shop_id", FieldKind::Uuid).required())
            .timestamps()
            .belongs_to("retail_shop", &shop, "retail_shop_id")
    }

    #[test]
    fn test_valid_config() {
        let config = ResourceConfig::new()
            .filter("name", &[FilterOperator::Equal, FilterOperator::Contains])
            .filter("created_on", &[FilterOperator::DateGte])
            .order_by(&["name"])
            .optional(&["retail_shop"]);
        assert!(config.validate(&tag()).is_ok());
        assert!(config.allows("name", FilterOperator::Contains));
        assert!(!config.allows("name", FilterOperator::In));
        assert_eq!(config.default_limit(), DEFAULT_LIMIT);
        assert_eq!(config.max_limit(), MAX_LIMIT);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let entity = tag();
        let bad_filter = ResourceConfig::new().filter("colour", &[FilterOperator::Equal]);
        assert!(matches!(bad_filter.validate(&entity), Err(RestError::Config(_))));

        let bad_order = ResourceConfig::new().order_by(&["colour"]);
        assert!(bad_order.validate(&entity).is_err());

        let bad_optional = ResourceConfig::new().optional(&["name"]);
        assert!(bad_optional.validate(&entity).is_err());
    }

    #[test]
    fn test_operator_must_fit_field_kind() {
        let config = ResourceConfig::new().filter("name", &[FilterOperator::Bool]);
        assert!(config.validate(&tag()).is_err());
    }

    #[test]
    fn test_limits_must_be_ordered() {
        let config = ResourceConfig::new().limits(200, 100);
        assert!(config.validate(&tag()).is_err());
    }

    #[test]
    fn test_auth_requirement() {
        let anon = Principal::anonymous();
        let staff = Principal::authenticated("u").with_role("staff");

        assert!(AuthRequirement::none().check(&anon).is_ok());
        assert!(matches!(
            AuthRequirement::authenticated().check(&anon),
            Err(AuthError::AuthenticationRequired)
        ));

        let admin_only = AuthRequirement::authenticated().require_role("admin");
        assert!(matches!(admin_only.check(&staff), Err(AuthError::MissingRole(_))));

        let accepted = AuthRequirement::authenticated()
            .accept_role("owner")
            .accept_role("staff");
        assert!(accepted.check(&staff).is_ok());
        assert!(matches!(
            accepted.check(&Principal::authenticated("v")),
            Err(AuthError::RoleNotAccepted)
        ));
    }
}
