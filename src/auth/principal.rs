//! # Principal
//!
//! The identity a request acts as. Built from a validated bearer token, or
//! anonymous when no token is presented.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Caller identity with roles, permissions and shop memberships
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// None for anonymous callers
    pub user_id: Option<String>,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    /// Shops whose rows this principal may see and modify
    pub retail_shop_ids: BTreeSet<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_shop(mut self, shop_id: impl Into<String>) -> Self {
        self.retail_shop_ids.insert(shop_id.into().to_lowercase());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Shop ids compare case-insensitively (UUID text)
    pub fn has_shop_access(&self, shop_id: &str) -> bool {
        self.retail_shop_ids.contains(&shop_id.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_nothing() {
        let anon = Principal::anonymous();
        assert!(!anon.is_authenticated());
        assert!(!anon.has_role("admin"));
        assert!(!anon.has_shop_access("any"));
    }

    #[test]
    fn test_builders() {
        let principal = Principal::authenticated("u-1")
            .with_role("admin")
            .with_permission("view_tag")
            .with_shop("6F1C1B8E-4A53-4C1E-9A43-6F7A3F1D2A10");

        assert!(principal.is_authenticated());
        assert!(principal.has_role("admin"));
        assert!(principal.has_permission("view_tag"));
        assert!(!principal.has_permission("create_tag"));
        assert!(principal.has_shop_access("6f1c1b8e-4a53-4c1e-9a43-6f7a3f1d2a10"));
    }
}
