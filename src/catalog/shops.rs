//! Retail shops and their customers

use std::sync::Arc;

use crate::auth::OpenAccess;
use crate::model::{EntityDef, FieldDef, FieldKind};
use crate::rest_api::{AuthRequirement, FilterOperator, ModelResource, ResourceConfig, RestResult};

pub fn retail_shop_entity() -> EntityDef {
    EntityDef::new("RetailShop")
        .field(FieldDef::new("name", FieldKind::Text).required())
        .field(FieldDef::new("identity", FieldKind::Text))
        .timestamps()
}

pub fn customer_entity() -> EntityDef {
    EntityDef::new("Customer")
        .field(FieldDef::new("name", FieldKind::Text))
        .field(FieldDef::new("email", FieldKind::Text))
        .field(FieldDef::new("mobile_number", FieldKind::Text))
        .field(FieldDef::new("active", FieldKind::Boolean).with_default("1"))
        .field(FieldDef::new("loyalty_points", FieldKind::Integer).with_default("0"))
        .timestamps()
}

/// Shops are managed by administrators only
pub fn retail_shop_resource(entity: &Arc<EntityDef>) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("id", &[FilterOperator::Equal, FilterOperator::In])
        .filter("name", &[FilterOperator::Equal, FilterOperator::Contains])
        .order_by(&["id", "name"])
        .auth(AuthRequirement::authenticated().require_role("admin"));

    ModelResource::new(Arc::clone(entity), config, OpenAccess)
}

pub fn customer_resource(entity: &Arc<EntityDef>) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("id", &[FilterOperator::Equal, FilterOperator::In])
        .filter("name", &[FilterOperator::Equal, FilterOperator::Contains])
        .filter("mobile_number", &[FilterOperator::Equal, FilterOperator::Contains])
        .filter("email", &[FilterOperator::Equal])
        .filter("active", &[FilterOperator::Bool])
        .filter("loyalty_points", &[FilterOperator::Gte, FilterOperator::Lte, FilterOperator::Between])
        .order_by(&["id", "name", "loyalty_points"])
        .auth(AuthRequirement::authenticated());

    ModelResource::new(Arc::clone(entity), config, OpenAccess)
}
