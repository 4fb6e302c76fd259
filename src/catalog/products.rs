//! Tags, products and the product/tag link
//!
//! Tags and products carry their shop directly. Links inherit the shop of
//! the product they point at.

use std::sync::Arc;

use crate::auth::ShopScoped;
use crate::model::{EntityDef, FieldDef, FieldKind};
use crate::rest_api::{
    AssociationResource, AuthRequirement, FilterOperator, ModelResource, ResourceConfig, RestResult,
};

use FilterOperator::*;

pub fn tag_entity(shop: &Arc<EntityDef>) -> EntityDef {
    EntityDef::new("Tag")
        .field(FieldDef::new("name", FieldKind::Text).required())
        .field(
            FieldDef::new("retail_shop_id", FieldKind::Uuid)
                .required()
                .references(shop.table()),
        )
        .timestamps()
        .belongs_to("retail_shop", shop, "retail_shop_id")
}

pub fn product_entity(shop: &Arc<EntityDef>) -> EntityDef {
    EntityDef::new("Product")
        .field(FieldDef::new("name", FieldKind::Text).required())
        .field(FieldDef::new("min_stock", FieldKind::Integer).required())
        .field(FieldDef::new("auto_discount", FieldKind::Real).with_default("0"))
        .field(FieldDef::new("sub_description", FieldKind::Text))
        .field(FieldDef::new("is_disabled", FieldKind::Boolean).with_default("0"))
        .field(
            FieldDef::new("retail_shop_id", FieldKind::Uuid)
                .required()
                .references(shop.table()),
        )
        .timestamps()
        .belongs_to("retail_shop", shop, "retail_shop_id")
}

pub fn product_tag_entity(product: &Arc<EntityDef>, tag: &Arc<EntityDef>) -> EntityDef {
    EntityDef::new("ProductTag")
        .field(
            FieldDef::new("product_id", FieldKind::Uuid)
                .required()
                .references(product.table()),
        )
        .field(
            FieldDef::new("tag_id", FieldKind::Uuid)
                .required()
                .references(tag.table()),
        )
        .timestamps()
        .unique_together(&["product_id", "tag_id"])
        .belongs_to("product", product, "product_id")
        .belongs_to("tag", tag, "tag_id")
}

pub fn tag_resource(entity: &Arc<EntityDef>) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("name", &[Equal, Contains])
        .filter("retail_shop_id", &[Equal, In])
        .order_by(&["retail_shop_id", "id", "name"])
        .optional(&["retail_shop"])
        .auth(AuthRequirement::authenticated());

    let policy = ShopScoped::field("retail_shop_id").with_permissions("tag");
    ModelResource::new(Arc::clone(entity), config, policy)
}

pub fn product_resource(entity: &Arc<EntityDef>) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("id", &[Equal, In])
        .filter("name", &[Equal, Contains])
        .filter("retail_shop_id", &[Equal, In])
        .filter("min_stock", &[Equal, Gt, Gte, Between])
        .filter("is_disabled", &[Bool])
        .filter("created_on", &[DateLte, DateEqual, DateGte])
        .filter("updated_on", &[Gte, DateGte, DateEqual, DateLte])
        .order_by(&["retail_shop_id", "id", "name"])
        .optional(&["retail_shop"])
        .limits(100, 1000)
        .auth(AuthRequirement::authenticated());

    let policy = ShopScoped::field("retail_shop_id").with_permissions("product");
    ModelResource::new(Arc::clone(entity), config, policy)
}

/// Tag links are edited in batches by administrators
pub fn product_tag_resource(
    entity: &Arc<EntityDef>,
    product: &EntityDef,
) -> RestResult<AssociationResource> {
    let config = ResourceConfig::new()
        .filter("product_id", &[Equal, In])
        .filter("tag_id", &[Equal, In])
        .optional(&["product", "tag"])
        .auth(AuthRequirement::authenticated().accept_role("admin"));

    let policy = ShopScoped::parent("product_id", product.table(), "retail_shop_id")
        .with_permissions("product_tag");
    AssociationResource::new(Arc::clone(entity), config, policy)
}
