//! Orders and their line items

use std::sync::Arc;

use crate::auth::ShopScoped;
use crate::model::{EntityDef, FieldDef, FieldKind};
use crate::rest_api::{AuthRequirement, FilterOperator, ModelResource, ResourceConfig, RestResult};

use FilterOperator::*;

pub fn item_entity(product: &Arc<EntityDef>) -> EntityDef {
    EntityDef::new("Item")
        .field(
            FieldDef::new("order_id", FieldKind::Uuid)
                .required()
                .references("order"),
        )
        .field(FieldDef::new("product_id", FieldKind::Uuid).references(product.table()))
        .field(FieldDef::new("unit_price", FieldKind::Real))
        .field(FieldDef::new("quantity", FieldKind::Real))
        .field(FieldDef::new("discount", FieldKind::Real).with_default("0"))
        .timestamps()
        .belongs_to("product", product, "product_id")
}

pub fn order_entity(
    shop: &Arc<EntityDef>,
    customer: &Arc<EntityDef>,
    item: &Arc<EntityDef>,
) -> EntityDef {
    EntityDef::new("Order")
        .field(FieldDef::new("invoice_number", FieldKind::Integer))
        .field(FieldDef::new("reference_number", FieldKind::Text))
        .field(FieldDef::new("sub_total", FieldKind::Real).with_default("0"))
        .field(FieldDef::new("total", FieldKind::Real).with_default("0"))
        .field(FieldDef::new("amount_paid", FieldKind::Real).with_default("0"))
        .field(FieldDef::new("is_void", FieldKind::Boolean).with_default("0"))
        .field(FieldDef::new("customer_id", FieldKind::Uuid).references(customer.table()))
        .field(
            FieldDef::new("retail_shop_id", FieldKind::Uuid)
                .required()
                .references(shop.table()),
        )
        .timestamps()
        .belongs_to("customer", customer, "customer_id")
        .belongs_to("retail_shop", shop, "retail_shop_id")
        .has_many("items", item, "order_id")
}

pub fn order_resource(entity: &Arc<EntityDef>) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("id", &[Equal])
        .filter("customer_id", &[Equal])
        .filter("retail_shop_id", &[Equal, In])
        .filter("is_void", &[Bool])
        .filter("total", &[Gte, Lte, Between])
        .filter("created_on", &[DateLte, DateEqual, DateGte])
        .order_by(&["id", "invoice_number"])
        .optional(&["items", "customer", "retail_shop"])
        .auth(AuthRequirement::authenticated());

    let policy = ShopScoped::field("retail_shop_id").with_permissions("order");
    ModelResource::new(Arc::clone(entity), config, policy)
}

/// Items follow the shop of their order; shop access alone decides
pub fn item_resource(entity: &Arc<EntityDef>, order: &EntityDef) -> RestResult<ModelResource> {
    let config = ResourceConfig::new()
        .filter("id", &[Equal, In])
        .filter("order_id", &[Equal, In])
        .filter("product_id", &[Equal, In])
        .filter("created_on", &[DateLte, DateEqual, DateGte])
        .filter("updated_on", &[DateLte, DateEqual, DateGte])
        .order_by(&["id"])
        .optional(&["product"])
        .auth(AuthRequirement::authenticated());

    let policy = ShopScoped::parent("order_id", order.table(), "retail_shop_id");
    ModelResource::new(Arc::clone(entity), config, policy)
}
