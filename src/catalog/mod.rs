//! # Point-of-Sale Catalog
//!
//! The entity set served by the API and the resource declared for each:
//!
//! | Resource      | Access                                                |
//! |---------------|-------------------------------------------------------|
//! | `retail_shop` | admins only                                           |
//! | `customer`    | any authenticated user                                |
//! | `tag`         | `*_tag` permissions within the caller's shops         |
//! | `product`     | `*_product` permissions within the caller's shops     |
//! | `product_tag` | association batches, shop taken from the product      |
//! | `order`       | `*_order` permissions within the caller's shops       |
//! | `item`        | shop taken from the order                             |

mod orders;
mod products;
mod shops;

use std::sync::Arc;

use tracing::info;

use crate::auth::JwtManager;
use crate::model::EntityDef;
use crate::observability::Event;
use crate::rest_api::{ApiRegistry, RestResult};
use crate::store::{Database, StoreResult};

pub use orders::{item_entity, item_resource, order_entity, order_resource};
pub use products::{
    product_entity, product_resource, product_tag_entity, product_tag_resource, tag_entity,
    tag_resource,
};
pub use shops::{customer_entity, customer_resource, retail_shop_entity, retail_shop_resource};

/// Entity definitions of the point-of-sale domain
#[derive(Debug, Clone)]
pub struct Catalog {
    pub retail_shop: Arc<EntityDef>,
    pub customer: Arc<EntityDef>,
    pub tag: Arc<EntityDef>,
    pub product: Arc<EntityDef>,
    pub product_tag: Arc<EntityDef>,
    pub order: Arc<EntityDef>,
    pub item: Arc<EntityDef>,
}

impl Catalog {
    pub fn new() -> Self {
        let retail_shop = Arc::new(retail_shop_entity());
        let customer = Arc::new(customer_entity());
        let tag = Arc::new(tag_entity(&retail_shop));
        let product = Arc::new(product_entity(&retail_shop));
        let product_tag = Arc::new(product_tag_entity(&product, &tag));
        let item = Arc::new(item_entity(&product));
        let order = Arc::new(order_entity(&retail_shop, &customer, &item));

        Self {
            retail_shop,
            customer,
            tag,
            product,
            product_tag,
            order,
            item,
        }
    }

    /// Every entity, referenced tables first
    pub fn entities(&self) -> Vec<&EntityDef> {
        [
            &self.retail_shop,
            &self.customer,
            &self.tag,
            &self.product,
            &self.product_tag,
            &self.order,
            &self.item,
        ]
        .into_iter()
        .map(|entity| entity.as_ref())
        .collect()
    }

    /// Create any missing tables
    pub fn migrate(&self, db: &Database) -> StoreResult<()> {
        db.migrate(&self.entities())
    }

    /// Register every catalog resource
    pub fn registry(&self, db: Arc<Database>, jwt: JwtManager) -> RestResult<ApiRegistry> {
        let mut registry = ApiRegistry::new(db, jwt);

        registry.register(retail_shop_resource(&self.retail_shop)?)?;
        registry.register(customer_resource(&self.customer)?)?;
        registry.register(tag_resource(&self.tag)?)?;
        registry.register(product_resource(&self.product)?)?;
        registry.register_association(product_tag_resource(&self.product_tag, &self.product)?)?;
        registry.register(order_resource(&self.order)?)?;
        registry.register(item_resource(&self.item, &self.order)?)?;

        info!(
            event = Event::RoutesRegistered.as_str(),
            resources = %registry.names().collect::<Vec<_>>().join(","),
        );
        Ok(registry)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
