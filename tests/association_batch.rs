//! Association Batch Tests
//!
//! Product/tag links edited through tagged batches:
//! - add and remove net to zero
//! - items before a failure stay committed
//! - unknown actions are skipped, malformed items stop the batch
//! - permissions follow the parent product's shop

use retailpos::auth::Principal;
use retailpos::catalog::{self, Catalog};
use retailpos::rest_api::{AssociationResource, RestError};
use retailpos::store::Database;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    db: Database,
    links: AssociationResource,
    product: String,
    foreign_product: String,
    tags: Vec<String>,
    shop: String,
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

fn setup() -> Fixture {
    let catalog = Catalog::new();
    let db = Database::open_in_memory().unwrap();
    catalog.migrate(&db).unwrap();

    let admin = Principal::authenticated("admin").with_role("admin");
    let shops = catalog::retail_shop_resource(&catalog.retail_shop)
        .unwrap()
        .create(&db, &admin, json!([{"name": "North"}, {"name": "South"}]))
        .unwrap();
    let (north, south) = (id_of(&shops[0]), id_of(&shops[1]));

    let owner = Principal::authenticated("owner")
        .with_permission("create_product")
        .with_permission("create_tag")
        .with_shop(&north)
        .with_shop(&south);

    let products = catalog::product_resource(&catalog.product)
        .unwrap()
        .create(
            &db,
            &owner,
            json!([
                {"name": "Cola", "min_stock": 5, "retail_shop_id": north},
                {"name": "Tea", "min_stock": 1, "retail_shop_id": south}
            ]),
        )
        .unwrap();

    let tags = catalog::tag_resource(&catalog.tag)
        .unwrap()
        .create(
            &db,
            &owner,
            json!([
                {"name": "Drinks", "retail_shop_id": north},
                {"name": "Cold", "retail_shop_id": north}
            ]),
        )
        .unwrap();

    Fixture {
        links: catalog::product_tag_resource(&catalog.product_tag, &catalog.product).unwrap(),
        product: id_of(&products[0]),
        foreign_product: id_of(&products[1]),
        tags: tags.iter().map(id_of).collect(),
        shop: north,
        db,
    }
}

fn manager(shop: &str) -> Principal {
    Principal::authenticated("manager")
        .with_role("admin")
        .with_permission("view_product_tag")
        .with_permission("create_product_tag")
        .with_permission("change_product_tag")
        .with_permission("remove_product_tag")
        .with_shop(shop)
}

fn link_count(db: &Database) -> i64 {
    let conn = db.lock().unwrap();
    conn.query_row("SELECT COUNT(*) FROM \"product_tag\"", [], |row| row.get(0))
        .unwrap()
}

// =============================================================================
// Add / Remove
// =============================================================================

/// Adding and then removing the same pair leaves no link behind.
#[test]
fn test_add_then_remove_nets_to_zero() {
    let fx = setup();
    let user = manager(&fx.shop);
    let pair = json!({"product_id": fx.product, "tag_id": fx.tags[0]});

    let mut add = pair.clone();
    add["__action"] = json!("add");
    let outcomes = fx.links.apply(&fx.db, &user, json!([add])).unwrap();
    assert_eq!(outcomes[0]["status"], "added");
    assert_eq!(outcomes[0]["data"]["tag_id"], fx.tags[0].as_str());
    assert!(outcomes[0]["data"].get("product").is_none());
    assert_eq!(link_count(&fx.db), 1);

    let mut remove = pair.clone();
    remove["__action"] = json!("remove");
    let outcomes = fx.links.apply(&fx.db, &user, json!([remove.clone()])).unwrap();
    assert_eq!(outcomes[0]["status"], "removed");
    assert_eq!(link_count(&fx.db), 0);

    let failure = fx.links.apply(&fx.db, &user, json!([remove])).unwrap_err();
    assert_eq!(failure.index, 0);
    assert_eq!(failure.status_code().as_u16(), 404);
    assert_eq!(failure.error.to_string(), "Object not Found");
    assert!(failure.applied.is_empty());
}

/// Items before the failing one stay committed; the failing one does not.
#[test]
fn test_partial_commit_stops_at_first_failure() {
    let fx = setup();
    let user = manager(&fx.shop);

    let failure = fx
        .links
        .apply(
            &fx.db,
            &user,
            json!([
                {"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]},
                {"__action": "add", "product_id": fx.product, "tag_id": fx.tags[1]},
                {"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]},
                {"__action": "remove", "product_id": fx.product, "tag_id": fx.tags[1]}
            ]),
        )
        .unwrap_err();

    assert_eq!(failure.index, 2);
    assert_eq!(failure.applied.len(), 2);
    assert!(matches!(failure.error, RestError::Integrity { .. }));
    assert_eq!(failure.envelope()["message"], "Integrity Error");
    assert_eq!(link_count(&fx.db), 2);
}

/// An update can repoint a link at another tag.
#[test]
fn test_update_link() {
    let fx = setup();
    let user = manager(&fx.shop);

    let added = fx
        .links
        .apply(
            &fx.db,
            &user,
            json!({"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]}),
        )
        .unwrap();
    let link_id = id_of(&added[0]["data"]);

    let outcomes = fx
        .links
        .apply(
            &fx.db,
            &user,
            json!([{"__action": "update", "id": link_id, "tag_id": fx.tags[1]}]),
        )
        .unwrap();
    assert_eq!(outcomes[0]["status"], "updated");
    assert_eq!(outcomes[0]["data"]["tag_id"], fx.tags[1].as_str());
    assert!(outcomes[0]["data"]["updated_on"].is_string());
}

/// Add and remove inside one batch both succeed and leave no link.
#[test]
fn test_add_and_remove_in_one_batch() {
    let fx = setup();
    let outcomes = fx
        .links
        .apply(
            &fx.db,
            &manager(&fx.shop),
            json!([
                {"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]},
                {"__action": "remove", "product_id": fx.product, "tag_id": fx.tags[0]}
            ]),
        )
        .unwrap();

    let statuses: Vec<&str> = outcomes
        .iter()
        .map(|outcome| outcome["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["added", "removed"]);
    assert_eq!(link_count(&fx.db), 0);
}

/// Uppercase identifiers resolve the parent shop like their stored form.
#[test]
fn test_add_with_uppercase_ids() {
    let fx = setup();
    let outcomes = fx
        .links
        .apply(
            &fx.db,
            &manager(&fx.shop),
            json!([{
                "__action": "add",
                "product_id": fx.product.to_uppercase(),
                "tag_id": fx.tags[0].to_uppercase()
            }]),
        )
        .unwrap();

    assert_eq!(outcomes[0]["status"], "added");
    assert_eq!(outcomes[0]["data"]["product_id"], fx.product.as_str());
    assert_eq!(link_count(&fx.db), 1);
}

// =============================================================================
// Malformed Items
// =============================================================================

/// Unknown actions are reported as skipped and do not stop the batch.
#[test]
fn test_unknown_action_is_skipped() {
    let fx = setup();
    let outcomes = fx
        .links
        .apply(
            &fx.db,
            &manager(&fx.shop),
            json!([
                {"__action": "archive", "product_id": fx.product},
                {"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]}
            ]),
        )
        .unwrap();

    assert_eq!(outcomes[0], json!({"__action": "archive", "status": "skipped"}));
    assert_eq!(outcomes[1]["status"], "added");
    assert_eq!(link_count(&fx.db), 1);
}

/// An item without `__action` stops the batch with 400.
#[test]
fn test_missing_action_fails_item() {
    let fx = setup();
    let failure = fx
        .links
        .apply(
            &fx.db,
            &manager(&fx.shop),
            json!([{"product_id": fx.product, "tag_id": fx.tags[0]}]),
        )
        .unwrap_err();

    assert_eq!(failure.index, 0);
    assert_eq!(failure.status_code().as_u16(), 400);
    assert_eq!(failure.envelope()["data"]["tag_id"], fx.tags[0].as_str());
}

/// A remove must name at least one field to match on.
#[test]
fn test_remove_without_fields_is_rejected() {
    let fx = setup();
    let failure = fx
        .links
        .apply(&fx.db, &manager(&fx.shop), json!([{"__action": "remove"}]))
        .unwrap_err();
    assert_eq!(failure.status_code().as_u16(), 400);
    assert_eq!(failure.envelope()["operation"], "deleting relation");
}

/// A body that is neither an object nor an array is rejected up front.
#[test]
fn test_scalar_body_is_rejected() {
    let fx = setup();
    let failure = fx
        .links
        .apply(&fx.db, &manager(&fx.shop), json!("add"))
        .unwrap_err();
    assert!(matches!(failure.error, RestError::InvalidBody(_)));
}

// =============================================================================
// Permissions
// =============================================================================

/// Links to a product in another shop are refused with 403.
#[test]
fn test_add_to_foreign_product_is_forbidden() {
    let fx = setup();
    let failure = fx
        .links
        .apply(
            &fx.db,
            &manager(&fx.shop),
            json!([{"__action": "add", "product_id": fx.foreign_product, "tag_id": fx.tags[0]}]),
        )
        .unwrap_err();

    assert_eq!(failure.status_code().as_u16(), 403);
    assert_eq!(failure.error.to_string(), "Permission Denied");
    assert_eq!(link_count(&fx.db), 0);
}

/// Without the create permission nothing is added.
#[test]
fn test_add_requires_permission() {
    let fx = setup();
    let user = Principal::authenticated("clerk")
        .with_permission("view_product_tag")
        .with_shop(&fx.shop);

    let failure = fx
        .links
        .apply(
            &fx.db,
            &user,
            json!([{"__action": "add", "product_id": fx.product, "tag_id": fx.tags[0]}]),
        )
        .unwrap_err();
    assert_eq!(failure.status_code().as_u16(), 403);
}
