use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use stocksync_batch::{BatchSettings, MemoryCheckpointStore, RetryPolicy};
use stocksync_square::CatalogObject;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn square_item(id: &str, name: &str, variations: &[(&str, &str, &str)]) -> CatalogObject {
    let variations: Vec<_> = variations
        .iter()
        .map(|(vid, vname, sku)| {
            json!({"id": vid, "item_variation_data": {"name": vname, "sku": sku}})
        })
        .collect();
    serde_json::from_value(json!({
        "type": "ITEM",
        "id": id,
        "item_data": {"name": name, "variations": variations}
    }))
    .unwrap()
}

fn shopify_product(id: u64, title: &str, variants: &[(u64, &str, &str, i64)]) -> Product {
    let variants: Vec<_> = variants
        .iter()
        .map(|(vid, vtitle, sku, qty)| {
            json!({"id": vid, "title": vtitle, "sku": sku, "inventory_quantity": qty, "inventory_item_id": vid * 10})
        })
        .collect();
    serde_json::from_value(json!({"id": id, "title": title, "variants": variants})).unwrap()
}

fn snapshot(items: Vec<CatalogObject>, quantities: &[(&str, i64)]) -> SquareSnapshot {
    SquareSnapshot::from_parts(
        items,
        HashMap::new(),
        quantities.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
    )
}

#[test]
fn differing_quantity_becomes_update() {
    let snap = snapshot(
        vec![square_item("I1", "Alpine Shell", &[("V1", "Small", "AS-S"), ("V2", "Large", "AS-L")])],
        &[("V1", 4), ("V2", 2)],
    );
    let products = vec![shopify_product(1, "Alpine Shell Jacket", &[(11, "Small", "AS-S", 1), (12, "Large", "AS-L", 2)])];

    let plan = reconcile(&snap, &products);

    assert_eq!(plan.in_sync, 1);
    assert_eq!(plan.updates.len(), 1);
    let update = &plan.updates[0];
    assert_eq!(update.variation_id, "V1");
    assert_eq!(update.variant_id, 11);
    assert_eq!(update.inventory_item_id, Some(110));
    assert_eq!(update.shopify_quantity, Some(1));
    assert_eq!(update.square_quantity, 4);
    assert_eq!(update.rule, MatchRule::Sku);
}

#[test]
fn out_of_stock_items_are_ignored() {
    let snap = snapshot(vec![square_item("I1", "Beanie", &[("V1", "Regular", "BN-1")])], &[("V1", 0)]);
    let plan = reconcile(&snap, &[]);
    assert!(plan.unmatched.is_empty());
    assert!(plan.updates.is_empty());
}

#[test]
fn unmatched_item_reports_total_stock() {
    let snap = snapshot(
        vec![square_item("I1", "Trail Runner", &[("V1", "9", "TR-9"), ("V2", "10", "TR-10")])],
        &[("V1", 1), ("V2", 2)],
    );
    let products = vec![shopify_product(1, "Down Parka", &[(11, "M", "DP-M", 1)])];

    let plan = reconcile(&snap, &products);

    assert_eq!(
        plan.unmatched,
        vec![UnmatchedItem {
            name: "Trail Runner".to_owned(),
            skus: vec!["TR-9".to_owned(), "TR-10".to_owned()],
            total: 3,
        }]
    );
}

#[test]
fn variation_falls_back_to_title_then_reports_missing() {
    let snap = snapshot(
        vec![square_item("I1", "Camp Mug", &[("V1", "Blue", ""), ("V2", "Red", "")])],
        &[("V1", 2), ("V2", 5)],
    );
    let products = vec![shopify_product(1, "Camp Mug", &[(11, "Blue", "", 0)])];

    let plan = reconcile(&snap, &products);

    assert_eq!(plan.updates.len(), 1);
    assert_eq!(plan.updates[0].variant_title, "Blue");
    assert_eq!(plan.updates[0].rule, MatchRule::ExactTitle);
    assert_eq!(
        plan.missing_variants,
        vec![("Camp Mug".to_owned(), "Red".to_owned())]
    );
}

fn level_update(variation_id: &str, variant_id: u64, inventory_item_id: Option<u64>, square_quantity: i64) -> LevelUpdate {
    LevelUpdate {
        variation_id: variation_id.to_owned(),
        product_title: "Alpine Shell Jacket".to_owned(),
        variant_title: "Small".to_owned(),
        variant_id,
        inventory_item_id,
        shopify_quantity: Some(1),
        square_quantity,
        rule: MatchRule::Sku,
    }
}

fn shopify_client(server: &MockServer) -> ShopifyClient {
    ShopifyClient::with_base_url("shpat_test", &server.uri(), "2024-01", 5, "stocksync-test").unwrap()
}

#[tokio::test]
async fn changed_square_quantity_is_pushed_on_rerun() {
    let store = MemoryCheckpointStore::new();
    let settings = BatchSettings {
        item_delay: Duration::ZERO,
        batch_size: 10,
        batch_pause: Duration::ZERO,
        failure_pause: Duration::ZERO,
        concurrency: 1,
        retry: RetryPolicy::none(),
    };
    let pushed = Arc::new(Mutex::new(Vec::new()));

    let first = vec![level_update("V1", 11, Some(110), 4), level_update("V2", 12, Some(120), 2)];
    let tracker = ProgressTracker::open(&store, "sync-square-test", false).unwrap();
    let log = Arc::clone(&pushed);
    let report = run_batch(&first, &settings, Some(tracker), update_key, move |u: &LevelUpdate| {
        let key = update_key(u);
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(key.clone());
            if key.starts_with("V2") {
                Err(ItemError::Unexpected("location not stocked".to_owned()))
            } else {
                Ok(ItemOutcome::Updated)
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.errored, 1);

    pushed.lock().unwrap().clear();
    let second = vec![level_update("V1", 11, Some(110), 6), level_update("V2", 12, Some(120), 2)];
    let tracker = ProgressTracker::open(&store, "sync-square-test", false).unwrap();
    let log = Arc::clone(&pushed);
    let report = run_batch(&second, &settings, Some(tracker), update_key, move |u: &LevelUpdate| {
        let key = update_key(u);
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(key);
            Ok::<_, ItemError>(ItemOutcome::Updated)
        }
    })
    .await
    .unwrap();

    assert_eq!(*pushed.lock().unwrap(), vec!["V1:6".to_owned(), "V2:2".to_owned()]);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.updated, 2);
}

#[tokio::test]
async fn push_level_looks_up_missing_inventory_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/variants/11.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "variant": {"id": 11, "title": "Small", "inventory_item_id": 110}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/api/2024-01/inventory_levels/set.json"))
        .and(body_partial_json(json!({"location_id": 7, "inventory_item_id": 110, "available": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inventory_level": {"inventory_item_id": 110, "location_id": 7, "available": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = push_level(&shopify_client(&server), 7, &level_update("V1", 11, None, 4))
        .await
        .unwrap();
    assert_eq!(outcome, ItemOutcome::Updated);
}

#[tokio::test]
async fn push_level_rejects_unconfirmed_quantity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/api/2024-01/inventory_levels/set.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inventory_level": {"inventory_item_id": 110, "location_id": 7, "available": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = push_level(&shopify_client(&server), 7, &level_update("V1", 11, Some(110), 4))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ItemError::Verification { ref expected, ref actual } if expected == "4" && actual == "Some(3)"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn push_level_fails_when_variant_has_no_inventory_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/variants/11.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "variant": {"id": 11, "title": "Small"}
        })))
        .mount(&server)
        .await;

    let err = push_level(&shopify_client(&server), 7, &level_update("V1", 11, None, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemError::Unexpected(_)), "got {err:?}");
}
