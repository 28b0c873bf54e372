//! Unit Availability Integration Tests
//!
//! Run with: ./scripts/integ-tests.sh -p stock-service

mod common;

use common::{create_test_product, test_db, unique_serial};
use stock_service::models::{CreateProductUnit, LinkKind, UnitStatus};
use stock_service::services::{availability, ledger};
use uuid::Uuid;

/// Only unlinked units in an allowed status are offered; a unit already
/// claimed by some line is not, even when its status matches.
#[tokio::test]
#[ignore]
async fn lists_unlinked_units_matching_status() {
    let db = test_db().await;
    let product = create_test_product(&db, true).await;
    let actor = Uuid::new_v4();
    let free_a = unique_serial();
    let free_b = unique_serial();
    let claimed = unique_serial();

    for serial in [&free_a, &free_b, &claimed] {
        db.create_unit(&CreateProductUnit {
            product_id: product.product_id,
            serial_number: serial.clone(),
            created_by: actor,
        })
        .await
        .expect("Failed to create unit");
    }

    // Claimed by a purchase line but still in stock.
    let mut conn = db.pool().acquire().await.expect("Failed to acquire");
    ledger::transition_unit(
        &mut *conn,
        product.product_id,
        &claimed,
        UnitStatus::InStock,
        LinkKind::Purchase,
        Uuid::new_v4(),
        actor,
    )
    .await
    .expect("Transition should succeed");
    drop(conn);

    let available = availability::available_units(
        db.pool(),
        product.product_id,
        &[UnitStatus::InStock],
        None,
    )
    .await
    .expect("Failed to resolve availability");

    let mut serials: Vec<String> = available.iter().map(|u| u.serial_number.clone()).collect();
    serials.sort();
    let mut expected = vec![free_a, free_b];
    expected.sort();
    assert_eq!(serials, expected);
}

/// A sold unit linked to a line stays selectable when re-editing that line,
/// and only that line.
#[tokio::test]
#[ignore]
async fn linked_unit_visible_only_when_editing_its_line() {
    let db = test_db().await;
    let product = create_test_product(&db, true).await;
    let actor = Uuid::new_v4();
    let serial = unique_serial();
    let line_id = Uuid::new_v4();

    db.create_unit(&CreateProductUnit {
        product_id: product.product_id,
        serial_number: serial.clone(),
        created_by: actor,
    })
    .await
    .expect("Failed to create unit");

    let mut conn = db.pool().acquire().await.expect("Failed to acquire");
    ledger::transition_unit(
        &mut *conn,
        product.product_id,
        &serial,
        UnitStatus::Sold,
        LinkKind::Sale,
        line_id,
        actor,
    )
    .await
    .expect("Transition should succeed");
    drop(conn);

    let editing = availability::available_units(
        db.pool(),
        product.product_id,
        &[UnitStatus::InStock],
        Some(line_id),
    )
    .await
    .expect("Failed to resolve availability");
    assert!(editing.iter().any(|u| u.serial_number == serial));
    let shown = editing
        .iter()
        .find(|u| u.serial_number == serial)
        .expect("Unit should be shown");
    assert_eq!(shown.parsed_status(), Some(UnitStatus::Sold));

    let fresh = availability::available_units(
        db.pool(),
        product.product_id,
        &[UnitStatus::InStock],
        None,
    )
    .await
    .expect("Failed to resolve availability");
    assert!(!fresh.iter().any(|u| u.serial_number == serial));

    let other_line = availability::available_units(
        db.pool(),
        product.product_id,
        &[UnitStatus::InStock],
        Some(Uuid::new_v4()),
    )
    .await
    .expect("Failed to resolve availability");
    assert!(!other_line.iter().any(|u| u.serial_number == serial));
}

/// With no allowed statuses, only the current line's own units come back.
#[tokio::test]
#[ignore]
async fn empty_status_list_returns_only_current_line_units() {
    let db = test_db().await;
    let product = create_test_product(&db, true).await;
    let actor = Uuid::new_v4();
    let free = unique_serial();
    let linked = unique_serial();
    let line_id = Uuid::new_v4();

    for serial in [&free, &linked] {
        db.create_unit(&CreateProductUnit {
            product_id: product.product_id,
            serial_number: serial.clone(),
            created_by: actor,
        })
        .await
        .expect("Failed to create unit");
    }

    let mut conn = db.pool().acquire().await.expect("Failed to acquire");
    ledger::transition_unit(
        &mut *conn,
        product.product_id,
        &linked,
        UnitStatus::Sold,
        LinkKind::Sale,
        line_id,
        actor,
    )
    .await
    .expect("Transition should succeed");
    drop(conn);

    let available =
        availability::available_units(db.pool(), product.product_id, &[], Some(line_id))
            .await
            .expect("Failed to resolve availability");

    assert_eq!(available.len(), 1);
    assert_eq!(available[0].serial_number, linked);
}
