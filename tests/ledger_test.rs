mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use stockflow_api::{
    auth::Actor,
    entities::{Direction, MovementType},
    errors::ServiceError,
    events::Event,
    services::{
        inventory::{AdjustStockRequest, DefaultLevelsRequest, MovementFilter},
        ledger::{LedgerService, MovementDraft},
    },
};
use uuid::Uuid;

fn adjustment(product_id: Uuid, warehouse_id: Uuid, direction: Direction, quantity: rust_decimal::Decimal) -> AdjustStockRequest {
    AdjustStockRequest {
        product_id,
        warehouse_id,
        direction,
        quantity,
        notes: None,
    }
}

#[tokio::test]
async fn adjustments_move_the_balance_and_append_movements() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-1", dec!(0.25)).await;

    let inventory = &app.state.services.inventory;
    let applied = inventory
        .adjust(&app.admin, adjustment(bolt, main, Direction::In, dec!(10)))
        .await
        .unwrap();
    assert_eq!(applied.balance.quantity, dec!(10));
    assert_eq!(applied.movement.movement_type, "Adjustment");
    assert_eq!(applied.movement.direction, "In");
    assert_eq!(applied.movement.created_by, Some(app.admin.user_id));

    inventory
        .adjust(&app.admin, adjustment(bolt, main, Direction::Out, dec!(4)))
        .await
        .unwrap();

    assert_eq!(app.balance(bolt, main).await, dec!(6));
    assert_eq!(app.movement_count().await, 2);

    let verification = inventory.verify_balance(&app.admin, bolt, main).await.unwrap();
    assert!(verification.consistent);
    assert_eq!(verification.ledger_quantity, dec!(6));
    assert_eq!(verification.movement_count, 2);
}

#[tokio::test]
async fn outbound_beyond_balance_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-2", dec!(0.25)).await;
    app.stock(bolt, main, dec!(3)).await;
    app.drain_events().await;

    let err = app
        .state
        .services
        .inventory
        .adjust(&app.admin, adjustment(bolt, main, Direction::Out, dec!(5)))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.balance(bolt, main).await, dec!(3));
    assert_eq!(app.movement_count().await, 1);
    assert!(app.drain_events().await.is_empty());
}

#[tokio::test]
async fn zero_and_negative_quantities_are_invalid() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-3", dec!(0.25)).await;

    for quantity in [dec!(0), dec!(-2)] {
        let err = app
            .state
            .services
            .inventory
            .adjust(&app.admin, adjustment(bolt, main, Direction::In, quantity))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
    assert_eq!(app.movement_count().await, 0);
}

#[tokio::test]
async fn unknown_product_or_warehouse_is_a_reference_error() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-4", dec!(0.25)).await;
    let inventory = &app.state.services.inventory;

    let err = inventory
        .adjust(&app.admin, adjustment(Uuid::new_v4(), main, Direction::In, dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ReferenceNotFound(_));

    let err = inventory
        .adjust(&app.admin, adjustment(bolt, Uuid::new_v4(), Direction::In, dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ReferenceNotFound(_));
}

#[tokio::test]
async fn recorded_movement_publishes_stock_moved() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-5", dec!(0.25)).await;

    let ledger = LedgerService::new(app.state.db.clone(), app.state.event_sender.clone());
    let reference = Uuid::new_v4();
    let applied = ledger
        .record(
            MovementDraft::new(bolt, main, MovementType::Purchase, Direction::In, dec!(7.5))
                .reference("purchase_order", reference),
        )
        .await
        .unwrap();
    assert_eq!(applied.movement.reference_id, Some(reference));

    let events = app.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0],
        Event::StockMoved { product_id, balance, .. } if *product_id == bolt && *balance == dec!(7.5)
    );
}

#[tokio::test]
async fn movement_history_filters_by_type() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-6", dec!(0.25)).await;
    app.stock(bolt, main, dec!(10)).await;

    let ledger = LedgerService::new(app.state.db.clone(), None);
    ledger
        .record(MovementDraft::new(bolt, main, MovementType::Sale, Direction::Out, dec!(2)))
        .await
        .unwrap();

    let filter = MovementFilter {
        product_id: Some(bolt),
        movement_type: Some(MovementType::Sale),
        ..Default::default()
    };
    let page = app
        .state
        .services
        .inventory
        .movements(&app.admin, filter, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].movement_type, "Sale");
}

#[tokio::test]
async fn default_levels_fill_only_unset_thresholds() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-7", dec!(0.25)).await;
    let plate = app.create_product("PLATE-7", dec!(12.5)).await;
    app.stock(bolt, main, dec!(2)).await;
    app.stock(plate, main, dec!(50)).await;

    let inventory = &app.state.services.inventory;
    let updated = inventory
        .set_default_minimum_levels(
            &app.admin,
            DefaultLevelsRequest {
                minimum: dec!(5),
                maximum: Some(dec!(100)),
                overwrite: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let again = inventory
        .set_default_minimum_levels(
            &app.admin,
            DefaultLevelsRequest {
                minimum: dec!(1),
                maximum: None,
                overwrite: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(again, 0);

    let low = inventory.low_stock(&app.admin, Some(main)).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].product_id, bolt);
    assert_eq!(app.balance(bolt, main).await, dec!(2));
}

#[tokio::test]
async fn inverted_default_levels_are_rejected() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .inventory
        .set_default_minimum_levels(
            &app.admin,
            DefaultLevelsRequest {
                minimum: dec!(10),
                maximum: Some(dec!(5)),
                overwrite: true,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn viewers_cannot_adjust_stock() {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let bolt = app.create_product("BOLT-8", dec!(0.25)).await;
    let viewer = Actor::new(Uuid::new_v4(), ["viewer"]);

    let err = app
        .state
        .services
        .inventory
        .adjust(&viewer, adjustment(bolt, main, Direction::In, dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
    assert_eq!(app.movement_count().await, 0);
}
