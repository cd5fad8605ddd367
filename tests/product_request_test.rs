mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use stockflow_api::{
    entities::ProductRequestStatus,
    errors::ServiceError,
    events::Event,
    services::product_requests::{
        ApproveRequest, CreateProductRequestRequest, LineApproval, ProductRequestDetail,
        RejectRequest, RequestLineRequest,
    },
};
use uuid::Uuid;

struct Fixture {
    app: TestApp,
    main: Uuid,
    store: Uuid,
    cable: Uuid,
    plug: Uuid,
}

/// MAIN holds 10 cables and 2 plugs; STORE holds nothing.
async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let store = app.warehouse("STORE").await;
    let cable = app.create_product("CABLE-1M", dec!(3.5)).await;
    let plug = app.create_product("PLUG-EU", dec!(1.25)).await;
    app.stock(cable, main, dec!(10)).await;
    app.stock(plug, main, dec!(2)).await;
    Fixture {
        app,
        main,
        store,
        cable,
        plug,
    }
}

impl Fixture {
    /// Requests 6 cables and 5 plugs from MAIN to STORE.
    async fn create_request(&self) -> ProductRequestDetail {
        self.app
            .state
            .services
            .product_requests
            .create(
                &self.app.admin,
                CreateProductRequestRequest {
                    source_warehouse_id: self.main,
                    destination_warehouse_id: self.store,
                    notes: Some("weekend restock".into()),
                    items: vec![
                        RequestLineRequest {
                            product_id: self.cable,
                            quantity_requested: dec!(6),
                        },
                        RequestLineRequest {
                            product_id: self.plug,
                            quantity_requested: dec!(5),
                        },
                    ],
                },
            )
            .await
            .expect("create product request")
    }

    fn item_for(detail: &ProductRequestDetail, product_id: Uuid) -> Uuid {
        detail
            .items
            .iter()
            .find(|i| i.product_id == product_id)
            .expect("request item")
            .id
    }

    async fn approve(
        &self,
        id: Uuid,
        lines: Vec<LineApproval>,
    ) -> Result<ProductRequestDetail, ServiceError> {
        self.app
            .state
            .services
            .product_requests
            .approve(
                &self.app.admin,
                id,
                ApproveRequest {
                    lines,
                    expected_version: None,
                },
            )
            .await
    }
}

#[tokio::test]
async fn approval_transfers_each_approved_line() {
    let f = fixture().await;
    let created = f.create_request().await;
    let id = created.request.id;
    f.app.drain_events().await;

    let detail = f
        .approve(
            id,
            vec![
                LineApproval {
                    item_id: Fixture::item_for(&created, f.cable),
                    quantity_approved: dec!(4),
                },
                LineApproval {
                    item_id: Fixture::item_for(&created, f.plug),
                    quantity_approved: dec!(0),
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(detail.request.status().unwrap(), ProductRequestStatus::Approved);
    assert_eq!(detail.request.approved_by, Some(f.app.admin.user_id));
    assert_eq!(f.app.balance(f.cable, f.main).await, dec!(6));
    assert_eq!(f.app.balance(f.cable, f.store).await, dec!(4));
    assert_eq!(f.app.balance(f.plug, f.main).await, dec!(2));

    let cable = detail.items.iter().find(|i| i.product_id == f.cable).unwrap();
    assert_eq!(cable.quantity_requested, dec!(6));
    assert_eq!(cable.quantity_approved, Some(dec!(4)));
    let plug = detail.items.iter().find(|i| i.product_id == f.plug).unwrap();
    assert_eq!(plug.quantity_approved, Some(dec!(0)));

    let movements = f.app.movements_for(id).await;
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| m.movement_type == "Transfer"));
    let out = movements.iter().find(|m| m.direction == "Out").unwrap();
    assert_eq!(out.warehouse_id, f.main);
    let inbound = movements.iter().find(|m| m.direction == "In").unwrap();
    assert_eq!(inbound.warehouse_id, f.store);

    let events = f.app.drain_events().await;
    assert_matches!(
        events.last(),
        Some(Event::TransferApproved { request_id, lines, .. }) if *request_id == id && *lines == 1
    );
}

#[tokio::test]
async fn bare_approval_transfers_everything_requested() {
    let f = fixture().await;
    f.app.stock(f.plug, f.main, dec!(3)).await;
    let id = f.create_request().await.request.id;
    f.app.drain_events().await;

    let detail = f.approve(id, Vec::new()).await.unwrap();

    assert_eq!(detail.request.status().unwrap(), ProductRequestStatus::Approved);
    assert!(detail
        .items
        .iter()
        .all(|i| i.quantity_approved == Some(i.quantity_requested)));
    assert_eq!(f.app.balance(f.cable, f.main).await, dec!(4));
    assert_eq!(f.app.balance(f.cable, f.store).await, dec!(6));
    assert_eq!(f.app.balance(f.plug, f.main).await, dec!(0));
    assert_eq!(f.app.balance(f.plug, f.store).await, dec!(5));
    assert_eq!(f.app.movements_for(id).await.len(), 4);

    let events = f.app.drain_events().await;
    assert_matches!(
        events.last(),
        Some(Event::TransferApproved { lines, .. }) if *lines == 2
    );
}

#[tokio::test]
async fn bare_approval_beyond_source_stock_moves_nothing() {
    let f = fixture().await;
    let id = f.create_request().await.request.id;

    let err = f.approve(id, Vec::new()).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(f.app.balance(f.cable, f.main).await, dec!(10));
    assert!(f.app.movements_for(id).await.is_empty());
}

#[tokio::test]
async fn insufficient_source_stock_rolls_back_every_line() {
    let f = fixture().await;
    let created = f.create_request().await;
    let id = created.request.id;

    let err = f
        .approve(
            id,
            vec![
                LineApproval {
                    item_id: Fixture::item_for(&created, f.cable),
                    quantity_approved: dec!(6),
                },
                LineApproval {
                    item_id: Fixture::item_for(&created, f.plug),
                    quantity_approved: dec!(5),
                },
            ],
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert_eq!(f.app.balance(f.cable, f.main).await, dec!(10));
    assert_eq!(f.app.balance(f.cable, f.store).await, dec!(0));
    assert!(f.app.movements_for(id).await.is_empty());

    let detail = f
        .app
        .state
        .services
        .product_requests
        .get(&f.app.admin, id)
        .await
        .unwrap();
    assert_eq!(detail.request.status().unwrap(), ProductRequestStatus::Pending);
    assert!(detail.items.iter().all(|i| i.quantity_approved.is_none()));
}

#[tokio::test]
async fn approving_more_than_requested_is_invalid() {
    let f = fixture().await;
    let created = f.create_request().await;

    let err = f
        .approve(
            created.request.id,
            vec![LineApproval {
                item_id: Fixture::item_for(&created, f.cable),
                quantity_approved: dec!(7),
            }],
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = f
        .approve(
            created.request.id,
            vec![LineApproval {
                item_id: Uuid::new_v4(),
                quantity_approved: dec!(1),
            }],
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn rejection_records_the_reason_and_is_final() {
    let f = fixture().await;
    let id = f.create_request().await.request.id;
    let service = &f.app.state.services.product_requests;

    let err = service
        .reject(
            &f.app.admin,
            id,
            RejectRequest {
                reason: "   ".into(),
                expected_version: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let detail = service
        .reject(
            &f.app.admin,
            id,
            RejectRequest {
                reason: "store is closing".into(),
                expected_version: Some(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(detail.request.status().unwrap(), ProductRequestStatus::Rejected);
    assert_eq!(detail.request.rejection_reason.as_deref(), Some("store is closing"));
    assert_eq!(detail.request.rejected_by, Some(f.app.admin.user_id));

    let err = f.approve(id, Vec::new()).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
    assert!(f.app.movements_for(id).await.is_empty());
}

#[tokio::test]
async fn approved_requests_cannot_be_rejected() {
    let f = fixture().await;
    f.app.stock(f.plug, f.main, dec!(3)).await;
    let id = f.create_request().await.request.id;
    f.approve(id, Vec::new()).await.unwrap();

    let err = f
        .app
        .state
        .services
        .product_requests
        .reject(
            &f.app.admin,
            id,
            RejectRequest {
                reason: "too late".into(),
                expected_version: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
}

#[tokio::test]
async fn completion_follows_approval_without_moving_stock() {
    let f = fixture().await;
    let created = f.create_request().await;
    let id = created.request.id;
    let service = &f.app.state.services.product_requests;

    let err = service.complete(&f.app.admin, id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));

    f.approve(
        id,
        vec![LineApproval {
            item_id: Fixture::item_for(&created, f.plug),
            quantity_approved: dec!(2),
        }],
    )
    .await
    .unwrap();
    let movements = f.app.movement_count().await;

    let detail = service.complete(&f.app.admin, id, Some(2)).await.unwrap();
    assert_eq!(detail.request.status().unwrap(), ProductRequestStatus::Completed);
    assert_eq!(detail.request.completed_by, Some(f.app.admin.user_id));
    assert_eq!(f.app.movement_count().await, movements);
    assert_eq!(f.app.balance(f.plug, f.store).await, dec!(2));
}

#[tokio::test]
async fn same_source_and_destination_is_rejected() {
    let f = fixture().await;
    let err = f
        .app
        .state
        .services
        .product_requests
        .create(
            &f.app.admin,
            CreateProductRequestRequest {
                source_warehouse_id: f.main,
                destination_warehouse_id: f.main,
                notes: None,
                items: vec![RequestLineRequest {
                    product_id: f.cable,
                    quantity_requested: dec!(1),
                }],
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
