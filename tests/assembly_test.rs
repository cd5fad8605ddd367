mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockflow_api::{
    entities::AssemblyStatus,
    errors::ServiceError,
    events::Event,
    services::{
        assemblies::{CreateAssemblyRequest, MaterialLineRequest},
        state_machine::TransitionRequest,
    },
};
use uuid::Uuid;

struct Fixture {
    app: TestApp,
    main: Uuid,
    raw_a: Uuid,
    raw_b: Uuid,
    output: Uuid,
}

/// RawA=10 and RawB=3 at MAIN.
async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let main = app.warehouse("MAIN").await;
    let raw_a = app.create_product("RAW-A", dec!(1)).await;
    let raw_b = app.create_product("RAW-B", dec!(2)).await;
    let output = app.create_product("WIDGET", dec!(20)).await;
    app.stock(raw_a, main, dec!(10)).await;
    app.stock(raw_b, main, dec!(3)).await;
    Fixture {
        app,
        main,
        raw_a,
        raw_b,
        output,
    }
}

impl Fixture {
    /// Consumes RawA×5 and RawB×3, produces one output unit.
    async fn create_assembly(&self) -> Uuid {
        self.app
            .state
            .services
            .assemblies
            .create(
                &self.app.admin,
                CreateAssemblyRequest {
                    product_id: self.output,
                    warehouse_id: self.main,
                    quantity: dec!(1),
                    notes: None,
                    materials: vec![
                        MaterialLineRequest {
                            raw_product_id: self.raw_a,
                            warehouse_id: self.main,
                            required_quantity: dec!(5),
                        },
                        MaterialLineRequest {
                            raw_product_id: self.raw_b,
                            warehouse_id: self.main,
                            required_quantity: dec!(3),
                        },
                    ],
                },
            )
            .await
            .expect("create assembly")
            .assembly
            .id
    }

    async fn started_assembly(&self) -> Uuid {
        let id = self.create_assembly().await;
        self.app
            .state
            .services
            .assemblies
            .start(&self.app.admin, id, TransitionRequest::default())
            .await
            .expect("start assembly");
        id
    }

    async fn balances(&self) -> (Decimal, Decimal, Decimal) {
        (
            self.app.balance(self.raw_a, self.main).await,
            self.app.balance(self.raw_b, self.main).await,
            self.app.balance(self.output, self.main).await,
        )
    }
}

#[tokio::test]
async fn create_snapshots_available_quantities() {
    let f = fixture().await;
    let id = f.create_assembly().await;
    let detail = f.app.state.services.assemblies.get(&f.app.admin, id).await.unwrap();

    assert_eq!(detail.assembly.status().unwrap(), AssemblyStatus::Pending);
    assert!(detail.assembly.assembly_number.starts_with("ASM-"));
    let a = detail.materials.iter().find(|m| m.raw_product_id == f.raw_a).unwrap();
    assert_eq!(a.available_quantity, dec!(10));
    assert_eq!(f.app.movement_count().await, 2);
}

#[tokio::test]
async fn validate_reports_shortfalls_without_mutating() {
    let f = fixture().await;
    let id = f.create_assembly().await;
    let service = &f.app.state.services.assemblies;

    let ok = service.validate(&f.app.admin, id).await.unwrap();
    assert!(ok.sufficient);
    assert_eq!(ok.short_lines().count(), 0);

    f.app
        .state
        .services
        .inventory
        .adjust(
            &f.app.admin,
            stockflow_api::services::inventory::AdjustStockRequest {
                product_id: f.raw_b,
                warehouse_id: f.main,
                direction: stockflow_api::entities::Direction::Out,
                quantity: dec!(2),
                notes: None,
            },
        )
        .await
        .unwrap();

    let first = service.validate(&f.app.admin, id).await.unwrap();
    let second = service.validate(&f.app.admin, id).await.unwrap();
    assert_eq!(first, second);
    assert!(!first.sufficient);
    let short: Vec<_> = first.short_lines().collect();
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].raw_product_id, f.raw_b);
    assert_eq!(short[0].shortfall, dec!(2));

    let detail = service.get(&f.app.admin, id).await.unwrap();
    assert_eq!(detail.assembly.status().unwrap(), AssemblyStatus::Pending);
}

#[tokio::test]
async fn completion_consumes_materials_and_credits_output() {
    let f = fixture().await;
    let id = f.started_assembly().await;
    f.app.drain_events().await;

    let detail = f
        .app
        .state
        .services
        .assemblies
        .complete(&f.app.admin, id, TransitionRequest::default())
        .await
        .unwrap();

    assert_eq!(detail.assembly.status().unwrap(), AssemblyStatus::Completed);
    assert_eq!(detail.assembly.completed_by, Some(f.app.admin.user_id));
    assert_eq!(f.balances().await, (dec!(5), dec!(0), dec!(1)));

    let movements = f.app.movements_for(id).await;
    assert_eq!(movements.len(), 3);
    assert_eq!(movements.iter().filter(|m| m.direction == "Out").count(), 2);
    assert!(movements.iter().all(|m| m.movement_type == "Assembly"));

    let b = detail.materials.iter().find(|m| m.raw_product_id == f.raw_b).unwrap();
    assert_eq!(b.available_quantity, dec!(0));

    let events = f.app.drain_events().await;
    assert_matches!(
        events.last(),
        Some(Event::AssemblyCompleted { assembly_id, .. }) if *assembly_id == id
    );
}

#[tokio::test]
async fn second_completion_fails_once_materials_are_gone() {
    let f = fixture().await;
    let first = f.started_assembly().await;
    let second = f.started_assembly().await;
    let service = &f.app.state.services.assemblies;

    service
        .complete(&f.app.admin, first, TransitionRequest::default())
        .await
        .unwrap();
    let before = f.balances().await;

    let err = service
        .complete(&f.app.admin, second, TransitionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientMaterials(_));

    assert_eq!(f.balances().await, before);
    assert!(f.app.movements_for(second).await.is_empty());
    let detail = service.get(&f.app.admin, second).await.unwrap();
    assert_eq!(detail.assembly.status().unwrap(), AssemblyStatus::InProgress);
}

#[tokio::test]
async fn start_is_refused_when_short() {
    let f = fixture().await;
    let first = f.started_assembly().await;
    f.app
        .state
        .services
        .assemblies
        .complete(&f.app.admin, first, TransitionRequest::default())
        .await
        .unwrap();

    let id = f.create_assembly().await;
    let err = f
        .app
        .state
        .services
        .assemblies
        .start(&f.app.admin, id, TransitionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientMaterials(_));
}

/// The SQLite pool holds one connection, so the two completions serialize;
/// the lost-update path itself is covered next to the balance write.
#[tokio::test]
async fn competing_completions_never_both_succeed() {
    let f = fixture().await;
    let first = f.started_assembly().await;
    let second = f.started_assembly().await;
    let service = f.app.state.services.assemblies.clone();
    let admin = f.app.admin.clone();

    let (a, b) = tokio::join!(
        service.complete(&admin, first, TransitionRequest::default()),
        service.complete(&admin, second, TransitionRequest::default()),
    );

    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert_matches!(
                err,
                ServiceError::InsufficientMaterials(_)
                    | ServiceError::InsufficientStock(_)
                    | ServiceError::StateConflict(_)
            );
        }
    }
    assert_eq!(f.balances().await, (dec!(5), dec!(0), dec!(1)));
}

#[tokio::test]
async fn cancel_from_in_progress_moves_nothing() {
    let f = fixture().await;
    let id = f.started_assembly().await;
    let before = f.app.movement_count().await;

    let detail = f
        .app
        .state
        .services
        .assemblies
        .cancel(&f.app.admin, id, TransitionRequest::with_notes(Some("line stopped".into())))
        .await
        .unwrap();
    assert_eq!(detail.assembly.status().unwrap(), AssemblyStatus::Cancelled);
    assert_eq!(f.app.movement_count().await, before);

    let err = f
        .app
        .state
        .services
        .assemblies
        .complete(&f.app.admin, id, TransitionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
}

#[tokio::test]
async fn completing_a_pending_assembly_is_invalid() {
    let f = fixture().await;
    let id = f.create_assembly().await;
    let err = f
        .app
        .state
        .services
        .assemblies
        .complete(&f.app.admin, id, TransitionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
    assert_eq!(f.balances().await, (dec!(10), dec!(3), dec!(0)));
}

#[tokio::test]
async fn stale_version_on_complete_is_a_conflict() {
    let f = fixture().await;
    let id = f.started_assembly().await;
    let err = f
        .app
        .state
        .services
        .assemblies
        .complete(
            &f.app.admin,
            id,
            TransitionRequest {
                notes: None,
                expected_version: Some(1),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
    assert_eq!(f.balances().await, (dec!(10), dec!(3), dec!(0)));
}
