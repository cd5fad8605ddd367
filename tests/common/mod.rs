#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::Value;
use stockflow_api::{
    auth::{Actor, USER_ID_HEADER, USER_ROLES_HEADER},
    config::{AppConfig, SalesStockTrigger},
    db,
    entities::{inventory_balance, product_movement, warehouse, Direction},
    events::{Event, EventSender},
    services::{bootstrap, catalog::CreateProductRequest, inventory::AdjustStockRequest},
    AppState,
};
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: Actor,
    events: Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_trigger(SalesStockTrigger::Delivered).await
    }

    pub async fn with_trigger(trigger: SalesStockTrigger) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.sales_stock_trigger = trigger;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        bootstrap::seed(&pool, false)
            .await
            .expect("failed to seed warehouses");

        let (event_tx, event_rx) = mpsc::channel(1024);
        let state = AppState::new(Arc::new(pool), cfg, Some(EventSender::new(event_tx)));
        let router = stockflow_api::app_router(state.clone());

        Self {
            router,
            state,
            admin: Actor::new(Uuid::new_v4(), ["admin"]),
            events: Mutex::new(event_rx),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Looks up a seeded warehouse by code (MAIN, STORE, ONLINE).
    pub async fn warehouse(&self, code: &str) -> Uuid {
        warehouse::Entity::find()
            .filter(warehouse::Column::Code.eq(code))
            .one(self.db())
            .await
            .expect("warehouse query")
            .unwrap_or_else(|| panic!("warehouse {} not seeded", code))
            .id
    }

    pub async fn create_product(&self, sku: &str, price: Decimal) -> Uuid {
        self.state
            .services
            .catalog
            .create_product(
                &self.admin,
                CreateProductRequest {
                    sku: sku.to_string(),
                    name: format!("Test product {}", sku),
                    unit_of_measure: "pcs".to_string(),
                    price,
                },
            )
            .await
            .expect("seed product for tests")
            .id
    }

    /// Puts opening stock on the books through an inbound adjustment.
    pub async fn stock(&self, product_id: Uuid, warehouse_id: Uuid, quantity: Decimal) {
        self.state
            .services
            .inventory
            .adjust(
                &self.admin,
                AdjustStockRequest {
                    product_id,
                    warehouse_id,
                    direction: Direction::In,
                    quantity,
                    notes: Some("opening stock".to_string()),
                },
            )
            .await
            .expect("stock adjustment for tests");
    }

    /// Stored balance for a key; a missing row reads as zero.
    pub async fn balance(&self, product_id: Uuid, warehouse_id: Uuid) -> Decimal {
        inventory_balance::Entity::find()
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
            .one(self.db())
            .await
            .expect("balance query")
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn movement_count(&self) -> u64 {
        product_movement::Entity::find()
            .count(self.db())
            .await
            .expect("movement count")
    }

    pub async fn movements_for(&self, reference_id: Uuid) -> Vec<product_movement::Model> {
        product_movement::Entity::find()
            .filter(product_movement::Column::ReferenceId.eq(reference_id))
            .all(self.db())
            .await
            .expect("movement query")
    }

    /// Everything published since the last drain.
    pub async fn drain_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Sends a request as `actor`, or anonymously when `actor` is `None`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<&Actor>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(actor) = actor {
            builder = builder
                .header(USER_ID_HEADER, actor.user_id.to_string())
                .header(USER_ROLES_HEADER, actor.roles.join(","));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin)).await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
