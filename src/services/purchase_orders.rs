use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Action, Actor, Policy},
    db,
    entities::{
        product_movement::{Direction, MovementType},
        purchase_item::{self, Entity as PurchaseItemEntity},
        purchase_order::{self, Entity as PurchaseOrderEntity},
        PurchaseOrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{line_total, round_money, round_quantity},
};

use super::{
    document_number, ensure_product, ensure_warehouse,
    ledger::{LedgerService, MovementDraft},
    publish, stale_version,
    state_machine::{ensure_transition, ensure_version, TransitionRequest},
    Page,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub supplier_name: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<PurchaseLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurchaseLineRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: purchase_order::Model,
    pub items: Vec<purchase_item::Model>,
}

const REFERENCE_TYPE: &str = "purchase_order";

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
    event_sender: Option<EventSender>,
}

impl PurchaseOrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        policy: Arc<dyn Policy>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            policy,
            event_sender,
        }
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreatePurchaseOrderRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.policy.authorize(actor, Action::PurchaseOrdersCreate)?;
        request.validate()?;

        let mut lines = Vec::with_capacity(request.items.len());
        for (index, line) in request.items.iter().enumerate() {
            let quantity = round_quantity(line.quantity);
            if quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "item {}: quantity must be positive",
                    index + 1
                )));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "item {}: unit price must not be negative",
                    index + 1
                )));
            }
            let unit_price = round_money(line.unit_price);
            lines.push((line, quantity, unit_price, line_total(quantity, unit_price)));
        }
        let total: Decimal = lines.iter().map(|(_, _, _, total)| *total).sum();

        let txn = db::begin(&self.db).await?;
        for (line, ..) in &lines {
            ensure_product(&txn, line.product_id).await?;
            ensure_warehouse(&txn, line.warehouse_id).await?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = purchase_order::ActiveModel {
            id: Set(order_id),
            order_number: Set(document_number("PO", order_id)),
            supplier_name: Set(request.supplier_name.trim().to_string()),
            status: Set(PurchaseOrderStatus::Pending.to_string()),
            total_amount: Set(total),
            notes: Set(request.notes.clone()),
            created_by: Set(actor.user_id),
            approved_by: Set(None),
            approved_at: Set(None),
            received_by: Set(None),
            received_at: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (line, quantity, unit_price, total) in lines {
            let item = purchase_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(order_id),
                product_id: Set(line.product_id),
                warehouse_id: Set(line.warehouse_id),
                quantity: Set(quantity),
                unit_price: Set(unit_price),
                line_total: Set(total),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        db::commit(txn).await?;

        metrics::counter!("stockflow_purchase_orders_created_total", 1);
        info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "purchase order created");
        Ok(PurchaseOrderDetail { order, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
        self.policy.authorize(actor, Action::PurchaseOrdersRead)?;
        let order = PurchaseOrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(id))?;
        let items = load_items(&*self.db, id).await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<PurchaseOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<purchase_order::Model>, ServiceError> {
        self.policy.authorize(actor, Action::PurchaseOrdersRead)?;

        let mut query = PurchaseOrderEntity::find().order_by_desc(purchase_order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status.as_ref()));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok(Page {
            items,
            total,
            page: page.max(1),
            per_page,
        })
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.transition(actor, id, PurchaseOrderStatus::Approved, request)
            .await
    }

    /// Receiving writes one Purchase/In movement per item.
    pub async fn receive(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.transition(actor, id, PurchaseOrderStatus::Received, request)
            .await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.transition(actor, id, PurchaseOrderStatus::Cancelled, request)
            .await
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, target = %target))]
    pub async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        target: PurchaseOrderStatus,
        request: TransitionRequest,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.policy.authorize(actor, required_action(target))?;
        request.validate()?;

        let txn = db::begin(&self.db).await?;
        let order = PurchaseOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(id))?;
        let current = order.status()?;

        ensure_version("purchase order", order.version, request.expected_version)?;
        ensure_transition(current, target)?;

        let now = Utc::now();
        let mut update = PurchaseOrderEntity::update_many()
            .col_expr(purchase_order::Column::Status, Expr::value(target.as_ref()))
            .col_expr(purchase_order::Column::Version, Expr::value(order.version + 1))
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now));
        update = match target {
            PurchaseOrderStatus::Approved => update
                .col_expr(purchase_order::Column::ApprovedBy, Expr::value(actor.user_id))
                .col_expr(purchase_order::Column::ApprovedAt, Expr::value(now)),
            PurchaseOrderStatus::Received => update
                .col_expr(purchase_order::Column::ReceivedBy, Expr::value(actor.user_id))
                .col_expr(purchase_order::Column::ReceivedAt, Expr::value(now)),
            PurchaseOrderStatus::Cancelled => update
                .col_expr(purchase_order::Column::CancelledBy, Expr::value(actor.user_id))
                .col_expr(purchase_order::Column::CancelledAt, Expr::value(now)),
            PurchaseOrderStatus::Pending => update,
        };
        let result = update
            .filter(purchase_order::Column::Id.eq(id))
            .filter(purchase_order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(stale_version("purchase order", id));
        }

        let items = load_items(&txn, id).await?;
        let mut events = Vec::new();
        if target == PurchaseOrderStatus::Received {
            events = receive_items(&txn, &order, &items, actor, request.notes.clone()).await?;
        }

        let order = PurchaseOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(id))?;
        db::commit(txn).await?;

        info!(order_id = %id, from = %current, to = %target, "purchase order transitioned");
        events.push(Event::PurchaseOrderStatusChanged {
            order_id: id,
            old_status: current.to_string(),
            new_status: target.to_string(),
        });
        publish(&self.event_sender, events).await;

        Ok(PurchaseOrderDetail { order, items })
    }
}

async fn receive_items(
    txn: &DatabaseTransaction,
    order: &purchase_order::Model,
    items: &[purchase_item::Model],
    actor: &Actor,
    notes: Option<String>,
) -> Result<Vec<Event>, ServiceError> {
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        let draft = MovementDraft::new(
            item.product_id,
            item.warehouse_id,
            MovementType::Purchase,
            Direction::In,
            item.quantity,
        )
        .reference(REFERENCE_TYPE, order.id)
        .by(actor.user_id)
        .notes(notes.clone());
        let applied = LedgerService::apply_movement(txn, draft).await?;
        events.push(applied.event());
    }
    Ok(events)
}

async fn load_items<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<purchase_item::Model>, ServiceError> {
    Ok(PurchaseItemEntity::find()
        .filter(purchase_item::Column::PurchaseOrderId.eq(order_id))
        .all(conn)
        .await?)
}

fn required_action(target: PurchaseOrderStatus) -> Action {
    match target {
        PurchaseOrderStatus::Approved => Action::PurchaseOrdersApprove,
        PurchaseOrderStatus::Received => Action::PurchaseOrdersReceive,
        PurchaseOrderStatus::Cancelled => Action::PurchaseOrdersCancel,
        // Never a valid target; the create permission gates the attempt.
        PurchaseOrderStatus::Pending => Action::PurchaseOrdersCreate,
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("purchase order {}", id))
}
