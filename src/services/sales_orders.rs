use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Action, Actor, Policy},
    config::SalesStockTrigger,
    db,
    entities::{
        order_tracking::{self, Entity as OrderTrackingEntity},
        product_movement::{Direction, MovementType},
        sales_item::{self, Entity as SalesItemEntity},
        sales_order::{self, Entity as SalesOrderEntity},
        SalesOrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{line_total, round_money, round_quantity},
};

use super::{
    document_number, ensure_product, ensure_warehouse,
    ledger::{balance_quantity, LedgerService, MovementDraft},
    publish, stale_version,
    state_machine::{ensure_transition, ensure_version, TransitionRequest},
    Page,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSalesOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub customer_name: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<SalesLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SalesLineRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesOrderDetail {
    #[serde(flatten)]
    pub order: sales_order::Model,
    pub items: Vec<sales_item::Model>,
}

const REFERENCE_TYPE: &str = "sales_order";

#[derive(Clone)]
pub struct SalesOrderService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
    event_sender: Option<EventSender>,
    stock_trigger: SalesStockTrigger,
}

impl SalesOrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        policy: Arc<dyn Policy>,
        event_sender: Option<EventSender>,
        stock_trigger: SalesStockTrigger,
    ) -> Self {
        Self {
            db,
            policy,
            event_sender,
            stock_trigger,
        }
    }

    /// Status at which Sale/Out movements are written.
    pub fn stock_trigger_status(&self) -> SalesOrderStatus {
        match self.stock_trigger {
            SalesStockTrigger::Delivered => SalesOrderStatus::Delivered,
            SalesStockTrigger::Shipped => SalesOrderStatus::Shipped,
        }
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateSalesOrderRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.policy.authorize(actor, Action::SalesOrdersCreate)?;
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
        let order = sales_order::ActiveModel {
            id: Set(order_id),
            order_number: Set(document_number("SO", order_id)),
            customer_name: Set(request.customer_name.trim().to_string()),
            status: Set(SalesOrderStatus::Pending.to_string()),
            total_amount: Set(total),
            notes: Set(request.notes.clone()),
            created_by: Set(actor.user_id),
            confirmed_by: Set(None),
            confirmed_at: Set(None),
            shipped_at: Set(None),
            delivered_at: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            stock_applied: Set(false),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (line, quantity, unit_price, total) in lines {
            let item = sales_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sales_order_id: Set(order_id),
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

        append_tracking(&txn, order_id, None, SalesOrderStatus::Pending, actor, request.notes.clone())
            .await?;
        db::commit(txn).await?;

        metrics::counter!("stockflow_sales_orders_created_total", 1);
        info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "sales order created");
        Ok(SalesOrderDetail { order, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<SalesOrderDetail, ServiceError> {
        self.policy.authorize(actor, Action::SalesOrdersRead)?;
        let order = SalesOrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(id))?;
        let items = load_items(&*self.db, id).await?;
        Ok(SalesOrderDetail { order, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<SalesOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<sales_order::Model>, ServiceError> {
        self.policy.authorize(actor, Action::SalesOrdersRead)?;

        let mut query = SalesOrderEntity::find().order_by_desc(sales_order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(sales_order::Column::Status.eq(status.as_ref()));
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

    /// Audit trail of an order, oldest first.
    #[instrument(skip(self, actor))]
    pub async fn tracking(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<order_tracking::Model>, ServiceError> {
        self.policy.authorize(actor, Action::SalesOrdersRead)?;
        SalesOrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(id))?;

        Ok(OrderTrackingEntity::find()
            .filter(order_tracking::Column::SalesOrderId.eq(id))
            .order_by_asc(order_tracking::Column::Sequence)
            .all(&*self.db)
            .await?)
    }

    /// Confirms after checking every line against current stock. Nothing is reserved.
    pub async fn confirm(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.transition(actor, id, SalesOrderStatus::Confirmed, request)
            .await
    }

    pub async fn ship(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.transition(actor, id, SalesOrderStatus::Shipped, request)
            .await
    }

    pub async fn deliver(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.transition(actor, id, SalesOrderStatus::Delivered, request)
            .await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.transition(actor, id, SalesOrderStatus::Cancelled, request)
            .await
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, target = %target))]
    pub async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        target: SalesOrderStatus,
        request: TransitionRequest,
    ) -> Result<SalesOrderDetail, ServiceError> {
        self.policy.authorize(actor, required_action(target))?;
        request.validate()?;

        let txn = db::begin(&self.db).await?;
        let order = SalesOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(id))?;
        let current = order.status()?;

        ensure_version("sales order", order.version, request.expected_version)?;
        ensure_transition(current, target)?;

        let items = load_items(&txn, id).await?;
        if target == SalesOrderStatus::Confirmed {
            check_availability(&txn, &items).await?;
        }
        let consumes_stock = target == self.stock_trigger_status() && !order.stock_applied;

        let now = Utc::now();
        let mut update = SalesOrderEntity::update_many()
            .col_expr(sales_order::Column::Status, Expr::value(target.as_ref()))
            .col_expr(sales_order::Column::Version, Expr::value(order.version + 1))
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(now));
        update = match target {
            SalesOrderStatus::Confirmed => update
                .col_expr(sales_order::Column::ConfirmedBy, Expr::value(actor.user_id))
                .col_expr(sales_order::Column::ConfirmedAt, Expr::value(now)),
            SalesOrderStatus::Shipped => {
                update.col_expr(sales_order::Column::ShippedAt, Expr::value(now))
            }
            SalesOrderStatus::Delivered => {
                update.col_expr(sales_order::Column::DeliveredAt, Expr::value(now))
            }
            SalesOrderStatus::Cancelled => update
                .col_expr(sales_order::Column::CancelledBy, Expr::value(actor.user_id))
                .col_expr(sales_order::Column::CancelledAt, Expr::value(now)),
            SalesOrderStatus::Pending => update,
        };
        if consumes_stock {
            update = update.col_expr(sales_order::Column::StockApplied, Expr::value(true));
        }
        let result = update
            .filter(sales_order::Column::Id.eq(id))
            .filter(sales_order::Column::Version.eq(order.version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(stale_version("sales order", id));
        }

        let mut events = Vec::new();
        if consumes_stock {
            for item in &items {
                let draft = MovementDraft::new(
                    item.product_id,
                    item.warehouse_id,
                    MovementType::Sale,
                    Direction::Out,
                    item.quantity,
                )
                .reference(REFERENCE_TYPE, id)
                .by(actor.user_id)
                .notes(request.notes.clone());
                let applied = LedgerService::apply_movement(&txn, draft).await?;
                events.push(applied.event());
            }
        }

        append_tracking(&txn, id, Some(current), target, actor, request.notes.clone()).await?;

        let order = SalesOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(id))?;
        db::commit(txn).await?;

        info!(order_id = %id, from = %current, to = %target, stock_applied = consumes_stock, "sales order transitioned");
        events.push(Event::SalesOrderStatusChanged {
            order_id: id,
            old_status: current.to_string(),
            new_status: target.to_string(),
        });
        publish(&self.event_sender, events).await;

        Ok(SalesOrderDetail { order, items })
    }
}

/// Read-only check that every (product, warehouse) key can cover the order.
async fn check_availability(
    txn: &DatabaseTransaction,
    items: &[sales_item::Model],
) -> Result<(), ServiceError> {
    let mut needed: HashMap<(Uuid, Uuid), Decimal> = HashMap::new();
    for item in items {
        *needed
            .entry((item.product_id, item.warehouse_id))
            .or_insert(Decimal::ZERO) += item.quantity;
    }

    let mut shortages = Vec::new();
    for ((product_id, warehouse_id), required) in needed {
        let available = balance_quantity(txn, product_id, warehouse_id).await?;
        if available < required {
            shortages.push(format!(
                "product {} at warehouse {}: available {}, required {}",
                product_id, warehouse_id, available, required
            ));
        }
    }

    if shortages.is_empty() {
        Ok(())
    } else {
        metrics::counter!("stockflow_insufficient_stock_total", 1);
        warn!(shortages = shortages.len(), "sales order cannot be confirmed");
        shortages.sort();
        Err(ServiceError::InsufficientStock(shortages.join("; ")))
    }
}

async fn append_tracking(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    from: Option<SalesOrderStatus>,
    to: SalesOrderStatus,
    actor: &Actor,
    notes: Option<String>,
) -> Result<order_tracking::Model, ServiceError> {
    let previous = OrderTrackingEntity::find()
        .filter(order_tracking::Column::SalesOrderId.eq(order_id))
        .count(txn)
        .await?;

    Ok(order_tracking::ActiveModel {
        id: Set(Uuid::new_v4()),
        sales_order_id: Set(order_id),
        from_status: Set(from.map(|s| s.to_string())),
        status: Set(to.to_string()),
        actor_id: Set(actor.user_id),
        notes: Set(notes),
        sequence: Set(previous as i32 + 1),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await?)
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<sales_item::Model>, ServiceError> {
    Ok(SalesItemEntity::find()
        .filter(sales_item::Column::SalesOrderId.eq(order_id))
        .all(conn)
        .await?)
}

fn required_action(target: SalesOrderStatus) -> Action {
    match target {
        SalesOrderStatus::Confirmed => Action::SalesOrdersConfirm,
        SalesOrderStatus::Shipped => Action::SalesOrdersShip,
        SalesOrderStatus::Delivered => Action::SalesOrdersDeliver,
        SalesOrderStatus::Cancelled => Action::SalesOrdersCancel,
        // Never a valid target; the create permission gates the attempt.
        SalesOrderStatus::Pending => Action::SalesOrdersCreate,
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("sales order {}", id))
}
