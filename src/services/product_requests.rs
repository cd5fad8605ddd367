use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    UpdateMany,
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
        product_request::{self, Entity as ProductRequestEntity},
        product_request_item::{self, Entity as ProductRequestItemEntity},
        ProductRequestStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::round_quantity,
};

use super::{
    document_number, ensure_product, ensure_warehouse,
    ledger::{LedgerService, MovementDraft},
    publish, stale_version,
    state_machine::{ensure_transition, ensure_version},
    Page,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequestRequest {
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<RequestLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestLineRequest {
    pub product_id: Uuid,
    pub quantity_requested: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineApproval {
    pub item_id: Uuid,
    pub quantity_approved: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveRequest {
    /// Lines left out are approved at their requested quantity.
    #[serde(default)]
    pub lines: Vec<LineApproval>,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 1000, message = "a rejection reason is required"))]
    pub reason: String,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRequestDetail {
    #[serde(flatten)]
    pub request: product_request::Model,
    pub items: Vec<product_request_item::Model>,
}

const REFERENCE_TYPE: &str = "product_request";

#[derive(Clone)]
pub struct ProductRequestService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
    event_sender: Option<EventSender>,
}

impl ProductRequestService {
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
        request: CreateProductRequestRequest,
    ) -> Result<ProductRequestDetail, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsCreate)?;
        request.validate()?;

        if request.source_warehouse_id == request.destination_warehouse_id {
            return Err(ServiceError::ValidationError(
                "source and destination warehouses must differ".to_string(),
            ));
        }
        for (index, line) in request.items.iter().enumerate() {
            if round_quantity(line.quantity_requested) <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "item {}: requested quantity must be positive",
                    index + 1
                )));
            }
        }

        let txn = db::begin(&self.db).await?;
        ensure_warehouse(&txn, request.source_warehouse_id).await?;
        ensure_warehouse(&txn, request.destination_warehouse_id).await?;

        let now = Utc::now();
        let request_id = Uuid::new_v4();
        let header = product_request::ActiveModel {
            id: Set(request_id),
            request_number: Set(document_number("PR", request_id)),
            source_warehouse_id: Set(request.source_warehouse_id),
            destination_warehouse_id: Set(request.destination_warehouse_id),
            status: Set(ProductRequestStatus::Pending.to_string()),
            notes: Set(request.notes.clone()),
            requested_by: Set(actor.user_id),
            approved_by: Set(None),
            approved_at: Set(None),
            rejected_by: Set(None),
            rejected_at: Set(None),
            rejection_reason: Set(None),
            completed_by: Set(None),
            completed_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            ensure_product(&txn, line.product_id).await?;
            let item = product_request_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                request_id: Set(request_id),
                product_id: Set(line.product_id),
                quantity_requested: Set(round_quantity(line.quantity_requested)),
                quantity_approved: Set(None),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        db::commit(txn).await?;

        info!(request_id = %header.id, lines = items.len(), "product request created");
        Ok(ProductRequestDetail {
            request: header,
            items,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ProductRequestDetail, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsRead)?;
        let request = find_request(&*self.db, id).await?;
        let items = load_items(&*self.db, id).await?;
        Ok(ProductRequestDetail { request, items })
    }

    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<ProductRequestStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<product_request::Model>, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsRead)?;

        let mut query =
            ProductRequestEntity::find().order_by_desc(product_request::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(product_request::Column::Status.eq(status.as_ref()));
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

    /// Approves the request and moves stock for every line with a positive
    /// approved quantity: Transfer/Out at the source paired with Transfer/In
    /// at the destination. Any failure leaves no line applied.
    #[instrument(skip(self, actor, approval), fields(user_id = %actor.user_id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        approval: ApproveRequest,
    ) -> Result<ProductRequestDetail, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsApprove)?;

        let txn = db::begin(&self.db).await?;
        let request = find_request(&txn, id).await?;
        let current = request.status()?;
        ensure_version("product request", request.version, approval.expected_version)?;
        ensure_transition(current, ProductRequestStatus::Approved)?;

        let items = load_items(&txn, id).await?;
        let approved = resolve_approvals(&items, &approval.lines)?;

        let now = Utc::now();
        let update = ProductRequestEntity::update_many()
            .col_expr(product_request::Column::ApprovedBy, Expr::value(actor.user_id))
            .col_expr(product_request::Column::ApprovedAt, Expr::value(now));
        bump_status(&txn, &request, ProductRequestStatus::Approved, update, now).await?;

        let mut events = Vec::new();
        let mut updated_items = Vec::with_capacity(items.len());
        let mut moved_lines = 0;
        for item in items {
            let quantity = approved
                .get(&item.id)
                .copied()
                .unwrap_or(item.quantity_requested);
            if quantity > Decimal::ZERO {
                let out = MovementDraft::new(
                    item.product_id,
                    request.source_warehouse_id,
                    MovementType::Transfer,
                    Direction::Out,
                    quantity,
                )
                .reference(REFERENCE_TYPE, id)
                .by(actor.user_id);
                let inbound = MovementDraft::new(
                    item.product_id,
                    request.destination_warehouse_id,
                    MovementType::Transfer,
                    Direction::In,
                    quantity,
                )
                .reference(REFERENCE_TYPE, id)
                .by(actor.user_id);

                events.push(LedgerService::apply_movement(&txn, out).await?.event());
                events.push(LedgerService::apply_movement(&txn, inbound).await?.event());
                moved_lines += 1;
            }

            let mut active: product_request_item::ActiveModel = item.into();
            active.quantity_approved = Set(Some(quantity));
            updated_items.push(active.update(&txn).await?);
        }

        let detail = ProductRequestDetail {
            request: find_request(&txn, id).await?,
            items: updated_items,
        };
        db::commit(txn).await?;

        metrics::counter!("stockflow_transfers_approved_total", 1);
        info!(request_id = %id, moved_lines, "product request approved");
        events.push(status_event(id, current, ProductRequestStatus::Approved));
        events.push(Event::TransferApproved {
            request_id: id,
            source_warehouse_id: request.source_warehouse_id,
            destination_warehouse_id: request.destination_warehouse_id,
            lines: moved_lines,
        });
        publish(&self.event_sender, events).await;
        Ok(detail)
    }

    /// Pending only; no ledger effect.
    #[instrument(skip(self, actor, rejection), fields(user_id = %actor.user_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        rejection: RejectRequest,
    ) -> Result<ProductRequestDetail, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsReject)?;
        rejection.validate()?;
        let reason = rejection.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "a rejection reason is required".to_string(),
            ));
        }

        let txn = db::begin(&self.db).await?;
        let request = find_request(&txn, id).await?;
        let current = request.status()?;
        ensure_version("product request", request.version, rejection.expected_version)?;
        ensure_transition(current, ProductRequestStatus::Rejected)?;

        let now = Utc::now();
        let update = ProductRequestEntity::update_many()
            .col_expr(product_request::Column::RejectedBy, Expr::value(actor.user_id))
            .col_expr(product_request::Column::RejectedAt, Expr::value(now))
            .col_expr(product_request::Column::RejectionReason, Expr::value(reason));
        bump_status(&txn, &request, ProductRequestStatus::Rejected, update, now).await?;

        let detail = ProductRequestDetail {
            request: find_request(&txn, id).await?,
            items: load_items(&txn, id).await?,
        };
        db::commit(txn).await?;

        info!(request_id = %id, "product request rejected");
        publish(
            &self.event_sender,
            vec![status_event(id, current, ProductRequestStatus::Rejected)],
        )
        .await;
        Ok(detail)
    }

    /// Acknowledges receipt of an approved transfer. Stock already moved on approval.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn complete(
        &self,
        actor: &Actor,
        id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<ProductRequestDetail, ServiceError> {
        self.policy.authorize(actor, Action::ProductRequestsComplete)?;

        let txn = db::begin(&self.db).await?;
        let request = find_request(&txn, id).await?;
        let current = request.status()?;
        ensure_version("product request", request.version, expected_version)?;
        ensure_transition(current, ProductRequestStatus::Completed)?;

        let now = Utc::now();
        let update = ProductRequestEntity::update_many()
            .col_expr(product_request::Column::CompletedBy, Expr::value(actor.user_id))
            .col_expr(product_request::Column::CompletedAt, Expr::value(now));
        bump_status(&txn, &request, ProductRequestStatus::Completed, update, now).await?;

        let detail = ProductRequestDetail {
            request: find_request(&txn, id).await?,
            items: load_items(&txn, id).await?,
        };
        db::commit(txn).await?;

        info!(request_id = %id, "product request completed");
        publish(
            &self.event_sender,
            vec![status_event(id, current, ProductRequestStatus::Completed)],
        )
        .await;
        Ok(detail)
    }
}

/// Maps each item to its approved quantity, checking every approval
/// against the request's own lines. Items without an approval line keep
/// their requested quantity.
pub fn resolve_approvals(
    items: &[product_request_item::Model],
    approvals: &[LineApproval],
) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
    let requested: HashMap<Uuid, Decimal> = items
        .iter()
        .map(|item| (item.id, item.quantity_requested))
        .collect();

    let mut seen = HashSet::new();
    let mut approved = HashMap::with_capacity(items.len());
    for approval in approvals {
        let Some(&quantity_requested) = requested.get(&approval.item_id) else {
            return Err(ServiceError::ValidationError(format!(
                "item {} does not belong to this request",
                approval.item_id
            )));
        };
        if !seen.insert(approval.item_id) {
            return Err(ServiceError::ValidationError(format!(
                "item {} is approved more than once",
                approval.item_id
            )));
        }

        let quantity = round_quantity(approval.quantity_approved);
        if quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "item {}: approved quantity must not be negative",
                approval.item_id
            )));
        }
        if quantity > quantity_requested {
            return Err(ServiceError::ValidationError(format!(
                "item {}: approved {} exceeds requested {}",
                approval.item_id, quantity, quantity_requested
            )));
        }
        approved.insert(approval.item_id, quantity);
    }
    for item in items {
        approved.entry(item.id).or_insert(item.quantity_requested);
    }
    Ok(approved)
}

async fn bump_status(
    txn: &DatabaseTransaction,
    request: &product_request::Model,
    target: ProductRequestStatus,
    update: UpdateMany<ProductRequestEntity>,
    now: chrono::DateTime<Utc>,
) -> Result<(), ServiceError> {
    let result = update
        .col_expr(product_request::Column::Status, Expr::value(target.as_ref()))
        .col_expr(
            product_request::Column::Version,
            Expr::value(request.version + 1),
        )
        .col_expr(product_request::Column::UpdatedAt, Expr::value(now))
        .filter(product_request::Column::Id.eq(request.id))
        .filter(product_request::Column::Version.eq(request.version))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(stale_version("product request", request.id));
    }
    Ok(())
}

fn status_event(id: Uuid, from: ProductRequestStatus, to: ProductRequestStatus) -> Event {
    Event::ProductRequestStatusChanged {
        request_id: id,
        old_status: from.to_string(),
        new_status: to.to_string(),
    }
}

async fn find_request<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<product_request::Model, ServiceError> {
    ProductRequestEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("product request {}", id)))
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<Vec<product_request_item::Model>, ServiceError> {
    Ok(ProductRequestItemEntity::find()
        .filter(product_request_item::Column::RequestId.eq(request_id))
        .all(conn)
        .await?)
}
