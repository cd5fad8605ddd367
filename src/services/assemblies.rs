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
    db,
    entities::{
        bill_of_material::{self, Entity as BillOfMaterialEntity},
        product_assembly::{self, Entity as ProductAssemblyEntity},
        product_movement::{Direction, MovementType},
        AssemblyStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::round_quantity,
};

use super::{
    document_number, ensure_product, ensure_warehouse,
    ledger::{balance_quantity, LedgerService, MovementDraft},
    publish, stale_version,
    state_machine::{ensure_transition, ensure_version, TransitionRequest},
    Page,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssemblyRequest {
    /// Finished product credited on completion.
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one material line is required"))]
    pub materials: Vec<MaterialLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaterialLineRequest {
    pub raw_product_id: Uuid,
    pub warehouse_id: Uuid,
    pub required_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyDetail {
    #[serde(flatten)]
    pub assembly: product_assembly::Model,
    pub materials: Vec<bill_of_material::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaterialCheck {
    pub bom_id: Uuid,
    pub raw_product_id: Uuid,
    pub warehouse_id: Uuid,
    pub required: Decimal,
    pub available: Decimal,
    pub shortfall: Decimal,
}

/// Per-line shortage report. Nothing is reserved by producing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssemblyValidation {
    pub assembly_id: Uuid,
    pub sufficient: bool,
    pub lines: Vec<MaterialCheck>,
}

impl AssemblyValidation {
    pub fn short_lines(&self) -> impl Iterator<Item = &MaterialCheck> {
        self.lines.iter().filter(|l| l.shortfall > Decimal::ZERO)
    }

    fn shortage_message(&self) -> String {
        self.short_lines()
            .map(|l| {
                format!(
                    "product {} at warehouse {}: required {}, available {}, short {}",
                    l.raw_product_id, l.warehouse_id, l.required, l.available, l.shortfall
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compares BOM lines against available stock. Lines sharing a
/// (product, warehouse) key draw on the same balance in line order.
pub fn check_materials(
    assembly_id: Uuid,
    lines: &[bill_of_material::Model],
    balances: &HashMap<(Uuid, Uuid), Decimal>,
) -> AssemblyValidation {
    let mut remaining = balances.clone();
    let checks: Vec<MaterialCheck> = lines
        .iter()
        .map(|line| {
            let key = (line.raw_product_id, line.warehouse_id);
            let available = balances.get(&key).copied().unwrap_or(Decimal::ZERO);
            let left = remaining.entry(key).or_insert(Decimal::ZERO);
            let shortfall = (line.required_quantity - *left).max(Decimal::ZERO);
            *left = (*left - line.required_quantity).max(Decimal::ZERO);
            MaterialCheck {
                bom_id: line.id,
                raw_product_id: line.raw_product_id,
                warehouse_id: line.warehouse_id,
                required: line.required_quantity,
                available,
                shortfall,
            }
        })
        .collect();

    AssemblyValidation {
        assembly_id,
        sufficient: checks.iter().all(|c| c.shortfall == Decimal::ZERO),
        lines: checks,
    }
}

const REFERENCE_TYPE: &str = "product_assembly";

#[derive(Clone)]
pub struct AssemblyService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
    event_sender: Option<EventSender>,
}

impl AssemblyService {
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

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %request.product_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateAssemblyRequest,
    ) -> Result<AssemblyDetail, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesCreate)?;
        request.validate()?;

        let quantity = round_quantity(request.quantity);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "assembly quantity must be positive".to_string(),
            ));
        }
        for (index, line) in request.materials.iter().enumerate() {
            if round_quantity(line.required_quantity) <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "material {}: required quantity must be positive",
                    index + 1
                )));
            }
        }

        let txn = db::begin(&self.db).await?;
        ensure_product(&txn, request.product_id).await?;
        ensure_warehouse(&txn, request.warehouse_id).await?;

        let now = Utc::now();
        let assembly_id = Uuid::new_v4();
        let assembly = product_assembly::ActiveModel {
            id: Set(assembly_id),
            assembly_number: Set(document_number("ASM", assembly_id)),
            product_id: Set(request.product_id),
            warehouse_id: Set(request.warehouse_id),
            quantity: Set(quantity),
            status: Set(AssemblyStatus::Pending.to_string()),
            notes: Set(request.notes.clone()),
            created_by: Set(actor.user_id),
            started_by: Set(None),
            started_at: Set(None),
            completed_by: Set(None),
            completed_at: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut materials = Vec::with_capacity(request.materials.len());
        for line in &request.materials {
            ensure_product(&txn, line.raw_product_id).await?;
            ensure_warehouse(&txn, line.warehouse_id).await?;
            let available = balance_quantity(&txn, line.raw_product_id, line.warehouse_id).await?;

            let bom = bill_of_material::ActiveModel {
                id: Set(Uuid::new_v4()),
                assembly_id: Set(assembly_id),
                raw_product_id: Set(line.raw_product_id),
                warehouse_id: Set(line.warehouse_id),
                required_quantity: Set(round_quantity(line.required_quantity)),
                available_quantity: Set(available),
            }
            .insert(&txn)
            .await?;
            materials.push(bom);
        }

        db::commit(txn).await?;

        info!(assembly_id = %assembly.id, lines = materials.len(), "assembly created");
        Ok(AssemblyDetail {
            assembly,
            materials,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<AssemblyDetail, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesRead)?;
        let assembly = find_assembly(&*self.db, id).await?;
        let materials = load_materials(&*self.db, id).await?;
        Ok(AssemblyDetail {
            assembly,
            materials,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<AssemblyStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<product_assembly::Model>, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesRead)?;

        let mut query =
            ProductAssemblyEntity::find().order_by_desc(product_assembly::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(product_assembly::Column::Status.eq(status.as_ref()));
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

    /// Read-only and repeatable.
    #[instrument(skip(self, actor))]
    pub async fn validate(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<AssemblyValidation, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesRead)?;
        find_assembly(&*self.db, id).await?;
        let materials = load_materials(&*self.db, id).await?;
        validate_materials(&*self.db, id, &materials).await
    }

    /// Pending → InProgress when every line is covered. No stock moves.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn start(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<AssemblyDetail, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesStart)?;
        request.validate()?;

        let txn = db::begin(&self.db).await?;
        let assembly = find_assembly(&txn, id).await?;
        let current = assembly.status()?;
        ensure_version("assembly", assembly.version, request.expected_version)?;
        ensure_transition(current, AssemblyStatus::InProgress)?;

        let materials = load_materials(&txn, id).await?;
        let validation = validate_materials(&txn, id, &materials).await?;
        if !validation.sufficient {
            return Err(insufficient(&validation));
        }

        let now = Utc::now();
        let update = ProductAssemblyEntity::update_many()
            .col_expr(product_assembly::Column::StartedBy, Expr::value(actor.user_id))
            .col_expr(product_assembly::Column::StartedAt, Expr::value(now));
        bump_status(&txn, &assembly, AssemblyStatus::InProgress, update, now).await?;

        let detail = AssemblyDetail {
            assembly: find_assembly(&txn, id).await?,
            materials,
        };
        db::commit(txn).await?;

        info!(assembly_id = %id, "assembly started");
        publish(
            &self.event_sender,
            vec![status_event(id, current, AssemblyStatus::InProgress)],
        )
        .await;
        Ok(detail)
    }

    /// InProgress → Completed. Consumes every BOM line and credits the
    /// output product in one transaction; a shortage leaves the assembly
    /// InProgress with no stock moved.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn complete(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<AssemblyDetail, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesComplete)?;
        request.validate()?;

        let txn = db::begin(&self.db).await?;
        let assembly = find_assembly(&txn, id).await?;
        let current = assembly.status()?;
        ensure_version("assembly", assembly.version, request.expected_version)?;
        ensure_transition(current, AssemblyStatus::Completed)?;

        let materials = load_materials(&txn, id).await?;
        let validation = validate_materials(&txn, id, &materials).await?;
        if !validation.sufficient {
            return Err(insufficient(&validation));
        }

        let now = Utc::now();
        let update = ProductAssemblyEntity::update_many()
            .col_expr(product_assembly::Column::CompletedBy, Expr::value(actor.user_id))
            .col_expr(product_assembly::Column::CompletedAt, Expr::value(now));
        bump_status(&txn, &assembly, AssemblyStatus::Completed, update, now).await?;

        let mut events = Vec::with_capacity(materials.len() + 3);
        let mut refreshed = Vec::with_capacity(materials.len());
        for line in materials {
            let draft = MovementDraft::new(
                line.raw_product_id,
                line.warehouse_id,
                MovementType::Assembly,
                Direction::Out,
                line.required_quantity,
            )
            .reference(REFERENCE_TYPE, id)
            .by(actor.user_id)
            .notes(request.notes.clone());
            let applied = LedgerService::apply_movement(&txn, draft).await?;
            events.push(applied.event());

            let mut active: bill_of_material::ActiveModel = line.into();
            active.available_quantity = Set(applied.balance.quantity);
            refreshed.push(active.update(&txn).await?);
        }

        let output = MovementDraft::new(
            assembly.product_id,
            assembly.warehouse_id,
            MovementType::Assembly,
            Direction::In,
            assembly.quantity,
        )
        .reference(REFERENCE_TYPE, id)
        .by(actor.user_id)
        .notes(request.notes.clone());
        let applied = LedgerService::apply_movement(&txn, output).await?;
        events.push(applied.event());

        let detail = AssemblyDetail {
            assembly: find_assembly(&txn, id).await?,
            materials: refreshed,
        };
        db::commit(txn).await?;

        metrics::counter!("stockflow_assemblies_completed_total", 1);
        info!(assembly_id = %id, product_id = %assembly.product_id, quantity = %assembly.quantity, "assembly completed");
        events.push(status_event(id, current, AssemblyStatus::Completed));
        events.push(Event::AssemblyCompleted {
            assembly_id: id,
            product_id: assembly.product_id,
            quantity: assembly.quantity,
        });
        publish(&self.event_sender, events).await;
        Ok(detail)
    }

    /// Nothing was reserved, so cancelling writes no compensating movement.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<AssemblyDetail, ServiceError> {
        self.policy.authorize(actor, Action::AssembliesCancel)?;
        request.validate()?;

        let txn = db::begin(&self.db).await?;
        let assembly = find_assembly(&txn, id).await?;
        let current = assembly.status()?;
        ensure_version("assembly", assembly.version, request.expected_version)?;
        ensure_transition(current, AssemblyStatus::Cancelled)?;

        let now = Utc::now();
        let mut update = ProductAssemblyEntity::update_many()
            .col_expr(product_assembly::Column::CancelledBy, Expr::value(actor.user_id))
            .col_expr(product_assembly::Column::CancelledAt, Expr::value(now));
        if let Some(notes) = request.notes.clone() {
            update = update.col_expr(product_assembly::Column::Notes, Expr::value(notes));
        }
        bump_status(&txn, &assembly, AssemblyStatus::Cancelled, update, now).await?;

        let detail = AssemblyDetail {
            assembly: find_assembly(&txn, id).await?,
            materials: load_materials(&txn, id).await?,
        };
        db::commit(txn).await?;

        info!(assembly_id = %id, from = %current, "assembly cancelled");
        publish(
            &self.event_sender,
            vec![status_event(id, current, AssemblyStatus::Cancelled)],
        )
        .await;
        Ok(detail)
    }
}

async fn bump_status(
    txn: &DatabaseTransaction,
    assembly: &product_assembly::Model,
    target: AssemblyStatus,
    update: sea_orm::UpdateMany<ProductAssemblyEntity>,
    now: chrono::DateTime<Utc>,
) -> Result<(), ServiceError> {
    let result = update
        .col_expr(product_assembly::Column::Status, Expr::value(target.as_ref()))
        .col_expr(
            product_assembly::Column::Version,
            Expr::value(assembly.version + 1),
        )
        .col_expr(product_assembly::Column::UpdatedAt, Expr::value(now))
        .filter(product_assembly::Column::Id.eq(assembly.id))
        .filter(product_assembly::Column::Version.eq(assembly.version))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(stale_version("assembly", assembly.id));
    }
    Ok(())
}

async fn validate_materials<C: ConnectionTrait>(
    conn: &C,
    assembly_id: Uuid,
    materials: &[bill_of_material::Model],
) -> Result<AssemblyValidation, ServiceError> {
    let mut balances = HashMap::new();
    for line in materials {
        let key = (line.raw_product_id, line.warehouse_id);
        if !balances.contains_key(&key) {
            balances.insert(key, balance_quantity(conn, key.0, key.1).await?);
        }
    }
    Ok(check_materials(assembly_id, materials, &balances))
}

fn insufficient(validation: &AssemblyValidation) -> ServiceError {
    metrics::counter!("stockflow_insufficient_stock_total", 1);
    warn!(
        assembly_id = %validation.assembly_id,
        short_lines = validation.short_lines().count(),
        "assembly materials insufficient"
    );
    ServiceError::InsufficientMaterials(validation.shortage_message())
}

fn status_event(id: Uuid, from: AssemblyStatus, to: AssemblyStatus) -> Event {
    Event::AssemblyStatusChanged {
        assembly_id: id,
        old_status: from.to_string(),
        new_status: to.to_string(),
    }
}

async fn find_assembly<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<product_assembly::Model, ServiceError> {
    ProductAssemblyEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("assembly {}", id)))
}

async fn load_materials<C: ConnectionTrait>(
    conn: &C,
    assembly_id: Uuid,
) -> Result<Vec<bill_of_material::Model>, ServiceError> {
    Ok(BillOfMaterialEntity::find()
        .filter(bill_of_material::Column::AssemblyId.eq(assembly_id))
        .all(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(product: Uuid, warehouse: Uuid, required: Decimal) -> bill_of_material::Model {
        bill_of_material::Model {
            id: Uuid::new_v4(),
            assembly_id: Uuid::nil(),
            raw_product_id: product,
            warehouse_id: warehouse,
            required_quantity: required,
            available_quantity: Decimal::ZERO,
        }
    }

    #[test]
    fn reports_shortfall_per_line() {
        let (a, b, w) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let balances = HashMap::from([((a, w), dec!(10)), ((b, w), dec!(2))]);
        let report = check_materials(Uuid::nil(), &[line(a, w, dec!(5)), line(b, w, dec!(3))], &balances);

        assert!(!report.sufficient);
        assert_eq!(report.lines[0].shortfall, Decimal::ZERO);
        assert_eq!(report.lines[1].shortfall, dec!(1));
        assert_eq!(report.short_lines().count(), 1);
    }

    #[test]
    fn lines_sharing_a_key_draw_on_one_balance() {
        let (a, w) = (Uuid::new_v4(), Uuid::new_v4());
        let balances = HashMap::from([((a, w), dec!(5))]);
        let report = check_materials(Uuid::nil(), &[line(a, w, dec!(3)), line(a, w, dec!(3))], &balances);

        assert!(!report.sufficient);
        assert_eq!(report.lines[1].available, dec!(5));
        assert_eq!(report.lines[1].shortfall, dec!(1));
    }

    #[test]
    fn missing_balance_counts_as_zero() {
        let (a, w) = (Uuid::new_v4(), Uuid::new_v4());
        let report = check_materials(Uuid::nil(), &[line(a, w, dec!(1))], &HashMap::new());
        assert_eq!(report.lines[0].shortfall, dec!(1));
    }
}
