use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Action, Actor, Policy},
    entities::{
        inventory_balance::{self, Entity as InventoryBalanceEntity},
        product_movement::{self, Direction, Entity as ProductMovementEntity, MovementType},
    },
    errors::ServiceError,
    money::round_quantity,
};

use super::{
    ledger::{AppliedMovement, LedgerService, MovementDraft},
    Page,
};

/// Manual stock correction.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub direction: Direction,
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultLevelsRequest {
    pub minimum: Decimal,
    pub maximum: Option<Decimal>,
    /// Replace thresholds that are already set.
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub reference_id: Option<Uuid>,
}

/// Stored balance compared against the ledger sum for one key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceVerification {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub stored_quantity: Decimal,
    pub ledger_quantity: Decimal,
    pub movement_count: u64,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    ledger: LedgerService,
    policy: Arc<dyn Policy>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, ledger: LedgerService, policy: Arc<dyn Policy>) -> Self {
        Self { db, ledger, policy }
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        request: AdjustStockRequest,
    ) -> Result<AppliedMovement, ServiceError> {
        self.policy.authorize(actor, Action::InventoryAdjust)?;
        request.validate()?;

        let draft = MovementDraft::new(
            request.product_id,
            request.warehouse_id,
            MovementType::Adjustment,
            request.direction,
            request.quantity,
        )
        .by(actor.user_id)
        .notes(request.notes);

        let applied = self.ledger.record(draft).await?;
        info!(
            product_id = %request.product_id,
            warehouse_id = %request.warehouse_id,
            balance = %applied.balance.quantity,
            "stock adjusted"
        );
        Ok(applied)
    }

    /// Sets threshold fields on balance rows. Quantities are never touched.
    /// Returns the number of rows updated.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn set_default_minimum_levels(
        &self,
        actor: &Actor,
        request: DefaultLevelsRequest,
    ) -> Result<u64, ServiceError> {
        self.policy.authorize(actor, Action::InventoryConfigure)?;

        let minimum = round_quantity(request.minimum);
        let maximum = request.maximum.map(round_quantity);
        if minimum < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "minimum level must not be negative".to_string(),
            ));
        }
        if let Some(maximum) = maximum {
            if maximum < minimum {
                return Err(ServiceError::ValidationError(format!(
                    "maximum level {} is below minimum level {}",
                    maximum, minimum
                )));
            }
        }

        let mut update = InventoryBalanceEntity::update_many()
            .col_expr(
                inventory_balance::Column::MinimumStockLevel,
                Expr::value(Some(minimum)),
            )
            .col_expr(
                inventory_balance::Column::MaximumStockLevel,
                Expr::value(maximum),
            )
            .col_expr(inventory_balance::Column::UpdatedAt, Expr::value(Utc::now()));

        if !request.overwrite {
            update = update.filter(inventory_balance::Column::MinimumStockLevel.is_null());
        }

        let result = update.exec(&*self.db).await?;
        info!(rows = result.rows_affected, minimum = %minimum, "default stock levels applied");
        Ok(result.rows_affected)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_balance(
        &self,
        actor: &Actor,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<inventory_balance::Model, ServiceError> {
        self.policy.authorize(actor, Action::InventoryRead)?;

        InventoryBalanceEntity::find()
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no balance for product {} at warehouse {}",
                    product_id, warehouse_id
                ))
            })
    }

    #[instrument(skip(self, actor))]
    pub async fn list_balances(
        &self,
        actor: &Actor,
        warehouse_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<inventory_balance::Model>, ServiceError> {
        self.policy.authorize(actor, Action::InventoryRead)?;

        let mut query = InventoryBalanceEntity::find()
            .order_by_asc(inventory_balance::Column::ProductId)
            .order_by_asc(inventory_balance::Column::WarehouseId);
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory_balance::Column::WarehouseId.eq(warehouse_id));
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

    /// Balance rows whose quantity is below their minimum level.
    #[instrument(skip(self, actor))]
    pub async fn low_stock(
        &self,
        actor: &Actor,
        warehouse_id: Option<Uuid>,
    ) -> Result<Vec<inventory_balance::Model>, ServiceError> {
        self.policy.authorize(actor, Action::InventoryRead)?;

        let mut query = InventoryBalanceEntity::find()
            .filter(inventory_balance::Column::MinimumStockLevel.is_not_null());
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory_balance::Column::WarehouseId.eq(warehouse_id));
        }

        let rows = query.all(&*self.db).await?;
        Ok(rows.into_iter().filter(|b| b.is_below_minimum()).collect())
    }

    #[instrument(skip(self, actor))]
    pub async fn movements(
        &self,
        actor: &Actor,
        filter: MovementFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<product_movement::Model>, ServiceError> {
        self.policy.authorize(actor, Action::InventoryRead)?;

        let mut condition = Condition::all();
        if let Some(product_id) = filter.product_id {
            condition = condition.add(product_movement::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            condition = condition.add(product_movement::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(movement_type) = filter.movement_type {
            condition = condition.add(product_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(reference_id) = filter.reference_id {
            condition = condition.add(product_movement::Column::ReferenceId.eq(reference_id));
        }

        let paginator = ProductMovementEntity::find()
            .filter(condition)
            .order_by_desc(product_movement::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok(Page {
            items,
            total,
            page: page.max(1),
            per_page,
        })
    }

    /// Recomputes Σ In − Σ Out from the ledger and compares it to the stored balance.
    #[instrument(skip(self, actor))]
    pub async fn verify_balance(
        &self,
        actor: &Actor,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<BalanceVerification, ServiceError> {
        self.policy.authorize(actor, Action::InventoryRead)?;
        verify_balance(&self.db, product_id, warehouse_id).await
    }
}

/// Unguarded form used by the CLI.
pub async fn verify_balance(
    db: &DatabaseConnection,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<BalanceVerification, ServiceError> {
    let movements = ProductMovementEntity::find()
        .filter(product_movement::Column::ProductId.eq(product_id))
        .filter(product_movement::Column::WarehouseId.eq(warehouse_id))
        .all(db)
        .await?;

    let ledger_quantity: Decimal = movements.iter().map(|m| m.signed_quantity()).sum();

    let stored_quantity = InventoryBalanceEntity::find()
        .filter(inventory_balance::Column::ProductId.eq(product_id))
        .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
        .one(db)
        .await?
        .map(|b| b.quantity)
        .unwrap_or(Decimal::ZERO);

    let consistent = stored_quantity == ledger_quantity;
    if !consistent {
        warn!(
            %product_id,
            %warehouse_id,
            stored = %stored_quantity,
            ledger = %ledger_quantity,
            "balance does not match ledger"
        );
    }

    Ok(BalanceVerification {
        product_id,
        warehouse_id,
        stored_quantity,
        ledger_quantity,
        movement_count: movements.len() as u64,
        consistent,
    })
}
