use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db,
    entities::{
        inventory_balance::{self, Entity as InventoryBalanceEntity},
        product_movement::{self, Direction, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::round_quantity,
};

use super::{conflict_on_unique, ensure_product, ensure_warehouse, publish, stale_version};

/// A movement that has not been written yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementDraft {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: MovementType,
    pub direction: Direction,
    pub quantity: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    /// Defaults to the time of application.
    pub movement_date: Option<DateTime<Utc>>,
}

impl MovementDraft {
    pub fn new(
        product_id: Uuid,
        warehouse_id: Uuid,
        movement_type: MovementType,
        direction: Direction,
        quantity: Decimal,
    ) -> Self {
        Self {
            product_id,
            warehouse_id,
            movement_type,
            direction,
            quantity,
            reference_type: None,
            reference_id: None,
            created_by: None,
            notes: None,
            movement_date: None,
        }
    }

    pub fn reference(mut self, reference_type: &str, reference_id: Uuid) -> Self {
        self.reference_type = Some(reference_type.to_string());
        self.reference_id = Some(reference_id);
        self
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// The appended ledger row together with the balance it produced.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMovement {
    pub movement: product_movement::Model,
    pub balance: inventory_balance::Model,
}

impl AppliedMovement {
    pub fn event(&self) -> Event {
        Event::StockMoved {
            movement_id: self.movement.id,
            product_id: self.movement.product_id,
            warehouse_id: self.movement.warehouse_id,
            movement_type: self.movement.movement_type.clone(),
            direction: self.movement.direction.clone(),
            quantity: self.movement.quantity,
            balance: self.balance.quantity,
        }
    }
}

/// Single write point for inventory quantities.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl LedgerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Appends one movement and applies its signed quantity to the matching
    /// balance inside the caller's transaction.
    ///
    /// A result below zero fails with `InsufficientStock` for every movement
    /// type. A concurrent writer on the same balance fails the call with
    /// `StateConflict`. Either way the caller's transaction must be dropped.
    #[instrument(skip(txn, draft), fields(
        product_id = %draft.product_id,
        warehouse_id = %draft.warehouse_id,
        movement_type = draft.movement_type.as_str(),
        direction = draft.direction.as_str(),
        quantity = %draft.quantity,
    ))]
    pub async fn apply_movement(
        txn: &DatabaseTransaction,
        draft: MovementDraft,
    ) -> Result<AppliedMovement, ServiceError> {
        let quantity = round_quantity(draft.quantity);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "movement quantity must be positive, got {}",
                draft.quantity
            )));
        }

        ensure_product(txn, draft.product_id).await?;
        ensure_warehouse(txn, draft.warehouse_id).await?;

        let now = Utc::now();
        let balance = Self::balance_row(txn, draft.product_id, draft.warehouse_id, now).await?;

        let new_quantity = balance.quantity + draft.direction.signed(quantity);
        if new_quantity < Decimal::ZERO {
            metrics::counter!("stockflow_insufficient_stock_total", 1);
            warn!(
                available = %balance.quantity,
                requested = %quantity,
                "movement would drive balance negative"
            );
            return Err(ServiceError::InsufficientStock(format!(
                "product {} at warehouse {}: available {}, requested {}",
                draft.product_id, draft.warehouse_id, balance.quantity, quantity
            )));
        }

        write_balance(txn, &balance, new_quantity, now).await?;

        let movement = product_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(draft.product_id),
            warehouse_id: Set(draft.warehouse_id),
            movement_type: Set(draft.movement_type.as_str().to_string()),
            direction: Set(draft.direction.as_str().to_string()),
            quantity: Set(quantity),
            reference_type: Set(draft.reference_type),
            reference_id: Set(draft.reference_id),
            movement_date: Set(draft.movement_date.unwrap_or(now)),
            created_by: Set(draft.created_by),
            notes: Set(draft.notes),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;

        metrics::counter!(
            "stockflow_ledger_movements_total",
            1,
            "type" => draft.movement_type.as_str(),
            "direction" => draft.direction.as_str()
        );

        let balance = inventory_balance::Model {
            quantity: new_quantity,
            version: balance.version + 1,
            updated_at: now,
            ..balance
        };

        Ok(AppliedMovement { movement, balance })
    }

    /// Applies one movement in its own transaction and publishes the result.
    #[instrument(skip(self, draft))]
    pub async fn record(&self, draft: MovementDraft) -> Result<AppliedMovement, ServiceError> {
        let txn = db::begin(&self.db).await?;
        let applied = Self::apply_movement(&txn, draft).await?;
        db::commit(txn).await?;

        info!(
            movement_id = %applied.movement.id,
            balance = %applied.balance.quantity,
            "movement recorded"
        );
        publish(&self.event_sender, vec![applied.event()]).await;
        Ok(applied)
    }

    /// Loads the balance row for a key, creating it at zero when missing.
    async fn balance_row(
        txn: &DatabaseTransaction,
        product_id: Uuid,
        warehouse_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<inventory_balance::Model, ServiceError> {
        let existing = InventoryBalanceEntity::find()
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
            .one(txn)
            .await?;

        if let Some(balance) = existing {
            return Ok(balance);
        }

        inventory_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            warehouse_id: Set(warehouse_id),
            quantity: Set(Decimal::ZERO),
            minimum_stock_level: Set(None),
            maximum_stock_level: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(|e| conflict_on_unique(e, "inventory balance"))
    }
}

/// Conditional write of a new quantity. Fails with `StateConflict` when the
/// row's version moved since `balance` was read.
async fn write_balance(
    txn: &DatabaseTransaction,
    balance: &inventory_balance::Model,
    new_quantity: Decimal,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let updated = InventoryBalanceEntity::update_many()
        .col_expr(inventory_balance::Column::Quantity, Expr::value(new_quantity))
        .col_expr(
            inventory_balance::Column::Version,
            Expr::value(balance.version + 1),
        )
        .col_expr(inventory_balance::Column::UpdatedAt, Expr::value(now))
        .filter(inventory_balance::Column::Id.eq(balance.id))
        .filter(inventory_balance::Column::Version.eq(balance.version))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(stale_version("inventory balance", balance.id));
    }
    Ok(())
}

/// Current quantity for a key; a missing balance row reads as zero.
pub(crate) async fn balance_quantity<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Decimal, ServiceError> {
    Ok(InventoryBalanceEntity::find()
        .filter(inventory_balance::Column::ProductId.eq(product_id))
        .filter(inventory_balance::Column::WarehouseId.eq(warehouse_id))
        .one(conn)
        .await?
        .map(|b| b.quantity)
        .unwrap_or(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn migrated_pool() -> DatabaseConnection {
        let pool = db::establish_connection("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seeded_balance(pool: &DatabaseConnection, quantity: Decimal) -> inventory_balance::Model {
        let now = Utc::now();
        inventory_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(Uuid::new_v4()),
            warehouse_id: Set(Uuid::new_v4()),
            quantity: Set(quantity),
            minimum_stock_level: Set(None),
            maximum_stock_level: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn balance_write_bumps_the_version() {
        let pool = migrated_pool().await;
        let balance = seeded_balance(&pool, dec!(5)).await;

        let txn = db::begin(&pool).await.unwrap();
        write_balance(&txn, &balance, dec!(4), Utc::now()).await.unwrap();
        db::commit(txn).await.unwrap();

        let stored = InventoryBalanceEntity::find_by_id(balance.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.quantity, dec!(4));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn write_from_a_stale_read_is_a_conflict() {
        let pool = migrated_pool().await;
        let stale = seeded_balance(&pool, dec!(5)).await;

        // Another writer moves the row to version 2 after `stale` was read.
        let txn = db::begin(&pool).await.unwrap();
        write_balance(&txn, &stale, dec!(4), Utc::now()).await.unwrap();
        let err = write_balance(&txn, &stale, dec!(2), Utc::now())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::StateConflict(_));
        assert!(err.is_retryable());
        drop(txn);

        let stored = InventoryBalanceEntity::find_by_id(stale.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.quantity, dec!(5));
        assert_eq!(stored.version, 1);
    }
}
