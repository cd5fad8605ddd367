use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{Action, Actor, Policy},
    db,
    entities::{
        inventory_balance::{self, Entity as InventoryBalanceEntity},
        product::{self, Entity as ProductEntity},
        product_movement::{self, Direction, Entity as ProductMovementEntity, MovementType},
        product_movement_summary::{self, Entity as ProductMovementSummaryEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::round_money,
};

use super::publish;

/// Longest range a single regeneration may cover.
pub const MAX_REGENERATION_DAYS: i64 = 3660;

const INSERT_CHUNK: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct RegenerateSummariesRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegenerationReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub keys: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// One day of ledger activity for one (product, warehouse) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub summary_date: NaiveDate,
    pub opening_balance: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub closing_balance: Decimal,
    pub counts: HashMap<MovementType, i32>,
}

impl DailySummary {
    fn count(&self, kind: MovementType) -> i32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn into_row(self, generated_at: chrono::DateTime<Utc>) -> product_movement_summary::ActiveModel {
        product_movement_summary::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(self.product_id),
            warehouse_id: Set(self.warehouse_id),
            summary_date: Set(self.summary_date),
            opening_balance: Set(self.opening_balance),
            total_in: Set(self.total_in),
            total_out: Set(self.total_out),
            closing_balance: Set(self.closing_balance),
            purchase_count: Set(self.count(MovementType::Purchase)),
            sale_count: Set(self.count(MovementType::Sale)),
            assembly_count: Set(self.count(MovementType::Assembly)),
            transfer_count: Set(self.count(MovementType::Transfer)),
            adjustment_count: Set(self.count(MovementType::Adjustment)),
            generated_at: Set(generated_at),
        }
    }
}

/// Builds daily rollups for every key with history on or before `to`.
///
/// The first day opens at the ledger sum before `from`; each following day
/// opens at the previous closing balance. Days are UTC calendar days.
pub fn build_daily_summaries(
    movements: &[product_movement::Model],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailySummary> {
    let mut by_key: BTreeMap<(Uuid, Uuid), Vec<&product_movement::Model>> = BTreeMap::new();
    for movement in movements {
        if movement.movement_date.date_naive() <= to {
            by_key
                .entry((movement.product_id, movement.warehouse_id))
                .or_default()
                .push(movement);
        }
    }

    let mut summaries = Vec::new();
    for ((product_id, warehouse_id), history) in by_key {
        let mut opening: Decimal = history
            .iter()
            .filter(|m| m.movement_date.date_naive() < from)
            .map(|m| m.signed_quantity())
            .sum();

        let mut per_day: BTreeMap<NaiveDate, Vec<&product_movement::Model>> = BTreeMap::new();
        for movement in history.iter().filter(|m| m.movement_date.date_naive() >= from) {
            per_day
                .entry(movement.movement_date.date_naive())
                .or_default()
                .push(movement);
        }

        for day in from.iter_days().take_while(|d| *d <= to) {
            let mut total_in = Decimal::ZERO;
            let mut total_out = Decimal::ZERO;
            let mut counts = HashMap::new();
            for movement in per_day.get(&day).map(Vec::as_slice).unwrap_or_default() {
                match movement.direction() {
                    Some(Direction::In) => total_in += movement.quantity,
                    Some(Direction::Out) => total_out += movement.quantity,
                    None => continue,
                }
                if let Some(kind) = movement.movement_type() {
                    *counts.entry(kind).or_insert(0) += 1;
                }
            }

            let closing = opening + total_in - total_out;
            summaries.push(DailySummary {
                product_id,
                warehouse_id,
                summary_date: day,
                opening_balance: opening,
                total_in,
                total_out,
                closing_balance: closing,
                counts,
            });
            opening = closing;
        }
    }
    summaries
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValuationLine {
    pub product_id: Uuid,
    pub sku: String,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockValuation {
    pub lines: Vec<ValuationLine>,
    pub total_value: Decimal,
}

/// Read-only rollups over the ledger and balances.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
    event_sender: Option<EventSender>,
}

impl ReportService {
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

    /// Replaces the stored summaries of the range in one transaction.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn regenerate_summaries(
        &self,
        actor: &Actor,
        request: RegenerateSummariesRequest,
    ) -> Result<RegenerationReport, ServiceError> {
        self.policy.authorize(actor, Action::ReportsRegenerate)?;

        let RegenerateSummariesRequest {
            from,
            to,
            product_id,
            warehouse_id,
        } = request;
        if from > to {
            return Err(ServiceError::ValidationError(format!(
                "range start {} is after range end {}",
                from, to
            )));
        }
        if (to - from).num_days() >= MAX_REGENERATION_DAYS {
            return Err(ServiceError::ValidationError(format!(
                "range may cover at most {} days",
                MAX_REGENERATION_DAYS
            )));
        }

        let mut key_filter = Condition::all();
        if let Some(product_id) = product_id {
            key_filter = key_filter.add(product_movement::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = warehouse_id {
            key_filter = key_filter.add(product_movement::Column::WarehouseId.eq(warehouse_id));
        }

        let mut delete_filter = Condition::all()
            .add(product_movement_summary::Column::SummaryDate.gte(from))
            .add(product_movement_summary::Column::SummaryDate.lte(to));
        if let Some(product_id) = product_id {
            delete_filter = delete_filter.add(product_movement_summary::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = warehouse_id {
            delete_filter =
                delete_filter.add(product_movement_summary::Column::WarehouseId.eq(warehouse_id));
        }

        let txn = db::begin(&self.db).await?;
        let movements = ProductMovementEntity::find()
            .filter(key_filter)
            .all(&txn)
            .await?;
        let summaries = build_daily_summaries(&movements, from, to);
        let keys = summaries
            .iter()
            .map(|s| (s.product_id, s.warehouse_id))
            .collect::<std::collections::HashSet<_>>()
            .len();
        let rows = summaries.len();

        ProductMovementSummaryEntity::delete_many()
            .filter(delete_filter)
            .exec(&txn)
            .await?;

        let generated_at = Utc::now();
        let models: Vec<_> = summaries
            .into_iter()
            .map(|s| s.into_row(generated_at))
            .collect();
        for chunk in models.chunks(INSERT_CHUNK) {
            ProductMovementSummaryEntity::insert_many(chunk.to_vec())
                .exec(&txn)
                .await?;
        }
        db::commit(txn).await?;

        info!(%from, %to, keys, rows, "movement summaries regenerated");
        publish(
            &self.event_sender,
            vec![Event::SummariesRegenerated {
                from,
                to,
                rows,
                generated_at,
            }],
        )
        .await;

        Ok(RegenerationReport {
            from,
            to,
            keys,
            rows,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn summaries(
        &self,
        actor: &Actor,
        filter: SummaryFilter,
    ) -> Result<Vec<product_movement_summary::Model>, ServiceError> {
        self.policy.authorize(actor, Action::ReportsRead)?;

        let mut condition = Condition::all();
        if let Some(product_id) = filter.product_id {
            condition = condition.add(product_movement_summary::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            condition = condition.add(product_movement_summary::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(from) = filter.from {
            condition = condition.add(product_movement_summary::Column::SummaryDate.gte(from));
        }
        if let Some(to) = filter.to {
            condition = condition.add(product_movement_summary::Column::SummaryDate.lte(to));
        }

        Ok(ProductMovementSummaryEntity::find()
            .filter(condition)
            .order_by_asc(product_movement_summary::Column::ProductId)
            .order_by_asc(product_movement_summary::Column::WarehouseId)
            .order_by_asc(product_movement_summary::Column::SummaryDate)
            .all(&*self.db)
            .await?)
    }

    /// Quantity × current product price per balance row.
    #[instrument(skip(self, actor))]
    pub async fn stock_valuation(
        &self,
        actor: &Actor,
        warehouse_id: Option<Uuid>,
    ) -> Result<StockValuation, ServiceError> {
        self.policy.authorize(actor, Action::ReportsRead)?;

        let mut query = InventoryBalanceEntity::find()
            .order_by_asc(inventory_balance::Column::WarehouseId)
            .order_by_asc(inventory_balance::Column::ProductId);
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory_balance::Column::WarehouseId.eq(warehouse_id));
        }
        let balances = query.all(&*self.db).await?;

        let product_ids: Vec<Uuid> = balances.iter().map(|b| b.product_id).collect();
        let products: HashMap<Uuid, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            ProductEntity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let lines: Vec<ValuationLine> = balances
            .into_iter()
            .filter_map(|balance| {
                let product = products.get(&balance.product_id)?;
                Some(ValuationLine {
                    product_id: balance.product_id,
                    sku: product.sku.clone(),
                    warehouse_id: balance.warehouse_id,
                    quantity: balance.quantity,
                    unit_price: product.price,
                    value: round_money(balance.quantity * product.price),
                })
            })
            .collect();
        let total_value = lines.iter().map(|l| l.value).sum();

        Ok(StockValuation { lines, total_value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn movement(
        product: Uuid,
        warehouse: Uuid,
        day: u32,
        direction: Direction,
        quantity: Decimal,
    ) -> product_movement::Model {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap();
        product_movement::Model {
            id: Uuid::new_v4(),
            product_id: product,
            warehouse_id: warehouse,
            movement_type: MovementType::Adjustment.as_str().to_string(),
            direction: direction.as_str().to_string(),
            quantity,
            reference_type: None,
            reference_id: None,
            movement_date: at,
            created_by: None,
            notes: None,
            created_at: at,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn opening_balance_includes_history_before_range() {
        let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
        let history = vec![
            movement(p, w, 1, Direction::In, dec!(10)),
            movement(p, w, 3, Direction::Out, dec!(4)),
            movement(p, w, 3, Direction::In, dec!(1)),
        ];

        let days = build_daily_summaries(&history, date(2), date(4));
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].opening_balance, dec!(10));
        assert_eq!(days[0].closing_balance, dec!(10));
        assert_eq!(days[1].total_in, dec!(1));
        assert_eq!(days[1].total_out, dec!(4));
        assert_eq!(days[1].closing_balance, dec!(7));
        assert_eq!(days[1].count(MovementType::Adjustment), 2);
        assert_eq!(days[2].opening_balance, dec!(7));
    }

    #[test]
    fn keys_with_only_later_history_are_skipped() {
        let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
        let history = vec![movement(p, w, 20, Direction::In, dec!(1))];
        assert!(build_daily_summaries(&history, date(1), date(5)).is_empty());
    }
}
