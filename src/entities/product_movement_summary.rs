use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily rollup per (product, warehouse). Derived from the ledger and
/// regenerable at any time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_movement_summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub summary_date: NaiveDate,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub opening_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_out: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub closing_balance: Decimal,
    pub purchase_count: i32,
    pub sale_count: i32,
    pub assembly_count: i32,
    pub transfer_count: i32,
    pub adjustment_count: i32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
