//! Idempotent reference-data bootstrap, keyed by natural keys
//! (warehouse code, product SKU).

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db,
    entities::{product, warehouse},
    errors::ServiceError,
    money::round_money,
};

struct WarehouseSeed {
    code: &'static str,
    name: &'static str,
    is_virtual: bool,
}

struct ProductSeed {
    sku: &'static str,
    name: &'static str,
    unit_of_measure: &'static str,
    price: Decimal,
}

const WAREHOUSES: &[WarehouseSeed] = &[
    WarehouseSeed {
        code: "MAIN",
        name: "Main warehouse",
        is_virtual: false,
    },
    WarehouseSeed {
        code: "STORE",
        name: "Retail store",
        is_virtual: true,
    },
    WarehouseSeed {
        code: "ONLINE",
        name: "Online channel",
        is_virtual: true,
    },
];

fn demo_products() -> [ProductSeed; 3] {
    [
        ProductSeed {
            sku: "BOLT-M6",
            name: "M6 bolt",
            unit_of_measure: "pcs",
            price: dec!(0.25),
        },
        ProductSeed {
            sku: "PLATE-STEEL",
            name: "Steel plate",
            unit_of_measure: "pcs",
            price: dec!(12.50),
        },
        ProductSeed {
            sku: "BRACKET-KIT",
            name: "Bracket kit",
            unit_of_measure: "kit",
            price: dec!(39.90),
        },
    ]
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub warehouses_created: usize,
    pub warehouses_updated: usize,
    pub products_created: usize,
    pub products_updated: usize,
}

/// Upserts the default warehouses and, when `include_demo` is set, the demo
/// products. Running it again changes nothing.
#[instrument(skip(pool))]
pub async fn seed(pool: &DatabaseConnection, include_demo: bool) -> Result<SeedReport, ServiceError> {
    let mut report = SeedReport::default();
    let txn = db::begin(pool).await?;
    let now = Utc::now();

    for seed in WAREHOUSES {
        let existing = warehouse::Entity::find()
            .filter(warehouse::Column::Code.eq(seed.code))
            .one(&txn)
            .await?;
        match existing {
            Some(row) if row.name == seed.name && row.is_virtual == seed.is_virtual => {}
            Some(row) => {
                let mut active: warehouse::ActiveModel = row.into();
                active.name = Set(seed.name.to_string());
                active.is_virtual = Set(seed.is_virtual);
                active.updated_at = Set(now);
                active.update(&txn).await?;
                report.warehouses_updated += 1;
            }
            None => {
                warehouse::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    code: Set(seed.code.to_string()),
                    name: Set(seed.name.to_string()),
                    is_virtual: Set(seed.is_virtual),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                report.warehouses_created += 1;
            }
        }
    }

    if include_demo {
        for seed in demo_products() {
            let existing = product::Entity::find()
                .filter(product::Column::Sku.eq(seed.sku))
                .one(&txn)
                .await?;
            match existing {
                Some(row) if row.name == seed.name && round_money(row.price) == seed.price => {}
                Some(row) => {
                    let mut active: product::ActiveModel = row.into();
                    active.name = Set(seed.name.to_string());
                    active.price = Set(seed.price);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                    report.products_updated += 1;
                }
                None => {
                    product::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        sku: Set(seed.sku.to_string()),
                        name: Set(seed.name.to_string()),
                        unit_of_measure: Set(seed.unit_of_measure.to_string()),
                        price: Set(seed.price),
                        is_active: Set(true),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(&txn)
                    .await?;
                    report.products_created += 1;
                }
            }
        }
    }

    db::commit(txn).await?;
    info!(?report, "bootstrap data applied");
    Ok(report)
}
