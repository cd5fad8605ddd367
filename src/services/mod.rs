//! Business logic. Each state-changing operation authorizes the actor, runs
//! in one database transaction and publishes its events after commit.

pub mod assemblies;
pub mod bootstrap;
pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod product_requests;
pub mod purchase_orders;
pub mod reports;
pub mod sales_orders;
pub mod state_machine;

use crate::{
    entities::{product, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, SqlErr};
use serde::Serialize;
use uuid::Uuid;

/// One page of a list query.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}

pub(crate) async fn publish(sender: &Option<EventSender>, events: Vec<Event>) {
    if let Some(sender) = sender {
        sender.publish_all(events).await;
    }
}

pub(crate) async fn ensure_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ReferenceNotFound(format!("product {}", product_id)))
}

pub(crate) async fn ensure_warehouse<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find_by_id(warehouse_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ReferenceNotFound(format!("warehouse {}", warehouse_id)))
}

/// Human-facing document number, e.g. `PO-20240301-1A2B3C4D`.
pub(crate) fn document_number(prefix: &str, id: Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d"),
        suffix.to_ascii_uppercase()
    )
}

/// A concurrent writer inserting the same natural key surfaces as a unique
/// violation; callers treat that like a lost version race.
pub(crate) fn conflict_on_unique(err: DbErr, what: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            metrics::counter!("stockflow_state_conflicts_total", 1);
            ServiceError::StateConflict(format!("{} was modified concurrently", what))
        }
        _ => ServiceError::DatabaseError(err),
    }
}

pub(crate) fn stale_version(what: &str, id: Uuid) -> ServiceError {
    metrics::counter!("stockflow_state_conflicts_total", 1);
    ServiceError::StateConflict(format!("{} {} was modified concurrently", what, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_numbers_carry_prefix_and_date() {
        let number = document_number("PO", Uuid::new_v4());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts[0], "PO");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::<u8> {
            items: vec![],
            total: 41,
            page: 1,
            per_page: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
