//! Lifecycle statuses persisted as strings on the order-like tables.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
pub enum PurchaseOrderStatus {
    Pending,
    Approved,
    Received,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
pub enum AssemblyStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
pub enum ProductRequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn statuses_round_trip_through_their_column_text() {
        assert_eq!(AssemblyStatus::InProgress.as_ref(), "InProgress");
        assert_eq!(
            SalesOrderStatus::from_str("Delivered").unwrap(),
            SalesOrderStatus::Delivered
        );
        assert!(PurchaseOrderStatus::from_str("Shipped").is_err());
    }
}
