//! Allowed status transitions for every order-like document.
//!
//! No state may be skipped, and terminal states accept nothing.

use crate::entities::{AssemblyStatus, ProductRequestStatus, PurchaseOrderStatus, SalesOrderStatus};
use crate::errors::ServiceError;
use serde::Deserialize;
use std::fmt::Display;
use validator::Validate;

/// Optional inputs accompanying a status change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TransitionRequest {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Version the caller last read; a mismatch fails with `StateConflict`.
    pub expected_version: Option<i32>,
}

impl TransitionRequest {
    pub fn with_notes(notes: Option<String>) -> Self {
        Self {
            notes,
            expected_version: None,
        }
    }
}

/// Rejects a caller that acted on a stale read of the document.
pub fn ensure_version(what: &str, current: i32, expected: Option<i32>) -> Result<(), ServiceError> {
    match expected {
        Some(expected) if expected != current => {
            metrics::counter!("stockflow_state_conflicts_total", 1);
            Err(ServiceError::StateConflict(format!(
                "{} is at version {}, caller expected {}",
                what, current, expected
            )))
        }
        _ => Ok(()),
    }
}

pub trait OrderStatus: Copy + PartialEq + Display + 'static {
    /// Statuses reachable in one step from `self`.
    fn allowed_targets(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    fn can_transition_to(&self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl OrderStatus for PurchaseOrderStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use PurchaseOrderStatus::*;
        match self {
            Pending => &[Approved, Cancelled],
            Approved => &[Received, Cancelled],
            Received | Cancelled => &[],
        }
    }
}

impl OrderStatus for SalesOrderStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use SalesOrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }
}

impl OrderStatus for AssemblyStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use AssemblyStatus::*;
        match self {
            Pending => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl OrderStatus for ProductRequestStatus {
    fn allowed_targets(&self) -> &'static [Self] {
        use ProductRequestStatus::*;
        match self {
            Pending => &[Approved, Rejected],
            Approved => &[Completed],
            Rejected | Completed => &[],
        }
    }
}

pub fn ensure_transition<S: OrderStatus>(from: S, to: S) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    let reason = if from.is_terminal() {
        format!("{} is terminal; cannot move to {}", from, to)
    } else {
        format!("cannot move from {} to {}", from, to)
    };
    Err(ServiceError::InvalidStateTransition(reason))
}
