//! Property-based checks for the pure parts of the stock rules: the status
//! tables, the material check and the daily rollups.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use stockflow_api::{
    entities::{
        bill_of_material, product_movement, AssemblyStatus, Direction, MovementType,
        ProductRequestStatus, PurchaseOrderStatus, SalesOrderStatus,
    },
    errors::ServiceError,
    money::{line_total, round_money},
    services::{
        assemblies::check_materials,
        reports::build_daily_summaries,
        state_machine::{ensure_transition, OrderStatus},
    },
};
use strum::IntoEnumIterator;
use uuid::Uuid;

fn index_of<S: PartialEq + IntoEnumIterator>(status: S) -> usize {
    S::iter().position(|s| s == status).unwrap_or(0)
}

fn pick<S: IntoEnumIterator>(index: usize) -> S {
    let all: Vec<S> = S::iter().collect();
    let len = all.len();
    all.into_iter().nth(index % len).unwrap()
}

/// A transition succeeds exactly when the table allows it, and a rejection
/// is always `InvalidStateTransition`.
fn check_totality<S: OrderStatus + IntoEnumIterator>(from: S, to: S) -> Result<(), TestCaseError> {
    match ensure_transition(from, to) {
        Ok(()) => prop_assert!(from.can_transition_to(to)),
        Err(ServiceError::InvalidStateTransition(_)) => prop_assert!(!from.can_transition_to(to)),
        Err(other) => prop_assert!(false, "unexpected error {:?}", other),
    }
    prop_assert!(from != to || ensure_transition(from, to).is_err());
    if from.is_terminal() {
        prop_assert!(ensure_transition(from, to).is_err());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn purchase_order_transitions_are_total(a in 0usize..16, b in 0usize..16) {
        check_totality(pick::<PurchaseOrderStatus>(a), pick::<PurchaseOrderStatus>(b))?;
    }

    #[test]
    fn sales_order_transitions_are_total(a in 0usize..16, b in 0usize..16) {
        check_totality(pick::<SalesOrderStatus>(a), pick::<SalesOrderStatus>(b))?;
    }

    #[test]
    fn assembly_transitions_are_total(a in 0usize..16, b in 0usize..16) {
        check_totality(pick::<AssemblyStatus>(a), pick::<AssemblyStatus>(b))?;
    }

    #[test]
    fn product_request_transitions_are_total(a in 0usize..16, b in 0usize..16) {
        check_totality(pick::<ProductRequestStatus>(a), pick::<ProductRequestStatus>(b))?;
    }
}

proptest! {
    /// Statuses only move forward through the declared order, so any walk
    /// of allowed steps terminates within the number of statuses.
    #[test]
    fn sales_order_walks_never_revisit(choices in prop::collection::vec(0usize..4, 0..12)) {
        let mut status = SalesOrderStatus::Pending;
        let mut visited = vec![status];
        for choice in choices {
            let targets = status.allowed_targets();
            if targets.is_empty() {
                break;
            }
            let next = targets[choice % targets.len()];
            prop_assert!(index_of(next) > index_of(status) || next == SalesOrderStatus::Cancelled);
            prop_assert!(!visited.contains(&next));
            visited.push(next);
            status = next;
        }
        prop_assert!(visited.len() <= SalesOrderStatus::iter().count());
    }
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..10_000).prop_map(|n| Decimal::new(n, 2))
}

fn bom_line(product: Uuid, warehouse: Uuid, required: Decimal) -> bill_of_material::Model {
    bill_of_material::Model {
        id: Uuid::new_v4(),
        assembly_id: Uuid::nil(),
        raw_product_id: product,
        warehouse_id: warehouse,
        required_quantity: required,
        available_quantity: Decimal::ZERO,
    }
}

proptest! {
    #[test]
    fn material_check_matches_summed_requirements(
        required in prop::collection::vec((0usize..3, quantity()), 1..8),
        stock in prop::collection::vec(0i64..20_000, 3),
    ) {
        let warehouse = Uuid::new_v4();
        let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let balances: HashMap<(Uuid, Uuid), Decimal> = products
            .iter()
            .zip(&stock)
            .map(|(p, s)| ((*p, warehouse), Decimal::new(*s, 2)))
            .collect();
        let lines: Vec<_> = required
            .iter()
            .map(|(i, q)| bom_line(products[*i], warehouse, *q))
            .collect();

        let report = check_materials(Uuid::nil(), &lines, &balances);

        let covered = products.iter().all(|p| {
            let needed: Decimal = lines
                .iter()
                .filter(|l| l.raw_product_id == *p)
                .map(|l| l.required_quantity)
                .sum();
            needed <= balances[&(*p, warehouse)]
        });
        prop_assert_eq!(report.sufficient, covered);
        prop_assert_eq!(report.lines.len(), lines.len());
        for check in &report.lines {
            prop_assert!(check.shortfall >= Decimal::ZERO);
            prop_assert!(check.shortfall <= check.required);
        }
    }

    #[test]
    fn line_totals_round_to_cents(q in quantity(), price in 0i64..1_000_000) {
        let price = Decimal::new(price, 2);
        let total = line_total(q, price);
        prop_assert_eq!(total, round_money(total));
        prop_assert!(total.scale() <= 2);
    }
}

fn movement(
    product: Uuid,
    warehouse: Uuid,
    day: NaiveDate,
    direction: Direction,
    quantity: Decimal,
) -> product_movement::Model {
    let at = Utc.from_utc_datetime(&day.and_hms_opt(9, 30, 0).unwrap_or_default());
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn summaries_chain_and_agree_with_the_ledger(
        moves in prop::collection::vec((0i64..20, any::<bool>(), quantity()), 0..40),
        start in 0i64..20,
        span in 0i64..10,
    ) {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        let (product, warehouse) = (Uuid::new_v4(), Uuid::new_v4());
        let history: Vec<_> = moves
            .iter()
            .map(|(offset, inbound, q)| {
                let direction = if *inbound { Direction::In } else { Direction::Out };
                movement(product, warehouse, base + Duration::days(*offset), direction, *q)
            })
            .collect();
        let from = base + Duration::days(start);
        let to = from + Duration::days(span);

        let rows = build_daily_summaries(&history, from, to);

        let has_history = history.iter().any(|m| m.movement_date.date_naive() <= to);
        if !has_history {
            prop_assert!(rows.is_empty());
            return Ok(());
        }
        prop_assert_eq!(rows.len() as i64, span + 1);

        let before: Decimal = history
            .iter()
            .filter(|m| m.movement_date.date_naive() < from)
            .map(|m| m.signed_quantity())
            .sum();
        prop_assert_eq!(rows[0].opening_balance, before);

        for row in &rows {
            prop_assert_eq!(row.closing_balance, row.opening_balance + row.total_in - row.total_out);
        }
        for pair in rows.windows(2) {
            prop_assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
            prop_assert_eq!(pair[1].summary_date, pair[0].summary_date + Duration::days(1));
        }

        let through_to: Decimal = history
            .iter()
            .filter(|m| m.movement_date.date_naive() <= to)
            .map(|m| m.signed_quantity())
            .sum();
        prop_assert_eq!(rows[rows.len() - 1].closing_balance, through_to);
    }
}
