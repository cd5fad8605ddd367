//! Fixed-point arithmetic helpers.
//!
//! Monetary amounts are rounded half-away-from-zero ("round half up" for
//! positive values) to 2 decimal places. Quantities are rounded the same way
//! to 4 decimal places, matching the `Decimal(16, 4)` quantity columns.
//! Rounding happens explicitly at the point a value is computed, never
//! implicitly by the storage column.

use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 2;
pub const QUANTITY_SCALE: u32 = 4;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total = quantity × unit price, rounded as money.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_money(quantity * unit_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_rounds_half_up() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn quantity_keeps_four_places() {
        assert_eq!(round_quantity(dec!(1.23456)), dec!(1.2346));
    }

    #[test]
    fn line_total_is_rounded_once() {
        assert_eq!(line_total(dec!(3), dec!(0.335)), dec!(1.01));
        assert_eq!(line_total(dec!(2.5), dec!(4.10)), dec!(10.25));
    }
}
