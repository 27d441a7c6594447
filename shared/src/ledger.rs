//! Order ledger arithmetic
//!
//! Pure functions shared by the backend engine and the WASM preview module.
//! All money values are `Decimal` and rounded to two places where a rate is
//! applied.

use rust_decimal::Decimal;

use crate::models::{LaybuyStatus, OrderItem, PaymentStatus};

/// Money is kept at cent precision
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Largest amount a money column holds: `NUMERIC(14,2)`
pub const MAX_MONEY_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Total for one line: quantity × charged unit price, `None` on overflow.
///
/// `original_unit_price` never enters this formula; the charged price already
/// reflects any line discount.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(unit_price)
}

/// Sum of all line totals, `None` on overflow
pub fn items_subtotal(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
}

/// Convert an order discount percentage into an amount off `subtotal`
pub fn discount_amount_from_percent(subtotal: Decimal, percent: Decimal) -> Decimal {
    (subtotal * percent / Decimal::ONE_HUNDRED).round_dp(MONEY_DECIMAL_PLACES)
}

/// Order total after the order-level discount, never below zero.
///
/// `None` when the items overflow or the total does not fit a money column.
pub fn compute_total(items: &[OrderItem], order_discount_amount: Option<Decimal>) -> Option<Decimal> {
    let subtotal = items_subtotal(items)?;
    let discounted = subtotal.checked_sub(order_discount_amount.unwrap_or(Decimal::ZERO))?;
    Some(discounted.max(Decimal::ZERO)).filter(|total| *total <= MAX_MONEY_AMOUNT)
}

/// Money received: the deposit, plus installments for lay-buy orders
pub fn amount_received(deposit: Decimal, laybuy_payments: Decimal, is_laybuy: bool) -> Decimal {
    if is_laybuy {
        deposit + laybuy_payments
    } else {
        deposit
    }
}

/// `total − deposit − (is_laybuy ? laybuy_payments : 0)`
///
/// A negative result is a customer credit left by a final settlement.
pub fn compute_balance(
    total: Decimal,
    deposit: Decimal,
    laybuy_payments: Decimal,
    is_laybuy: bool,
) -> Decimal {
    total - amount_received(deposit, laybuy_payments, is_laybuy)
}

/// Payment status implied by the ledger
pub fn derive_payment_status(
    total: Decimal,
    received: Decimal,
    balance: Decimal,
    laybuy_status: LaybuyStatus,
) -> PaymentStatus {
    if balance <= Decimal::ZERO && total > Decimal::ZERO {
        PaymentStatus::Paid
    } else if laybuy_status == LaybuyStatus::Overdue {
        PaymentStatus::Overdue
    } else if received > Decimal::ZERO {
        PaymentStatus::Partial
    } else if total > Decimal::ZERO {
        PaymentStatus::DepositPending
    } else {
        PaymentStatus::Pending
    }
}

/// `part` as a percentage of `total`
pub fn percent_of(total: Decimal, part: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        (part / total * Decimal::ONE_HUNDRED).round_dp(MONEY_DECIMAL_PLACES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(quantity: i32, unit_price: &str, original: Option<&str>) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: dec(unit_price),
            original_unit_price: original.map(dec),
            color_id: None,
            fabric_id: None,
            description: "Oak dining chair".to_string(),
        }
    }

    #[test]
    fn test_total_uses_discounted_unit_price() {
        let items = vec![item(2, "450.00", Some("500.00")), item(1, "1200.00", None)];
        assert_eq!(items_subtotal(&items), Some(dec("2100.00")));
        assert_eq!(compute_total(&items, None), Some(dec("2100.00")));
    }

    #[test]
    fn test_order_discount_reduces_total() {
        let items = vec![item(1, "1000.00", None)];
        let discount = discount_amount_from_percent(dec("1000.00"), dec("12.5"));
        assert_eq!(discount, dec("125.00"));
        assert_eq!(compute_total(&items, Some(discount)), Some(dec("875.00")));
    }

    #[test]
    fn test_total_never_negative() {
        let items = vec![item(1, "100.00", None)];
        assert_eq!(compute_total(&items, Some(dec("150.00"))), Some(Decimal::ZERO));
    }

    #[test]
    fn test_max_money_amount_matches_column() {
        assert_eq!(MAX_MONEY_AMOUNT, dec("999999999999.99"));
    }

    #[test]
    fn test_overflowing_items_have_no_total() {
        assert_eq!(line_total(2, Decimal::MAX), None);

        let items = vec![item(1, "1", None), item(1, "1", None)];
        let mut huge = items.clone();
        huge[0].unit_price = Decimal::MAX;
        assert_eq!(items_subtotal(&huge), None);
        assert_eq!(compute_total(&huge, None), None);

        let mut too_large = items;
        too_large[0].unit_price = dec("999999999999.99");
        assert_eq!(compute_total(&too_large, None), None);
    }

    #[test]
    fn test_balance_formula() {
        assert_eq!(compute_balance(dec("1000"), dec("200"), dec("300"), false), dec("800"));
        assert_eq!(compute_balance(dec("1000"), dec("200"), dec("300"), true), dec("500"));
    }

    #[test]
    fn test_derive_payment_status() {
        let none = LaybuyStatus::None;
        assert_eq!(
            derive_payment_status(dec("1000"), Decimal::ZERO, dec("1000"), none),
            PaymentStatus::DepositPending
        );
        assert_eq!(
            derive_payment_status(dec("1000"), dec("200"), dec("800"), none),
            PaymentStatus::Partial
        );
        assert_eq!(
            derive_payment_status(dec("1000"), dec("1000"), Decimal::ZERO, none),
            PaymentStatus::Paid
        );
        assert_eq!(
            derive_payment_status(dec("1000"), dec("200"), dec("800"), LaybuyStatus::Overdue),
            PaymentStatus::Overdue
        );
        assert_eq!(
            derive_payment_status(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, none),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec("1000"), dec("250")), dec("25.00"));
        assert_eq!(percent_of(Decimal::ZERO, dec("10")), Decimal::ZERO);
    }
}
