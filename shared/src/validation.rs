//! Validation utilities for orders and payments

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::ledger::{MAX_MONEY_AMOUNT, MONEY_DECIMAL_PLACES};
use crate::models::{CustomerSnapshot, OrderItem};

/// Upper bound on a single line quantity
pub const MAX_ITEM_QUANTITY: i32 = 999;

// ============================================================================
// Money Validations
// ============================================================================

/// Validate an amount fits a money column: at most cent precision and no
/// larger than [`MAX_MONEY_AMOUNT`] either way
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount.normalize().scale() > MONEY_DECIMAL_PLACES {
        return Err("Amount cannot have more than two decimal places");
    }
    if amount.abs() > MAX_MONEY_AMOUNT {
        return Err("Amount exceeds the maximum allowed");
    }
    Ok(())
}

/// Validate a money amount is not negative
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    validate_money(amount)
}

/// Validate a payment amount is strictly positive
pub fn validate_payment_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Payment amount must be greater than zero");
    }
    validate_money(amount)
}

/// Validate a deposit against the order total
pub fn validate_deposit(deposit: Decimal, total: Decimal) -> Result<(), &'static str> {
    validate_non_negative_amount(deposit)?;
    if deposit > total {
        return Err("Deposit cannot exceed the order total");
    }
    Ok(())
}

/// Validate an order discount percentage (0-100)
pub fn validate_discount_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err("Discount percentage must be between 0 and 100");
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate a single order line
pub fn validate_order_item(item: &OrderItem) -> Result<(), &'static str> {
    if item.quantity <= 0 {
        return Err("Item quantity must be greater than zero");
    }
    if item.quantity > MAX_ITEM_QUANTITY {
        return Err("Item quantity exceeds the maximum allowed");
    }
    if item.unit_price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    validate_money(item.unit_price)?;
    if let Some(original) = item.original_unit_price {
        if original < item.unit_price {
            return Err("Original unit price cannot be lower than the charged price");
        }
        validate_money(original)?;
    }
    if item.description.trim().is_empty() {
        return Err("Item description is required");
    }
    Ok(())
}

/// Validate all order lines; an order needs at least one
pub fn validate_order_items(items: &[OrderItem]) -> Result<(), &'static str> {
    if items.is_empty() {
        return Err("Order must contain at least one item");
    }
    items.iter().try_for_each(validate_order_item)
}

/// Validate the customer snapshot captured on an order
pub fn validate_customer(customer: &CustomerSnapshot) -> Result<(), &'static str> {
    if customer.name.trim().is_empty() {
        return Err("Customer name is required");
    }
    if let Some(email) = &customer.email {
        validate_email(email)?;
    }
    if let Some(phone) = &customer.phone {
        validate_phone(phone)?;
    }
    Ok(())
}

/// Validate an expected delivery date is not before the order date
pub fn validate_delivery_date(delivery: NaiveDate, order_date: NaiveDate) -> Result<(), &'static str> {
    if delivery < order_date {
        return Err("Expected delivery date cannot be in the past");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate phone number: 9-15 digits, optional leading +, common separators
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let allowed = phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (c == '+' && i == 0));
    if !allowed {
        return Err("Invalid phone number format");
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(9..=15).contains(&digits) {
        return Err("Invalid phone number format");
    }
    Ok(())
}

/// Validate a proof file reference is present and not a bare path fragment
pub fn validate_file_reference(reference: &str) -> Result<(), &'static str> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err("File reference is required");
    }
    if trimmed.contains("..") {
        return Err("File reference cannot contain relative path segments");
    }
    Ok(())
}
