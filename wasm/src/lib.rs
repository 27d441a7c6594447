//! WebAssembly module for the Furniture Order Engine
//!
//! Provides client-side previews for:
//! - Order totals and balances
//! - Lay-buy due dates and overdue checks
//! - Input validation before a command is sent
//!
//! Money crosses the boundary as decimal strings so no value passes through
//! a float.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("order engine preview module loaded"));
}

/// Today's date in the browser's clock, as YYYY-MM-DD (UTC)
#[wasm_bindgen]
pub fn current_date() -> String {
    let iso: String = js_sys::Date::new_0().to_iso_string().into();
    iso.chars().take(10).collect()
}

fn parse_money(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, JsValue> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

/// Order total from a JSON array of items and an optional discount amount
#[wasm_bindgen]
pub fn calculate_order_total(items_json: &str, discount_amount: Option<String>) -> Result<String, JsValue> {
    let items: Vec<OrderItem> = serde_json::from_str(items_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid items JSON: {}", e)))?;
    let discount = discount_amount
        .as_deref()
        .map(|d| parse_money("discount_amount", d))
        .transpose()?;

    shared::ledger::compute_total(&items, discount)
        .map(|total| total.to_string())
        .ok_or_else(|| JsValue::from_str("Order total exceeds the maximum allowed"))
}

/// Outstanding balance; negative values are customer credit
#[wasm_bindgen]
pub fn calculate_balance(
    total: &str,
    deposit: &str,
    laybuy_payments: &str,
    is_laybuy: bool,
) -> Result<String, JsValue> {
    let balance = shared::ledger::compute_balance(
        parse_money("total", total)?,
        parse_money("deposit", deposit)?,
        parse_money("laybuy_payments", laybuy_payments)?,
        is_laybuy,
    );
    Ok(balance.to_string())
}

/// Due date (YYYY-MM-DD) for lay-buy terms starting today
#[wasm_bindgen]
pub fn calculate_laybuy_due_date(
    terms: &str,
    today: &str,
    custom_due_date: Option<String>,
) -> Result<String, JsValue> {
    let terms = LaybuyTerms::from_str(terms)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown lay-buy terms '{}'", terms)))?;
    let today = parse_date("today", today)?;
    let custom = custom_due_date
        .as_deref()
        .map(|d| parse_date("custom_due_date", d))
        .transpose()?;

    compute_due_date(terms, today, custom)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| JsValue::from_str("Custom lay-buy terms need a due date in the future"))
}

/// Whether a plan with this due date and balance is overdue on `today`
#[wasm_bindgen]
pub fn check_laybuy_overdue(due_date: &str, today: &str, balance: &str) -> Result<bool, JsValue> {
    Ok(is_overdue(
        Some(parse_date("due_date", due_date)?),
        parse_date("today", today)?,
        parse_money("balance", balance)?,
    ))
}

/// Validate a lay-buy deposit; returns an error message or nothing
#[wasm_bindgen]
pub fn check_deposit(deposit: &str, total: &str) -> Result<Option<String>, JsValue> {
    let result = validate_deposit(parse_money("deposit", deposit)?, parse_money("total", total)?);
    Ok(result.err().map(str::to_string))
}
