//! Order ledger: money mutations and the ledger entries they produce
//!
//! Every function here works on a working copy of the order. Nothing is
//! persisted until the calling service commits the copy together with the
//! entries, so an error at any step leaves the stored order untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    ledger::{self, MAX_MONEY_AMOUNT},
    validate_discount_percent, validate_non_negative_amount, validate_payment_amount, Order, PaymentMethod, PaymentStatus, PaymentTransaction, RequestContext, StatusAxis,
    TransactionKind,
};
use uuid::Uuid;

use super::status::record_change;
use crate::error::{AppError, AppResult};

/// Descriptive fields of a ledger entry
#[derive(Debug, Clone)]
pub struct EntryDetails {
    pub kind: TransactionKind,
    pub payment_method: Option<PaymentMethod>,
    pub proof_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
}

impl EntryDetails {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            payment_method: None,
            proof_id: None,
            idempotency_key: None,
            notes: None,
        }
    }

    pub fn paid_with(mut self, method: PaymentMethod, proof_id: Option<Uuid>) -> Self {
        self.payment_method = Some(method);
        self.proof_id = proof_id;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// Order-level discount, either as a percentage or a fixed amount
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discount {
    Percent(Decimal),
    Amount(Decimal),
}

/// Build the ledger entry for a mutation already applied to `order`
pub fn entry(
    order: &Order,
    ctx: &RequestContext,
    now: DateTime<Utc>,
    amount_delta: Decimal,
    total_delta: Decimal,
    details: EntryDetails,
) -> PaymentTransaction {
    PaymentTransaction {
        id: Uuid::new_v4(),
        order_id: order.id,
        actor_id: ctx.actor_id,
        kind: details.kind,
        payment_method: details.payment_method,
        amount_delta,
        total_delta,
        new_balance: order.balance_amount,
        payment_status: order.payment_status,
        proof_id: details.proof_id,
        idempotency_key: details.idempotency_key,
        notes: details.notes,
        created_at: now,
    }
}

/// Replace the deposit and return the signed change.
///
/// Fails when the result would leave a negative balance, unless the caller
/// marks the payment as a final settlement; the excess then stays on the
/// order as customer credit.
pub fn set_deposit(order: &mut Order, new_deposit: Decimal, final_settlement: bool) -> AppResult<Decimal> {
    validate_non_negative_amount(new_deposit)
        .map_err(|msg| AppError::validation("deposit_amount", msg))?;

    let delta = new_deposit - order.deposit_amount;
    if !final_settlement && delta > Decimal::ZERO && delta > order.balance_amount {
        return Err(AppError::validation(
            "deposit_amount",
            format!(
                "Deposit of {} would exceed the outstanding balance of {}",
                new_deposit, order.balance_amount
            ),
        ));
    }

    order.deposit_amount = new_deposit;
    order.recompute_balance();
    Ok(delta)
}

/// Add a lay-buy installment to the order
pub fn add_laybuy_payment(order: &mut Order, amount: Decimal, final_settlement: bool) -> AppResult<()> {
    validate_payment_amount(amount).map_err(|msg| AppError::validation("amount", msg))?;

    if !final_settlement && amount > order.balance_amount {
        return Err(AppError::validation(
            "amount",
            format!(
                "Payment of {} exceeds the outstanding balance of {}",
                amount, order.balance_amount
            ),
        ));
    }

    order.laybuy_payments_made = order
        .laybuy_payments_made
        .checked_add(amount)
        .filter(|paid| *paid <= MAX_MONEY_AMOUNT)
        .ok_or_else(|| {
            AppError::validation("amount", "Lay-buy payments would exceed the maximum allowed")
        })?;
    order.recompute_balance();
    Ok(())
}

/// Replace the order total and return the signed change
pub fn set_total(order: &mut Order, new_total: Decimal) -> AppResult<Decimal> {
    validate_non_negative_amount(new_total)
        .map_err(|msg| AppError::validation("total_amount", msg))?;

    if new_total < order.amount_received() {
        return Err(AppError::validation(
            "total_amount",
            format!(
                "New total of {} is below the {} already received",
                new_total,
                order.amount_received()
            ),
        ));
    }

    let delta = new_total - order.total_amount;
    order.total_amount = new_total;
    order.recompute_balance();
    Ok(delta)
}

/// Recompute the total from the items and the stored order discount
pub fn retotal_from_items(order: &mut Order) -> AppResult<Decimal> {
    if let Some(percent) = order.order_discount_percent {
        let subtotal = checked_subtotal(order)?;
        order.order_discount_amount = Some(ledger::discount_amount_from_percent(subtotal, percent));
    }
    let new_total = checked_total(order, order.order_discount_amount)?;
    set_total(order, new_total)
}

fn checked_subtotal(order: &Order) -> AppResult<Decimal> {
    ledger::items_subtotal(&order.items)
        .filter(|subtotal| *subtotal <= MAX_MONEY_AMOUNT)
        .ok_or_else(|| AppError::validation("items", "Order total exceeds the maximum allowed"))
}

fn checked_total(order: &Order, discount: Option<Decimal>) -> AppResult<Decimal> {
    ledger::compute_total(&order.items, discount)
        .ok_or_else(|| AppError::validation("items", "Order total exceeds the maximum allowed"))
}

/// Apply an order-level discount and return the change in total
pub fn apply_discount(order: &mut Order, discount: Discount) -> AppResult<Decimal> {
    let subtotal = checked_subtotal(order)?;

    let (percent, amount) = match discount {
        Discount::Percent(percent) => {
            validate_discount_percent(percent)
                .map_err(|msg| AppError::validation("percent", msg))?;
            (percent, ledger::discount_amount_from_percent(subtotal, percent))
        }
        Discount::Amount(amount) => {
            validate_non_negative_amount(amount)
                .map_err(|msg| AppError::validation("amount", msg))?;
            if amount > subtotal {
                return Err(AppError::validation(
                    "amount",
                    "Discount cannot exceed the order subtotal",
                ));
            }
            (ledger::percent_of(subtotal, amount), amount)
        }
    };

    order.order_discount_percent = Some(percent);
    order.order_discount_amount = Some(amount);
    let new_total = checked_total(order, Some(amount))?;
    set_total(order, new_total)
}

/// Derive the payment status from the ledger and record it if it changed
pub fn refresh_payment_status(order: &mut Order, ctx: &RequestContext, now: DateTime<Utc>) {
    let derived = ledger::derive_payment_status(
        order.total_amount,
        order.amount_received(),
        order.balance_amount,
        order.laybuy_status,
    );
    set_payment_status(order, derived, ctx, now);
}

/// Accept a caller-stated payment status, refusing `paid` while money is owed
pub fn set_explicit_payment_status(
    order: &mut Order,
    status: PaymentStatus,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if status == PaymentStatus::Paid && order.balance_amount > Decimal::ZERO {
        return Err(AppError::validation(
            "payment_status",
            format!(
                "Order cannot be marked paid with an outstanding balance of {}",
                order.balance_amount
            ),
        ));
    }
    set_payment_status(order, status, ctx, now);
    Ok(())
}

fn set_payment_status(
    order: &mut Order,
    status: PaymentStatus,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) {
    if order.payment_status != status {
        let from = order.payment_status;
        order.payment_status = status;
        record_change(order, StatusAxis::Payment, from.as_str(), status.as_str(), ctx, now);
    }
}
