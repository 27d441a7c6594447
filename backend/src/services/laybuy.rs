//! Lay-buy subsystem: conversion, installments, completion, overdue tracking

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    compute_due_date, effective_status, validate_deposit, LaybuyStatus, LaybuyTerms, Order,
    OrderStatus, RequestContext, StatusAxis,
};

use super::ledger;
use super::status::{record_change, set_order_status};
use crate::error::{AppError, AppResult};

/// Terms of a new lay-buy plan
#[derive(Debug, Clone)]
pub struct LaybuyPlan {
    pub deposit_amount: Decimal,
    pub terms: LaybuyTerms,
    pub custom_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Turn an order into a lay-buy and return the change in deposit
pub fn convert(
    order: &mut Order,
    plan: LaybuyPlan,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> AppResult<Decimal> {
    if order.is_laybuy {
        return Err(AppError::validation(
            "is_laybuy",
            format!("Order {} is already on lay-buy", order.order_number),
        ));
    }

    if !matches!(order.order_status, OrderStatus::Pending | OrderStatus::Confirmed) {
        return Err(AppError::InvalidStateTransition(format!(
            "Order {} is {} and can no longer be converted to lay-buy",
            order.order_number, order.order_status
        )));
    }

    validate_deposit(plan.deposit_amount, order.total_amount)
        .map_err(|msg| AppError::validation("deposit_amount", msg))?;

    let today = now.date_naive();
    let due_date = compute_due_date(plan.terms, today, plan.custom_due_date).ok_or_else(|| {
        AppError::validation(
            "custom_due_date",
            "Custom lay-buy terms need a due date in the future",
        )
    })?;

    order.is_laybuy = true;
    order.laybuy_terms = Some(plan.terms);
    order.laybuy_due_date = Some(due_date);
    order.laybuy_payments_made = Decimal::ZERO;
    order.laybuy_notes = plan.notes;
    let delta = ledger::set_deposit(order, plan.deposit_amount, false)?;

    set_laybuy_status(order, LaybuyStatus::Active, ctx, now);
    Ok(delta)
}

/// Apply an installment to an open plan
pub fn record_payment(
    order: &mut Order,
    amount: Decimal,
    final_settlement: bool,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !order.is_laybuy || !order.laybuy_status.is_open() {
        return Err(AppError::PreconditionFailed(format!(
            "Order {} has no open lay-buy plan (status {})",
            order.order_number,
            order.laybuy_status.as_str()
        )));
    }
    if order.order_status == OrderStatus::Cancelled {
        return Err(AppError::InvalidStateTransition(format!(
            "Order {} is cancelled",
            order.order_number
        )));
    }

    ledger::add_laybuy_payment(order, amount, final_settlement)?;

    // A cleared balance does not complete the plan; that takes an explicit command
    refresh_overdue(order, ctx, now);
    Ok(())
}

/// Close a fully paid plan and release the order to production
pub fn complete(order: &mut Order, ctx: &RequestContext, now: DateTime<Utc>) -> AppResult<()> {
    if !order.is_laybuy {
        return Err(AppError::PreconditionFailed(format!(
            "Order {} is not on lay-buy",
            order.order_number
        )));
    }
    if !order.laybuy_status.is_open() {
        return Err(AppError::InvalidStateTransition(format!(
            "Lay-buy on order {} is already {}",
            order.order_number,
            order.laybuy_status.as_str()
        )));
    }
    if order.order_status == OrderStatus::Cancelled {
        return Err(AppError::InvalidStateTransition(format!(
            "Order {} is cancelled",
            order.order_number
        )));
    }
    if order.balance_amount > Decimal::ZERO {
        return Err(AppError::PreconditionFailed(format!(
            "Lay-buy on order {} still has {} outstanding",
            order.order_number, order.balance_amount
        )));
    }

    set_laybuy_status(order, LaybuyStatus::Completed, ctx, now);

    if matches!(order.order_status, OrderStatus::Pending | OrderStatus::Confirmed) {
        set_order_status(order, OrderStatus::InProduction, ctx, now);
    }
    Ok(())
}

/// Bring the stored lay-buy status in line with the date; returns whether it
/// changed
pub fn refresh_overdue(order: &mut Order, ctx: &RequestContext, now: DateTime<Utc>) -> bool {
    let effective = effective_status(
        order.laybuy_status,
        order.laybuy_due_date,
        now.date_naive(),
        order.balance_amount,
    );
    if effective == order.laybuy_status {
        return false;
    }
    set_laybuy_status(order, effective, ctx, now);
    true
}

fn set_laybuy_status(
    order: &mut Order,
    status: LaybuyStatus,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) {
    let from = order.laybuy_status;
    if from == status {
        return;
    }
    order.laybuy_status = status;
    record_change(order, StatusAxis::Laybuy, from.as_str(), status.as_str(), ctx, now);
}
