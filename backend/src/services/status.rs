//! Order status machine
//!
//! Two axes are tracked: `order_status` follows the order from intake to
//! delivery, `production_status` follows manufacturing. The axes are
//! independent except where a rule below links them.

use chrono::{DateTime, Utc};
use shared::{Order, OrderStatus, ProductionStatus, RequestContext, StatusAxis, StatusChange};

use crate::error::{AppError, AppResult};

/// Append an audit entry and stamp the transition time
pub fn record_change(
    order: &mut Order,
    axis: StatusAxis,
    from: &str,
    to: &str,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) {
    order.status_history.push(StatusChange {
        axis,
        from: from.to_string(),
        to: to.to_string(),
        actor_id: Some(ctx.actor_id),
        at: now,
    });
    order.status_updated_at = now;
}

/// Move `order_status` to `target`, enforcing structural legality and
/// business preconditions
pub fn transition_order_status(
    order: &mut Order,
    target: OrderStatus,
    override_deposit: bool,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let current = order.order_status;

    if !current.can_transition_to(target) {
        return Err(AppError::InvalidStateTransition(format!(
            "Order {} cannot move from {} to {}",
            order.order_number, current, target
        )));
    }

    match target {
        OrderStatus::Confirmed => check_confirmable(order, override_deposit, ctx)?,
        OrderStatus::InProduction => check_fully_funded(order)?,
        OrderStatus::OutForDelivery => {
            if order.production_status != ProductionStatus::ReadyForDelivery {
                return Err(AppError::InvalidStateTransition(format!(
                    "Order {} cannot go out for delivery while production is {}",
                    order.order_number, order.production_status
                )));
            }
        }
        _ => {}
    }

    set_order_status(order, target, ctx, now);
    Ok(())
}

/// Advance `production_status`, pulling `order_status` along where the
/// two axes are linked
pub fn advance_production_status(
    order: &mut Order,
    target: ProductionStatus,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if order.is_closed() {
        return Err(AppError::InvalidStateTransition(format!(
            "Order {} is {}; production can no longer change",
            order.order_number, order.order_status
        )));
    }

    let current = order.production_status;
    if !current.can_advance_to(target) {
        return Err(AppError::InvalidStateTransition(format!(
            "Production cannot move from {} to {}",
            current, target
        )));
    }

    if order.order_status == OrderStatus::Pending {
        return Err(AppError::PreconditionFailed(format!(
            "Order {} must be confirmed before production starts",
            order.order_number
        )));
    }
    check_fully_funded(order)?;

    order.production_status = target;
    record_change(
        order,
        StatusAxis::Production,
        current.as_str(),
        target.as_str(),
        ctx,
        now,
    );

    if order.order_status == OrderStatus::Confirmed {
        set_order_status(order, OrderStatus::InProduction, ctx, now);
    }
    if target == ProductionStatus::ReadyForDelivery
        && order.order_status == OrderStatus::InProduction
    {
        set_order_status(order, OrderStatus::OrderReady, ctx, now);
    }

    Ok(())
}

/// Unconditionally set `order_status` and write the audit entry. Callers are
/// responsible for legality.
pub fn set_order_status(
    order: &mut Order,
    target: OrderStatus,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) {
    let from = order.order_status;
    if from == target {
        return;
    }
    order.order_status = target;
    record_change(order, StatusAxis::Order, from.as_str(), target.as_str(), ctx, now);
}

fn check_confirmable(order: &Order, override_deposit: bool, ctx: &RequestContext) -> AppResult<()> {
    if order.items.is_empty() {
        return Err(AppError::PreconditionFailed(
            "An order needs at least one item before it can be confirmed".to_string(),
        ));
    }

    if order.deposit_amount > rust_decimal::Decimal::ZERO {
        return Ok(());
    }

    if override_deposit {
        if !ctx.role.can_override() {
            return Err(AppError::Forbidden(
                "Only managers can confirm an order without a deposit".to_string(),
            ));
        }
        tracing::info!(
            order_id = %order.id,
            actor = %ctx.actor_name,
            "Deposit requirement overridden on confirmation"
        );
        return Ok(());
    }

    Err(AppError::PreconditionFailed(format!(
        "Order {} needs a deposit before it can be confirmed",
        order.order_number
    )))
}

fn check_fully_funded(order: &Order) -> AppResult<()> {
    if order.awaiting_laybuy_funds() {
        return Err(AppError::PreconditionFailed(format!(
            "Lay-buy on order {} still has {} outstanding; complete it before production",
            order.order_number, order.balance_amount
        )));
    }
    Ok(())
}
