//! Order and production status tests
//!
//! Tests for the status machine including:
//! - Deposit gate on confirmation and the manager override
//! - Production readiness gate on delivery
//! - Linked order/production transitions
//! - Edits, discounts and explicit payment status

mod common;

use common::*;
use order_engine_backend::{
    services::{Discount, UpdateOrderInput, UpdateOrderStatusInput, UpdateProductionStatusInput},
    AppError, AppResult,
};
use shared::{
    Order, OrderStatus, PaymentStatus, ProductionStatus, RequestContext, StatusAxis,
    TransactionKind,
};
use uuid::Uuid;

async fn move_to(
    h: &Harness,
    ctx: &RequestContext,
    order_id: Uuid,
    status: OrderStatus,
) -> AppResult<Order> {
    h.service
        .update_order_status(
            ctx,
            order_id,
            UpdateOrderStatusInput {
                status,
                override_deposit: false,
            },
        )
        .await
}

async fn produce(h: &Harness, order_id: Uuid, status: ProductionStatus) -> AppResult<Order> {
    h.service
        .update_production_status(&staff(), order_id, UpdateProductionStatusInput { status })
        .await
}

/// Pending order of 1000 with a 200 cash deposit
async fn deposited_order(h: &Harness) -> Order {
    let order = order_with_total(h, "1000").await;
    h.service
        .update_payment(&staff(), order.id, cash_deposit("200"))
        .await
        .unwrap()
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_new_order_defaults() {
    let h = harness();
    let order = h
        .service
        .create_order(&staff(), create_input(vec![item(2, "450.00"), item(1, "100")]))
        .await
        .unwrap();

    assert_eq!(order.order_number, "ORD-2026-00001");
    assert_eq!(order.total_amount, dec("1000.00"));
    assert_eq!(order.balance_amount, dec("1000.00"));
    assert_eq!(order.deposit_amount, dec("0"));
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.production_status, ProductionStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::DepositPending);
    assert!(!order.is_laybuy);
    assert_eq!(order.laybuy_balance, None);

    let next = order_with_total(&h, "10").await;
    assert_eq!(next.order_number, "ORD-2026-00002");
}

#[tokio::test]
async fn test_create_requires_items_and_customer() {
    let h = harness();

    let empty = h.service.create_order(&staff(), create_input(vec![])).await;
    assert!(matches!(empty, Err(AppError::Validation { .. })));

    let mut input = create_input(vec![item(1, "100")]);
    input.customer.name = "  ".to_string();
    let nameless = h.service.create_order(&staff(), input).await;
    assert!(matches!(nameless, Err(AppError::Validation { .. })));
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn test_confirm_requires_deposit() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let result = move_to(&h, &staff(), order.id, OrderStatus::Confirmed).await;
    assert!(matches!(result, Err(AppError::PreconditionFailed(_))));

    h.service
        .update_payment(&staff(), order.id, cash_deposit("200"))
        .await
        .unwrap();
    let order = move_to(&h, &staff(), order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_deposit_override_is_manager_only() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;
    let input = |override_deposit| UpdateOrderStatusInput {
        status: OrderStatus::Confirmed,
        override_deposit,
    };

    let staff_override = h
        .service
        .update_order_status(&staff(), order.id, input(true))
        .await;
    assert!(matches!(staff_override, Err(AppError::Forbidden(_))));

    let order = h
        .service
        .update_order_status(&manager(), order.id, input(true))
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    assert_eq!(order.deposit_amount, dec("0"));
}

#[tokio::test]
async fn test_cannot_skip_ahead() {
    let h = harness();
    let order = deposited_order(&h).await;

    let result = move_to(&h, &staff(), order.id, OrderStatus::InProduction).await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
}

// ============================================================================
// Delivery gate
// ============================================================================

#[tokio::test]
async fn test_out_for_delivery_needs_production_ready() {
    let h = harness();
    let order = deposited_order(&h).await;
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::InProduction,
        OrderStatus::OrderReady,
    ] {
        move_to(&h, &staff(), order.id, status).await.unwrap();
    }

    let blocked = move_to(&h, &staff(), order.id, OrderStatus::OutForDelivery).await;
    assert!(matches!(blocked, Err(AppError::InvalidStateTransition(_))));

    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored.order_status, OrderStatus::OrderReady);
    assert_eq!(stored.production_status, ProductionStatus::Pending);

    produce(&h, order.id, ProductionStatus::ReadyForDelivery)
        .await
        .unwrap();
    let order = move_to(&h, &staff(), order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::OutForDelivery);

    let order = move_to(&h, &staff(), order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert!(order.is_closed());
}

#[tokio::test]
async fn test_delivered_order_is_final() {
    let h = harness();
    let order = deposited_order(&h).await;
    move_to(&h, &staff(), order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    produce(&h, order.id, ProductionStatus::ReadyForDelivery)
        .await
        .unwrap();
    move_to(&h, &staff(), order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();
    move_to(&h, &staff(), order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    let cancel = move_to(&h, &staff(), order.id, OrderStatus::Cancelled).await;
    assert!(matches!(cancel, Err(AppError::InvalidStateTransition(_))));

    let back = move_to(&h, &staff(), order.id, OrderStatus::Confirmed).await;
    assert!(matches!(back, Err(AppError::InvalidStateTransition(_))));
}

// ============================================================================
// Production
// ============================================================================

#[tokio::test]
async fn test_production_waits_for_confirmation() {
    let h = harness();
    let order = deposited_order(&h).await;

    let result = produce(&h, order.id, ProductionStatus::InProduction).await;
    assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
}

#[tokio::test]
async fn test_production_pulls_order_status_along() {
    let h = harness();
    let order = deposited_order(&h).await;
    move_to(&h, &staff(), order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let order = produce(&h, order.id, ProductionStatus::InProduction)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::InProduction);

    let order = produce(&h, order.id, ProductionStatus::ReadyForDelivery)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::OrderReady);

    let backwards = produce(&h, order.id, ProductionStatus::InProduction).await;
    assert!(matches!(backwards, Err(AppError::InvalidStateTransition(_))));

    let production_changes = order
        .status_history
        .iter()
        .filter(|change| change.axis == StatusAxis::Production)
        .count();
    assert_eq!(production_changes, 2);
}

#[tokio::test]
async fn test_cancelled_order_rejects_changes() {
    let h = harness();
    let order = deposited_order(&h).await;
    let order = move_to(&h, &staff(), order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Cancelled);

    let production = produce(&h, order.id, ProductionStatus::InProduction).await;
    assert!(matches!(production, Err(AppError::InvalidStateTransition(_))));

    let payment = h
        .service
        .update_payment(&staff(), order.id, cash_deposit("300"))
        .await;
    assert!(matches!(payment, Err(AppError::InvalidStateTransition(_))));
}

// ============================================================================
// Edits, discounts, explicit payment status
// ============================================================================

#[tokio::test]
async fn test_items_editable_only_while_pending() {
    let h = harness();
    let order = deposited_order(&h).await;

    let order = h
        .service
        .update_order(
            &staff(),
            order.id,
            UpdateOrderInput {
                items: Some(vec![item(1, "1000"), item(1, "250")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(order.total_amount, dec("1250"));
    assert_eq!(order.balance_amount, dec("1050"));

    let entries = h.service.list_transactions(order.id).await.unwrap();
    let adjustment = entries
        .iter()
        .find(|e| e.kind == TransactionKind::TotalAdjustment)
        .unwrap();
    assert_eq!(adjustment.total_delta, dec("250"));
    assert_eq!(adjustment.amount_delta, dec("0"));

    move_to(&h, &staff(), order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    let locked = h
        .service
        .update_order(
            &staff(),
            order.id,
            UpdateOrderInput {
                items: Some(vec![item(1, "10")]),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(locked, Err(AppError::PreconditionFailed(_))));

    let notes = h
        .service
        .update_order(
            &staff(),
            order.id,
            UpdateOrderInput {
                admin_notes: Some("Deliver after 14:00".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(notes.admin_notes.as_deref(), Some("Deliver after 14:00"));
}

#[tokio::test]
async fn test_discount_is_manager_only_and_adjusts_total() {
    let h = harness();
    let order = deposited_order(&h).await;

    let staff_attempt = h
        .service
        .apply_discount(&staff(), order.id, Discount::Percent(dec("10")))
        .await;
    assert!(matches!(staff_attempt, Err(AppError::Forbidden(_))));

    let order = h
        .service
        .apply_discount(&manager(), order.id, Discount::Percent(dec("10")))
        .await
        .unwrap();
    assert_eq!(order.total_amount, dec("900"));
    assert_eq!(order.balance_amount, dec("700"));
    assert_eq!(order.order_discount_amount, Some(dec("100")));
}

#[tokio::test]
async fn test_discount_cannot_drop_total_below_received() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;
    h.service
        .update_payment(&staff(), order.id, cash_deposit("950"))
        .await
        .unwrap();

    let result = h
        .service
        .apply_discount(&manager(), order.id, Discount::Amount(dec("100")))
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_explicit_paid_status_needs_zero_balance() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let mut input = cash_deposit("200");
    input.payment_status = Some(PaymentStatus::Paid);
    let result = h.service.update_payment(&staff(), order.id, input).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));

    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored.deposit_amount, dec("0"));
}

#[tokio::test]
async fn test_balance_only_update_sets_deposit() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let mut input = cash_deposit("0");
    input.deposit_amount = None;
    input.balance_amount = Some(dec("600"));
    let order = h
        .service
        .update_payment(&staff(), order.id, input)
        .await
        .unwrap();

    assert_eq!(order.deposit_amount, dec("400"));
    assert_eq!(order.balance_amount, dec("600"));
    assert_eq!(order.payment_status, PaymentStatus::Partial);
}
