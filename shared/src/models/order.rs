//! Order aggregate and its status axes

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{effective_status, LaybuyStatus, LaybuyTerms, PaymentMethod};
use crate::ledger;

/// A furniture order, the aggregate root of the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// Unique order number (e.g., "ORD-2026-00042"), never reassigned
    pub order_number: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    /// Cache of the derived balance, see [`ledger::compute_balance`]
    pub balance_amount: Decimal,
    pub order_status: OrderStatus,
    pub production_status: ProductionStatus,
    pub payment_status: PaymentStatus,
    /// Method used by the most recent payment mutation
    pub payment_method: Option<PaymentMethod>,
    pub is_laybuy: bool,
    pub laybuy_status: LaybuyStatus,
    pub laybuy_terms: Option<LaybuyTerms>,
    pub laybuy_due_date: Option<NaiveDate>,
    pub laybuy_payments_made: Decimal,
    /// Present only for lay-buy orders
    pub laybuy_balance: Option<Decimal>,
    pub laybuy_notes: Option<String>,
    pub order_discount_percent: Option<Decimal>,
    pub order_discount_amount: Option<Decimal>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
    pub payment_notes: Option<String>,
    pub status_history: Vec<StatusChange>,
    /// Optimistic concurrency counter, bumped on every commit
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
}

impl Order {
    /// Money received so far: deposit plus lay-buy installments
    pub fn amount_received(&self) -> Decimal {
        ledger::amount_received(self.deposit_amount, self.laybuy_payments_made, self.is_laybuy)
    }

    /// Recompute the cached balance fields from the authoritative amounts
    pub fn recompute_balance(&mut self) {
        self.balance_amount = ledger::compute_balance(
            self.total_amount,
            self.deposit_amount,
            self.laybuy_payments_made,
            self.is_laybuy,
        );
        self.laybuy_balance = self.is_laybuy.then_some(self.balance_amount);
    }

    /// Whether the cached balance agrees with the ledger formula
    pub fn is_ledger_consistent(&self) -> bool {
        let expected = ledger::compute_balance(
            self.total_amount,
            self.deposit_amount,
            self.laybuy_payments_made,
            self.is_laybuy,
        );
        self.balance_amount == expected
            && (!self.is_laybuy || self.laybuy_balance == Some(expected))
    }

    /// Lay-buy and payment status as they read on `today`. A plan past its
    /// due date with money owed reads as overdue before any sweep records it.
    pub fn effective_statuses(&self, today: NaiveDate) -> (LaybuyStatus, PaymentStatus) {
        let laybuy = effective_status(
            self.laybuy_status,
            self.laybuy_due_date,
            today,
            self.balance_amount,
        );
        if laybuy == self.laybuy_status {
            return (laybuy, self.payment_status);
        }
        let payment = ledger::derive_payment_status(
            self.total_amount,
            self.amount_received(),
            self.balance_amount,
            laybuy,
        );
        (laybuy, payment)
    }

    /// Snapshot as it should read on `today`; nothing is recorded
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        let (laybuy, payment) = self.effective_statuses(today);
        self.laybuy_status = laybuy;
        self.payment_status = payment;
        self
    }

    /// Whether the order has reached a terminal status
    pub fn is_closed(&self) -> bool {
        self.order_status.is_terminal()
    }

    /// Whether an active lay-buy still blocks production
    pub fn awaiting_laybuy_funds(&self) -> bool {
        self.is_laybuy
            && matches!(self.laybuy_status, LaybuyStatus::Active | LaybuyStatus::Overdue)
            && self.balance_amount > Decimal::ZERO
    }
}

/// Customer details captured at order time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A single product line on an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price actually charged, after any line discount
    pub unit_price: Decimal,
    /// Pre-discount price, kept for "was/now" display only
    pub original_unit_price: Option<Decimal>,
    pub color_id: Option<Uuid>,
    pub fabric_id: Option<Uuid>,
    pub description: String,
}

impl OrderItem {
    /// `None` when quantity × price overflows
    pub fn line_total(&self) -> Option<Decimal> {
        ledger::line_total(self.quantity, self.unit_price)
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InProduction,
    OrderReady,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::OrderReady => "order_ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "in_production" => Some(OrderStatus::InProduction),
            "order_ready" => Some(OrderStatus::OrderReady),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The next status on the forward path, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::InProduction),
            OrderStatus::InProduction => Some(OrderStatus::OrderReady),
            OrderStatus::OrderReady => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Structural legality of a transition, ignoring preconditions such as
    /// deposit or production readiness
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if target == OrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Confirmed => write!(f, "Confirmed"),
            OrderStatus::InProduction => write!(f, "In Production"),
            OrderStatus::OrderReady => write!(f, "Order Ready"),
            OrderStatus::OutForDelivery => write!(f, "Out for Delivery"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Manufacturing-side readiness, independent of delivery logistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Pending,
    InProduction,
    ReadyForDelivery,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::InProduction => "in_production",
            ProductionStatus::ReadyForDelivery => "ready_for_delivery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProductionStatus::Pending),
            "in_production" => Some(ProductionStatus::InProduction),
            "ready_for_delivery" => Some(ProductionStatus::ReadyForDelivery),
            _ => None,
        }
    }

    /// Production only moves forward; steps may be skipped
    pub fn can_advance_to(&self, target: ProductionStatus) -> bool {
        target > *self
    }
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductionStatus::Pending => write!(f, "Pending"),
            ProductionStatus::InProduction => write!(f, "In Production"),
            ProductionStatus::ReadyForDelivery => write!(f, "Ready for Delivery"),
        }
    }
}

/// Payment progress of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    DepositPending,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::DepositPending => "deposit_pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "deposit_pending" => Some(PaymentStatus::DepositPending),
            "partial" => Some(PaymentStatus::Partial),
            "paid" => Some(PaymentStatus::Paid),
            "overdue" => Some(PaymentStatus::Overdue),
            _ => None,
        }
    }
}

/// Which status axis an audit entry refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusAxis {
    Order,
    Production,
    Payment,
    Laybuy,
}

/// Audit entry written on every status transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub axis: StatusAxis,
    pub from: String,
    pub to: String,
    pub actor_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

/// Generate an order number: ORD-YYYY-NNNNN
pub fn generate_order_number(year: i32, sequence: i64) -> String {
    format!("ORD-{}-{:05}", year, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let mut status = OrderStatus::Pending;
        let mut path = vec![status];
        while let Some(next) = status.next() {
            assert!(status.can_transition_to(next));
            status = next;
            path.push(status);
        }
        assert_eq!(path.len(), 6);
        assert_eq!(status, OrderStatus::Delivered);
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::InProduction));
        assert!(!OrderStatus::OrderReady.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_production_forward_only() {
        assert!(ProductionStatus::Pending.can_advance_to(ProductionStatus::InProduction));
        assert!(ProductionStatus::Pending.can_advance_to(ProductionStatus::ReadyForDelivery));
        assert!(!ProductionStatus::ReadyForDelivery.can_advance_to(ProductionStatus::Pending));
        assert!(!ProductionStatus::InProduction.can_advance_to(ProductionStatus::InProduction));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::InProduction,
            OrderStatus::OrderReady,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::from_str("shipped"), None);
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(generate_order_number(2026, 42), "ORD-2026-00042");
    }
}
