//! Payment ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentStatus;

/// Accepted payment methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    /// Electronic funds transfer, needs an uploaded proof of payment
    Eft,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Eft => "eft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "eft" => Some(PaymentMethod::Eft),
            _ => None,
        }
    }

    /// Whether a payment with this method must reference a payment proof
    pub fn requires_proof(&self) -> bool {
        matches!(self, PaymentMethod::Eft)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Eft => write!(f, "EFT"),
        }
    }
}

/// An uploaded document evidencing a payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentProof {
    pub id: Uuid,
    /// Owning order; a proof is never moved to another order
    pub order_id: Uuid,
    pub file_reference: String,
    pub amount: Option<Decimal>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

/// What a ledger entry records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Deposit set or changed
    Deposit,
    /// Lay-buy installment
    LaybuyPayment,
    /// Order total changed (items edited or discount applied)
    TotalAdjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::LaybuyPayment => "laybuy_payment",
            TransactionKind::TotalAdjustment => "total_adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "laybuy_payment" => Some(TransactionKind::LaybuyPayment),
            "total_adjustment" => Some(TransactionKind::TotalAdjustment),
            _ => None,
        }
    }
}

/// Immutable ledger entry appended for every money mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: Uuid,
    /// User who performed the mutation
    pub actor_id: Uuid,
    pub kind: TransactionKind,
    pub payment_method: Option<PaymentMethod>,
    /// Signed change of money received
    pub amount_delta: Decimal,
    /// Signed change of the order total; zero for payments
    pub total_delta: Decimal,
    /// Order balance after this entry was applied
    pub new_balance: Decimal,
    pub payment_status: PaymentStatus,
    pub proof_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Replay a ledger: total money received across all entries
pub fn sum_amount_deltas(transactions: &[PaymentTransaction]) -> Decimal {
    transactions.iter().map(|t| t.amount_delta).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_eft_requires_proof() {
        assert!(PaymentMethod::Eft.requires_proof());
        assert!(!PaymentMethod::Cash.requires_proof());
        assert!(!PaymentMethod::Card.requires_proof());
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::from_str("eft"), Some(PaymentMethod::Eft));
        assert_eq!(PaymentMethod::from_str("EFT"), None);
        assert_eq!(PaymentMethod::Eft.to_string(), "EFT");
    }
}
