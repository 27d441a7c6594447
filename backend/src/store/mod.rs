//! Persistence for orders, ledger entries and payment proofs

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{Order, OrderFilter, Pagination, PaymentProof, PaymentTransaction};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Storage seam for the order engine.
///
/// `commit` is the only write path for an existing order: it must persist the
/// new snapshot and append the ledger entries as one atomic unit, and must
/// refuse the write with `ConcurrencyConflict` when the stored version no
/// longer equals `expected_version`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Next order number sequence for a calendar year, starting at 1
    async fn next_order_sequence(&self, year: i32) -> AppResult<i64>;

    async fn insert_order(&self, order: &Order) -> AppResult<()>;

    async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>>;

    /// Orders matching `filter`, newest first. Status filters match the
    /// statuses as they read on `today`, not the stored ones.
    async fn list_orders(
        &self,
        filter: &OrderFilter,
        today: NaiveDate,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Ids of orders whose lay-buy plan is active or overdue
    async fn list_open_laybuy_ids(&self) -> AppResult<Vec<Uuid>>;

    async fn commit(
        &self,
        order: &Order,
        expected_version: i64,
        transactions: &[PaymentTransaction],
    ) -> AppResult<()>;

    /// Ledger entries for an order, oldest first
    async fn list_transactions(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>>;

    async fn find_transaction_by_key(
        &self,
        order_id: Uuid,
        idempotency_key: &str,
    ) -> AppResult<Option<PaymentTransaction>>;

    async fn insert_proof(&self, proof: &PaymentProof) -> AppResult<()>;

    async fn get_proof(&self, proof_id: Uuid) -> AppResult<Option<PaymentProof>>;

    async fn list_proofs(&self, order_id: Uuid) -> AppResult<Vec<PaymentProof>>;

    /// Connectivity check for health reporting
    async fn ping(&self) -> AppResult<()>;
}

/// Whether an order matches a listing filter on `today`
pub(crate) fn matches_filter(order: &Order, filter: &OrderFilter, today: NaiveDate) -> bool {
    let (laybuy_status, payment_status) = order.effective_statuses(today);
    filter.order_status.map_or(true, |s| order.order_status == s)
        && filter.payment_status.map_or(true, |s| payment_status == s)
        && filter.laybuy_status.map_or(true, |s| laybuy_status == s)
        && filter.is_laybuy.map_or(true, |l| order.is_laybuy == l)
}
