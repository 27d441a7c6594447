//! In-process order store, used by tests and local runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{Order, OrderFilter, Pagination, PaymentProof, PaymentTransaction};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{matches_filter, OrderStore};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    transactions: Vec<PaymentTransaction>,
    proofs: HashMap<Uuid, PaymentProof>,
    sequences: HashMap<i32, i64>,
}

/// Order store kept entirely in memory.
///
/// A single lock around the whole state makes `commit` atomic.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: RwLock<MemoryState>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn next_order_sequence(&self, year: i32) -> AppResult<i64> {
        let mut state = self.state.write().await;
        let sequence = state.sequences.entry(year).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .orders
            .values()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(AppError::ConcurrencyConflict(format!(
                "Order number {} already exists",
                order.order_number
            )));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        today: NaiveDate,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        let state = self.state.read().await;
        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| matches_filter(order, filter, today))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.per_page as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_open_laybuy_ids(&self) -> AppResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|order| order.is_laybuy && order.laybuy_status.is_open())
            .map(|order| order.id)
            .collect())
    }

    async fn commit(
        &self,
        order: &Order,
        expected_version: i64,
        transactions: &[PaymentTransaction],
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored_version = state
            .orders
            .get(&order.id)
            .map(|existing| existing.version)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        if stored_version != expected_version {
            return Err(AppError::ConcurrencyConflict(format!(
                "Order {} was modified concurrently (expected version {}, found {})",
                order.order_number, expected_version, stored_version
            )));
        }

        let duplicate_key = transactions.iter().any(|tx| {
            tx.idempotency_key.as_ref().is_some_and(|key| {
                state.transactions.iter().any(|existing| {
                    existing.order_id == tx.order_id
                        && existing.idempotency_key.as_ref() == Some(key)
                })
            })
        });
        if duplicate_key {
            return Err(AppError::ConcurrencyConflict(
                "Payment with this idempotency key was already recorded".to_string(),
            ));
        }

        state.orders.insert(order.id, order.clone());
        state.transactions.extend_from_slice(transactions);
        Ok(())
    }

    async fn list_transactions(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| tx.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_transaction_by_key(
        &self,
        order_id: Uuid,
        idempotency_key: &str,
    ) -> AppResult<Option<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|tx| {
                tx.order_id == order_id && tx.idempotency_key.as_deref() == Some(idempotency_key)
            })
            .cloned())
    }

    async fn insert_proof(&self, proof: &PaymentProof) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&proof.order_id) {
            return Err(AppError::NotFound("Order".to_string()));
        }
        state.proofs.insert(proof.id, proof.clone());
        Ok(())
    }

    async fn get_proof(&self, proof_id: Uuid) -> AppResult<Option<PaymentProof>> {
        Ok(self.state.read().await.proofs.get(&proof_id).cloned())
    }

    async fn list_proofs(&self, order_id: Uuid) -> AppResult<Vec<PaymentProof>> {
        let state = self.state.read().await;
        let mut proofs: Vec<PaymentProof> = state
            .proofs
            .values()
            .filter(|proof| proof.order_id == order_id)
            .cloned()
            .collect();
        proofs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(proofs)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
