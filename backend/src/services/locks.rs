//! Per-order command serialization

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per order id. Commands on different orders never contend.
///
/// Entries live only while a command holds or waits for them; the last guard
/// to drop removes its order from the map.
#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<LockMap>,
}

/// Exclusive access to one order, released on drop
pub struct OrderLockGuard {
    order_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `order_id`
    pub async fn acquire(&self, order_id: Uuid, timeout: Duration) -> AppResult<OrderLockGuard> {
        let lock = self.locks.entry(order_id).or_default().clone();

        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(%order_id, ?timeout, "Timed out waiting for order lock");
                AppError::ConcurrencyConflict(format!(
                    "Order {} is busy with another command; retry later",
                    order_id
                ))
            })?;

        Ok(OrderLockGuard {
            order_id,
            guard: Some(guard),
            locks: self.locks.clone(),
        })
    }

    /// Number of orders with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits for it
        self.locks
            .remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
