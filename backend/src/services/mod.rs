//! Business logic services for the order engine

use chrono::{DateTime, Utc};

pub mod laybuy;
pub mod ledger;
pub mod locks;
pub mod order;
pub mod proof_gate;
pub mod status;

pub use ledger::Discount;
pub use locks::OrderLocks;
pub use order::{
    ConvertToLaybuyInput, CreateOrderInput, OrderService, RecordLaybuyPaymentInput,
    RegisterProofInput, UpdateOrderInput, UpdateOrderStatusInput, UpdatePaymentInput,
    UpdateProductionStatusInput,
};
pub use proof_gate::ProofGate;

/// Source of the current time for every command
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
