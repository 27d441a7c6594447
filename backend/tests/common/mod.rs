//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use order_engine_backend::{
    config::EngineConfig,
    services::{
        Clock, ConvertToLaybuyInput, CreateOrderInput, OrderService, RecordLaybuyPaymentInput,
        UpdatePaymentInput,
    },
    store::MemoryOrderStore,
};
use rust_decimal::Decimal;
use shared::{
    ActorRole, CustomerSnapshot, LaybuyTerms, Order, OrderItem, PaymentMethod, RequestContext,
};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Clock the tests can move
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::days(days);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub service: OrderService,
    pub clock: Arc<TestClock>,
    pub store: Arc<MemoryOrderStore>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let clock = TestClock::at(start_time());
    let store = Arc::new(MemoryOrderStore::new());
    let service = OrderService::new(store.clone(), &config).with_clock(clock.clone());
    Harness {
        service,
        clock,
        store,
    }
}

pub fn staff() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), "Sipho", ActorRole::Staff)
}

pub fn manager() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), "Naledi", ActorRole::Manager)
}

pub fn item(quantity: i32, unit_price: &str) -> OrderItem {
    OrderItem {
        product_id: Uuid::new_v4(),
        quantity,
        unit_price: dec(unit_price),
        original_unit_price: None,
        color_id: None,
        fabric_id: None,
        description: "Three-seater couch".to_string(),
    }
}

pub fn create_input(items: Vec<OrderItem>) -> CreateOrderInput {
    CreateOrderInput {
        customer: CustomerSnapshot {
            name: "Lerato Mokoena".to_string(),
            phone: Some("+27 82 555 0101".to_string()),
            email: Some("lerato@example.com".to_string()),
            address: None,
        },
        items,
        expected_delivery_date: None,
        admin_notes: None,
    }
}

/// A pending order with the given total as a single line
pub async fn order_with_total(h: &Harness, total: &str) -> Order {
    h.service
        .create_order(&staff(), create_input(vec![item(1, total)]))
        .await
        .unwrap()
}

pub fn laybuy_input(deposit: &str, terms: LaybuyTerms) -> ConvertToLaybuyInput {
    ConvertToLaybuyInput {
        deposit_amount: dec(deposit),
        terms,
        custom_due_date: None,
        notes: None,
        payment_method: PaymentMethod::Cash,
        proof_id: None,
    }
}

pub fn cash_payment(amount: &str) -> RecordLaybuyPaymentInput {
    RecordLaybuyPaymentInput {
        amount: dec(amount),
        payment_method: PaymentMethod::Cash,
        proof_id: None,
        idempotency_key: None,
        notes: None,
        final_settlement: false,
    }
}

pub fn cash_deposit(amount: &str) -> UpdatePaymentInput {
    UpdatePaymentInput {
        deposit_amount: Some(dec(amount)),
        balance_amount: None,
        payment_status: None,
        payment_method: PaymentMethod::Cash,
        proof_id: None,
        notes: None,
        final_settlement: false,
    }
}
