//! Order service: the command surface of the engine
//!
//! Each mutating command takes the per-order lock, loads the committed
//! snapshot, applies the rules to a working copy, and commits the copy and
//! its ledger entries in one store call guarded by the snapshot version.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    generate_order_number, ledger as calc, validate_customer, validate_delivery_date,
    validate_file_reference, validate_money, validate_order_items, CustomerSnapshot, LaybuyStatus,
    LaybuyTerms, Order, OrderFilter, OrderItem, OrderStatus, PaginatedResponse, Pagination,
    PaginationMeta, PaymentMethod, PaymentProof, PaymentStatus, PaymentTransaction,
    ProductionStatus, RequestContext, TransactionKind,
};
use uuid::Uuid;

use super::laybuy::{self, LaybuyPlan};
use super::ledger::{self, Discount, EntryDetails};
use super::locks::OrderLocks;
use super::proof_gate::ProofGate;
use super::status;
use super::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::store::OrderStore;

/// Input for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
}

/// Patch for non-financial order fields
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderInput {
    pub customer: Option<CustomerSnapshot>,
    /// Only accepted while the order is pending
    pub items: Option<Vec<OrderItem>>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
}

/// Input for converting an order to lay-buy
#[derive(Debug, Deserialize)]
pub struct ConvertToLaybuyInput {
    pub deposit_amount: Decimal,
    pub terms: LaybuyTerms,
    pub custom_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub proof_id: Option<Uuid>,
}

/// Input for recording a lay-buy installment
#[derive(Debug, Deserialize)]
pub struct RecordLaybuyPaymentInput {
    pub amount: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub proof_id: Option<Uuid>,
    /// Caller-supplied key; a repeat with the same key is not applied twice
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
    /// Accept a payment larger than the balance and keep the excess as credit
    #[serde(default)]
    pub final_settlement: bool,
}

/// Input for updating payment details
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentInput {
    pub deposit_amount: Option<Decimal>,
    pub balance_amount: Option<Decimal>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: PaymentMethod,
    pub proof_id: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(default)]
    pub final_settlement: bool,
}

/// Input for an order status change
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    /// Confirm without a deposit; managers only
    #[serde(default)]
    pub override_deposit: bool,
}

/// Input for a production status change
#[derive(Debug, Deserialize)]
pub struct UpdateProductionStatusInput {
    pub status: ProductionStatus,
}

/// Input for registering an uploaded payment proof
#[derive(Debug, Deserialize)]
pub struct RegisterProofInput {
    pub file_reference: String,
    pub amount: Option<Decimal>,
}

/// Order service for managing the order lifecycle and payment ledger
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    locks: OrderLocks,
    gate: ProofGate,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(store: Arc<dyn OrderStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            locks: OrderLocks::new(),
            gate: ProofGate::new(config.proof_max_age_days),
            clock: Arc::new(SystemClock),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Create a new pending order
    pub async fn create_order(&self, ctx: &RequestContext, input: CreateOrderInput) -> AppResult<Order> {
        validate_customer(&input.customer).map_err(|msg| AppError::validation("customer", msg))?;
        validate_order_items(&input.items).map_err(|msg| AppError::validation("items", msg))?;

        let now = self.clock.now();
        if let Some(delivery) = input.expected_delivery_date {
            validate_delivery_date(delivery, now.date_naive())
                .map_err(|msg| AppError::validation("expected_delivery_date", msg))?;
        }

        let total = calc::compute_total(&input.items, None)
            .ok_or_else(|| AppError::validation("items", "Order total exceeds the maximum allowed"))?;
        let sequence = self.store.next_order_sequence(now.year()).await?;

        let mut order = Order {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now.year(), sequence),
            customer: input.customer,
            items: input.items,
            total_amount: total,
            deposit_amount: Decimal::ZERO,
            balance_amount: total,
            order_status: OrderStatus::Pending,
            production_status: ProductionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            is_laybuy: false,
            laybuy_status: LaybuyStatus::None,
            laybuy_terms: None,
            laybuy_due_date: None,
            laybuy_payments_made: Decimal::ZERO,
            laybuy_balance: None,
            laybuy_notes: None,
            order_discount_percent: None,
            order_discount_amount: None,
            expected_delivery_date: input.expected_delivery_date,
            admin_notes: input.admin_notes,
            payment_notes: None,
            status_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            status_updated_at: now,
        };
        order.recompute_balance();
        order.payment_status = calc::derive_payment_status(
            order.total_amount,
            order.amount_received(),
            order.balance_amount,
            order.laybuy_status,
        );

        self.store.insert_order(&order).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            actor = %ctx.actor_name,
            "Order created"
        );

        Ok(order)
    }

    /// Update customer details, notes, dates, and (while pending) items
    pub async fn update_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<Order> {
        if let Some(customer) = &input.customer {
            validate_customer(customer).map_err(|msg| AppError::validation("customer", msg))?;
        }
        if let Some(items) = &input.items {
            validate_order_items(items).map_err(|msg| AppError::validation("items", msg))?;
        }

        self.mutate(ctx, order_id, "update_order", move |order, entries, now| {
            if order.is_closed() {
                return Err(AppError::InvalidStateTransition(format!(
                    "Order {} is {} and can no longer be edited",
                    order.order_number, order.order_status
                )));
            }

            if let Some(delivery) = input.expected_delivery_date {
                validate_delivery_date(delivery, now.date_naive())
                    .map_err(|msg| AppError::validation("expected_delivery_date", msg))?;
                order.expected_delivery_date = Some(delivery);
            }
            if let Some(customer) = input.customer {
                order.customer = customer;
            }
            if let Some(notes) = input.admin_notes {
                order.admin_notes = Some(notes);
            }

            if let Some(items) = input.items {
                if order.order_status != OrderStatus::Pending {
                    return Err(AppError::PreconditionFailed(format!(
                        "Items on order {} are finalized once it is {}",
                        order.order_number, order.order_status
                    )));
                }
                order.items = items;
                let total_delta = ledger::retotal_from_items(order)?;
                ledger::refresh_payment_status(order, ctx, now);
                if !total_delta.is_zero() {
                    entries.push(ledger::entry(
                        order,
                        ctx,
                        now,
                        Decimal::ZERO,
                        total_delta,
                        EntryDetails::new(TransactionKind::TotalAdjustment)
                            .with_notes(Some("Items updated".to_string())),
                    ));
                }
            }

            Ok(())
        })
        .await
    }

    /// Apply an order-level discount; managers and admins only
    pub async fn apply_discount(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        discount: Discount,
    ) -> AppResult<Order> {
        if !ctx.role.can_override() {
            return Err(AppError::Forbidden(
                "Only managers can apply order discounts".to_string(),
            ));
        }

        self.mutate(ctx, order_id, "apply_discount", move |order, entries, now| {
            if order.is_closed() {
                return Err(AppError::InvalidStateTransition(format!(
                    "Order {} is {}",
                    order.order_number, order.order_status
                )));
            }

            let total_delta = ledger::apply_discount(order, discount)?;
            ledger::refresh_payment_status(order, ctx, now);
            entries.push(ledger::entry(
                order,
                ctx,
                now,
                Decimal::ZERO,
                total_delta,
                EntryDetails::new(TransactionKind::TotalAdjustment)
                    .with_notes(Some("Order discount applied".to_string())),
            ));
            Ok(())
        })
        .await
    }

    /// Convert an order to a lay-buy plan
    pub async fn convert_to_laybuy(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: ConvertToLaybuyInput,
    ) -> AppResult<Order> {
        let proof = self.load_proof(input.proof_id).await?;
        let method = input.payment_method;

        self.mutate(ctx, order_id, "convert_to_laybuy", move |order, entries, now| {
            let proof_id = self
                .gate
                .check(order.id, method, input.proof_id, proof.as_ref(), now)?;

            let plan = LaybuyPlan {
                deposit_amount: input.deposit_amount,
                terms: input.terms,
                custom_due_date: input.custom_due_date,
                notes: input.notes,
            };
            let deposit_delta = laybuy::convert(order, plan, ctx, now)?;
            ledger::refresh_payment_status(order, ctx, now);

            if !deposit_delta.is_zero() {
                order.payment_method = Some(method);
                entries.push(ledger::entry(
                    order,
                    ctx,
                    now,
                    deposit_delta,
                    Decimal::ZERO,
                    EntryDetails::new(TransactionKind::Deposit)
                        .paid_with(method, proof_id)
                        .with_notes(Some("Lay-buy deposit".to_string())),
                ));
            }
            Ok(())
        })
        .await
    }

    /// Record a lay-buy installment
    pub async fn record_laybuy_payment(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: RecordLaybuyPaymentInput,
    ) -> AppResult<Order> {
        let proof = self.load_proof(input.proof_id).await?;
        let _guard = self.locks.acquire(order_id, self.lock_timeout).await?;

        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(previous) = self.store.find_transaction_by_key(order_id, key).await? {
                if previous.amount_delta != input.amount {
                    return Err(AppError::validation(
                        "idempotency_key",
                        "Idempotency key was already used for a different amount",
                    ));
                }
                tracing::debug!(%order_id, key, "Replayed lay-buy payment ignored");
                return self.get_order(order_id).await;
            }
        }

        let method = input.payment_method;
        self.mutate_locked(ctx, order_id, "record_laybuy_payment", move |order, entries, now| {
            let proof_id = self
                .gate
                .check(order.id, method, input.proof_id, proof.as_ref(), now)?;

            laybuy::record_payment(order, input.amount, input.final_settlement, ctx, now)?;
            ledger::refresh_payment_status(order, ctx, now);
            order.payment_method = Some(method);

            entries.push(ledger::entry(
                order,
                ctx,
                now,
                input.amount,
                Decimal::ZERO,
                EntryDetails::new(TransactionKind::LaybuyPayment)
                    .paid_with(method, proof_id)
                    .with_idempotency_key(input.idempotency_key)
                    .with_notes(input.notes),
            ));
            Ok(())
        })
        .await
    }

    /// Complete a fully paid lay-buy and release the order to production
    pub async fn complete_laybuy(&self, ctx: &RequestContext, order_id: Uuid) -> AppResult<Order> {
        self.mutate(ctx, order_id, "complete_laybuy", |order, _entries, now| {
            laybuy::complete(order, ctx, now)?;
            ledger::refresh_payment_status(order, ctx, now);
            Ok(())
        })
        .await
    }

    /// Persist the overdue flag of a lay-buy plan as of now
    pub async fn refresh_laybuy_status(&self, ctx: &RequestContext, order_id: Uuid) -> AppResult<Order> {
        self.mutate(ctx, order_id, "refresh_laybuy_status", |order, _entries, now| {
            if laybuy::refresh_overdue(order, ctx, now) {
                ledger::refresh_payment_status(order, ctx, now);
            }
            Ok(())
        })
        .await
    }

    /// Refresh every open lay-buy plan; returns how many changed status
    pub async fn sweep_overdue(&self, ctx: &RequestContext) -> AppResult<usize> {
        if !ctx.role.can_override() {
            return Err(AppError::Forbidden(
                "Only managers can run the overdue sweep".to_string(),
            ));
        }

        let ids = self.store.list_open_laybuy_ids().await?;
        let today = self.clock.now().date_naive();
        let mut changed = 0;

        for order_id in ids {
            let Some(stored) = self.store.get_order(order_id).await? else {
                continue;
            };
            if stored.effective_statuses(today).0 == stored.laybuy_status {
                continue;
            }
            match self.refresh_laybuy_status(ctx, order_id).await {
                Ok(_) => changed += 1,
                Err(err) => {
                    tracing::warn!(%order_id, error = %err, "Overdue refresh failed; skipping order");
                }
            }
        }

        if changed > 0 {
            tracing::info!(changed, "Lay-buy overdue sweep updated orders");
        }
        Ok(changed)
    }

    /// Move the order along its lifecycle
    pub async fn update_order_status(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> AppResult<Order> {
        self.mutate(ctx, order_id, "update_order_status", move |order, _entries, now| {
            status::transition_order_status(order, input.status, input.override_deposit, ctx, now)
        })
        .await
    }

    /// Move manufacturing along
    pub async fn update_production_status(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: UpdateProductionStatusInput,
    ) -> AppResult<Order> {
        self.mutate(ctx, order_id, "update_production_status", move |order, _entries, now| {
            status::advance_production_status(order, input.status, ctx, now)
        })
        .await
    }

    /// Update deposit, balance, payment status and method through the ledger
    pub async fn update_payment(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: UpdatePaymentInput,
    ) -> AppResult<Order> {
        let proof = self.load_proof(input.proof_id).await?;
        let method = input.payment_method;

        self.mutate(ctx, order_id, "update_payment", move |order, entries, now| {
            let proof_id = self
                .gate
                .check(order.id, method, input.proof_id, proof.as_ref(), now)?;

            if order.order_status == OrderStatus::Cancelled {
                return Err(AppError::InvalidStateTransition(format!(
                    "Order {} is cancelled",
                    order.order_number
                )));
            }

            let target_deposit = resolve_target_deposit(order, input.deposit_amount, input.balance_amount)?;
            let deposit_delta = match target_deposit {
                Some(deposit) => ledger::set_deposit(order, deposit, input.final_settlement)?,
                None => Decimal::ZERO,
            };

            match input.payment_status {
                Some(explicit) => ledger::set_explicit_payment_status(order, explicit, ctx, now)?,
                None => ledger::refresh_payment_status(order, ctx, now),
            }

            order.payment_method = Some(method);
            if input.notes.is_some() {
                order.payment_notes = input.notes.clone();
            }

            if !deposit_delta.is_zero() {
                entries.push(ledger::entry(
                    order,
                    ctx,
                    now,
                    deposit_delta,
                    Decimal::ZERO,
                    EntryDetails::new(TransactionKind::Deposit)
                        .paid_with(method, proof_id)
                        .with_notes(input.notes),
                ));
            }
            Ok(())
        })
        .await
    }

    /// Register an uploaded proof-of-payment document against an order
    pub async fn register_payment_proof(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        input: RegisterProofInput,
    ) -> AppResult<PaymentProof> {
        validate_file_reference(&input.file_reference)
            .map_err(|msg| AppError::validation("file_reference", msg))?;
        if let Some(amount) = input.amount {
            shared::validate_payment_amount(amount)
                .map_err(|msg| AppError::validation("amount", msg))?;
        }

        let order = self.load(order_id).await?;
        if order.order_status == OrderStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "Order {} is cancelled",
                order.order_number
            )));
        }

        let proof = PaymentProof {
            id: Uuid::new_v4(),
            order_id,
            file_reference: input.file_reference.trim().to_string(),
            amount: input.amount,
            uploaded_by: Some(ctx.actor_id),
            uploaded_at: self.clock.now(),
        };
        self.store.insert_proof(&proof).await?;

        tracing::info!(%order_id, proof_id = %proof.id, "Payment proof registered");
        Ok(proof)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Latest committed snapshot, with the lay-buy status evaluated for today
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        let order = self.load(order_id).await?;
        Ok(order.as_of(self.clock.now().date_naive()))
    }

    /// List orders matching a filter
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        let today = self.clock.now().date_naive();
        let (orders, total) = self.store.list_orders(filter, today, pagination).await?;

        Ok(PaginatedResponse {
            data: orders
                .into_iter()
                .map(|order| order.as_of(today))
                .collect(),
            pagination: PaginationMeta::new(pagination, total),
        })
    }

    /// Ledger history of an order, oldest first
    pub async fn list_transactions(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        self.load(order_id).await?;
        self.store.list_transactions(order_id).await
    }

    /// Proofs uploaded against an order
    pub async fn list_proofs(&self, order_id: Uuid) -> AppResult<Vec<PaymentProof>> {
        self.load(order_id).await?;
        self.store.list_proofs(order_id).await
    }

    /// Store connectivity check
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load(&self, order_id: Uuid) -> AppResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    async fn load_proof(&self, proof_id: Option<Uuid>) -> AppResult<Option<PaymentProof>> {
        match proof_id {
            Some(id) => self.store.get_proof(id).await,
            None => Ok(None),
        }
    }

    async fn mutate<F>(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        command: &'static str,
        apply: F,
    ) -> AppResult<Order>
    where
        F: FnOnce(&mut Order, &mut Vec<PaymentTransaction>, DateTime<Utc>) -> AppResult<()>,
    {
        let _guard = self.locks.acquire(order_id, self.lock_timeout).await?;
        self.mutate_locked(ctx, order_id, command, apply).await
    }

    /// Apply and commit one command; the caller holds the order lock
    async fn mutate_locked<F>(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        command: &'static str,
        apply: F,
    ) -> AppResult<Order>
    where
        F: FnOnce(&mut Order, &mut Vec<PaymentTransaction>, DateTime<Utc>) -> AppResult<()>,
    {
        let current = self.load(order_id).await?;
        let now = self.clock.now();

        let mut next = current.clone();
        let mut entries = Vec::new();
        if let Err(err) = apply(&mut next, &mut entries, now) {
            tracing::warn!(
                %order_id,
                order_number = %current.order_number,
                command,
                error = %err,
                "Command rejected"
            );
            return Err(err);
        }

        if !next.is_ledger_consistent() {
            return Err(AppError::Internal(format!(
                "Ledger identity violated on order {} by {}",
                next.order_number, command
            )));
        }

        next.version = current.version + 1;
        next.updated_at = now;
        self.store.commit(&next, current.version, &entries).await?;

        tracing::info!(
            %order_id,
            order_number = %next.order_number,
            command,
            actor = %ctx.actor_name,
            order_status = next.order_status.as_str(),
            balance = %next.balance_amount,
            entries = entries.len(),
            "Command committed"
        );

        Ok(next.as_of(now.date_naive()))
    }
}

/// Work out the deposit an UpdatePayment asks for.
///
/// A balance alone is translated into the deposit that produces it; when
/// both are given they must agree.
fn resolve_target_deposit(
    order: &Order,
    deposit: Option<Decimal>,
    balance: Option<Decimal>,
) -> AppResult<Option<Decimal>> {
    if let Some(deposit) = deposit {
        validate_money(deposit).map_err(|msg| AppError::validation("deposit_amount", msg))?;
    }
    if let Some(balance) = balance {
        validate_money(balance).map_err(|msg| AppError::validation("balance_amount", msg))?;
    }

    let installments = if order.is_laybuy {
        order.laybuy_payments_made
    } else {
        Decimal::ZERO
    };

    match (deposit, balance) {
        (None, None) => Ok(None),
        (Some(deposit), None) => Ok(Some(deposit)),
        (None, Some(balance)) => {
            let deposit = order.total_amount - installments - balance;
            if deposit < Decimal::ZERO {
                return Err(AppError::validation(
                    "balance_amount",
                    format!(
                        "Balance of {} is more than the {} still payable",
                        balance,
                        order.total_amount - installments
                    ),
                ));
            }
            Ok(Some(deposit))
        }
        (Some(deposit), Some(balance)) => {
            let expected = calc::compute_balance(
                order.total_amount,
                deposit,
                order.laybuy_payments_made,
                order.is_laybuy,
            );
            if expected != balance {
                return Err(AppError::validation(
                    "balance_amount",
                    format!(
                        "Balance of {} does not match total minus payments ({})",
                        balance, expected
                    ),
                ));
            }
            Ok(Some(deposit))
        }
    }
}
