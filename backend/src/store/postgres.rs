//! PostgreSQL order store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    CustomerSnapshot, LaybuyStatus, LaybuyTerms, Order, OrderFilter, OrderItem, OrderStatus,
    Pagination, PaymentMethod, PaymentProof, PaymentStatus, PaymentTransaction,
    ProductionStatus, StatusChange, TransactionKind,
};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::OrderStore;
use crate::error::{AppError, AppResult};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer, items, total_amount, deposit_amount, balance_amount,
    order_status, production_status, payment_status, payment_method,
    is_laybuy, laybuy_status, laybuy_terms, laybuy_due_date, laybuy_payments_made,
    laybuy_balance, laybuy_notes, order_discount_percent, order_discount_amount,
    expected_delivery_date, admin_notes, payment_notes, status_history, version,
    created_at, updated_at, status_updated_at
"#;

/// Orders with their lay-buy and payment status as they read on `$5`.
/// Mirrors `Order::effective_statuses`: a plan past its due date with money
/// owed reads as overdue, and an overdue plan that no longer is reads as
/// active with its payment status derived again.
const EFFECTIVE_ORDERS: &str = r#"
    SELECT laid.*,
        CASE
            WHEN effective_laybuy_status = laybuy_status THEN payment_status
            WHEN effective_laybuy_status = 'overdue' THEN 'overdue'
            WHEN balance_amount <= 0 AND total_amount > 0 THEN 'paid'
            WHEN total_amount - balance_amount > 0 THEN 'partial'
            WHEN total_amount > 0 THEN 'deposit_pending'
            ELSE 'pending'
        END AS effective_payment_status
    FROM (
        SELECT orders.*,
            CASE
                WHEN laybuy_status IN ('active', 'overdue')
                    AND laybuy_due_date < $5::DATE
                    AND balance_amount > 0 THEN 'overdue'
                WHEN laybuy_status IN ('active', 'overdue') THEN 'active'
                ELSE laybuy_status
            END AS effective_laybuy_status
        FROM orders
    ) laid
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id, order_id, actor_id, kind, payment_method, amount_delta, total_delta,
    new_balance, payment_status, proof_id, idempotency_key, notes, created_at
"#;

/// Order store backed by PostgreSQL
#[derive(Clone)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    /// Create a new PgOrderStore instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Database row for an order
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer: Json<CustomerSnapshot>,
    items: Json<Vec<OrderItem>>,
    total_amount: Decimal,
    deposit_amount: Decimal,
    balance_amount: Decimal,
    order_status: String,
    production_status: String,
    payment_status: String,
    payment_method: Option<String>,
    is_laybuy: bool,
    laybuy_status: String,
    laybuy_terms: Option<String>,
    laybuy_due_date: Option<NaiveDate>,
    laybuy_payments_made: Decimal,
    laybuy_balance: Option<Decimal>,
    laybuy_notes: Option<String>,
    order_discount_percent: Option<Decimal>,
    order_discount_amount: Option<Decimal>,
    expected_delivery_date: Option<NaiveDate>,
    admin_notes: Option<String>,
    payment_notes: Option<String>,
    status_history: Json<Vec<StatusChange>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status_updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            customer: row.customer.0,
            items: row.items.0,
            total_amount: row.total_amount,
            deposit_amount: row.deposit_amount,
            balance_amount: row.balance_amount,
            order_status: parse_column("order_status", &row.order_status, OrderStatus::from_str)?,
            production_status: parse_column(
                "production_status",
                &row.production_status,
                ProductionStatus::from_str,
            )?,
            payment_status: parse_column(
                "payment_status",
                &row.payment_status,
                PaymentStatus::from_str,
            )?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(|m| parse_column("payment_method", m, PaymentMethod::from_str))
                .transpose()?,
            is_laybuy: row.is_laybuy,
            laybuy_status: parse_column("laybuy_status", &row.laybuy_status, LaybuyStatus::from_str)?,
            laybuy_terms: row
                .laybuy_terms
                .as_deref()
                .map(|t| parse_column("laybuy_terms", t, LaybuyTerms::from_str))
                .transpose()?,
            laybuy_due_date: row.laybuy_due_date,
            laybuy_payments_made: row.laybuy_payments_made,
            laybuy_balance: row.laybuy_balance,
            laybuy_notes: row.laybuy_notes,
            order_discount_percent: row.order_discount_percent,
            order_discount_amount: row.order_discount_amount,
            expected_delivery_date: row.expected_delivery_date,
            admin_notes: row.admin_notes,
            payment_notes: row.payment_notes,
            status_history: row.status_history.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            status_updated_at: row.status_updated_at,
        })
    }
}

/// Database row for a ledger entry
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    order_id: Uuid,
    actor_id: Uuid,
    kind: String,
    payment_method: Option<String>,
    amount_delta: Decimal,
    total_delta: Decimal,
    new_balance: Decimal,
    payment_status: String,
    proof_id: Option<Uuid>,
    idempotency_key: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> AppResult<Self> {
        Ok(PaymentTransaction {
            id: row.id,
            order_id: row.order_id,
            actor_id: row.actor_id,
            kind: parse_column("kind", &row.kind, TransactionKind::from_str)?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(|m| parse_column("payment_method", m, PaymentMethod::from_str))
                .transpose()?,
            amount_delta: row.amount_delta,
            total_delta: row.total_delta,
            new_balance: row.new_balance,
            payment_status: parse_column(
                "payment_status",
                &row.payment_status,
                PaymentStatus::from_str,
            )?,
            proof_id: row.proof_id,
            idempotency_key: row.idempotency_key,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// Database row for a payment proof
#[derive(Debug, sqlx::FromRow)]
struct ProofRow {
    id: Uuid,
    order_id: Uuid,
    file_reference: String,
    amount: Option<Decimal>,
    uploaded_by: Option<Uuid>,
    uploaded_at: DateTime<Utc>,
}

impl From<ProofRow> for PaymentProof {
    fn from(row: ProofRow) -> Self {
        PaymentProof {
            id: row.id,
            order_id: row.order_id,
            file_reference: row.file_reference,
            amount: row.amount,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
        }
    }
}

fn parse_column<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| {
        AppError::Internal(format!("Unexpected value '{}' in column {}", value, column))
    })
}

/// Unique violations during commit mean another writer got there first
fn map_commit_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::ConcurrencyConflict(
                "Payment with this idempotency key was already recorded".to_string(),
            )
        }
        _ => AppError::DatabaseError(err),
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn next_order_sequence(&self, year: i32) -> AppResult<i64> {
        let sequence = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO order_sequences (year, last_value)
            VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&self.db)
        .await?;

        Ok(sequence)
    }

    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer, items, total_amount, deposit_amount, balance_amount,
                order_status, production_status, payment_status, payment_method,
                is_laybuy, laybuy_status, laybuy_terms, laybuy_due_date, laybuy_payments_made,
                laybuy_balance, laybuy_notes, order_discount_percent, order_discount_amount,
                expected_delivery_date, admin_notes, payment_notes, status_history, version,
                created_at, updated_at, status_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(Json(&order.customer))
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.deposit_amount)
        .bind(order.balance_amount)
        .bind(order.order_status.as_str())
        .bind(order.production_status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.map(|m| m.as_str()))
        .bind(order.is_laybuy)
        .bind(order.laybuy_status.as_str())
        .bind(order.laybuy_terms.map(|t| t.as_str()))
        .bind(order.laybuy_due_date)
        .bind(order.laybuy_payments_made)
        .bind(order.laybuy_balance)
        .bind(&order.laybuy_notes)
        .bind(order.order_discount_percent)
        .bind(order.order_discount_amount)
        .bind(order.expected_delivery_date)
        .bind(&order.admin_notes)
        .bind(&order.payment_notes)
        .bind(Json(&order.status_history))
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.status_updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        today: NaiveDate,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        const FILTER: &str = r#"
            ($1::VARCHAR IS NULL OR order_status = $1)
            AND ($2::VARCHAR IS NULL OR effective_payment_status = $2)
            AND ($3::VARCHAR IS NULL OR effective_laybuy_status = $3)
            AND ($4::BOOLEAN IS NULL OR is_laybuy = $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM ({}) effective WHERE {}",
            EFFECTIVE_ORDERS, FILTER
        ))
        .bind(filter.order_status.map(|s| s.as_str()))
        .bind(filter.payment_status.map(|s| s.as_str()))
        .bind(filter.laybuy_status.map(|s| s.as_str()))
        .bind(filter.is_laybuy)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            "SELECT {} FROM ({}) effective WHERE {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            ORDER_COLUMNS, EFFECTIVE_ORDERS, FILTER
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.order_status.map(|s| s.as_str()))
            .bind(filter.payment_status.map(|s| s.as_str()))
            .bind(filter.laybuy_status.map(|s| s.as_str()))
            .bind(filter.is_laybuy)
            .bind(today)
            .bind(pagination.per_page as i64)
            .bind(pagination.offset() as i64)
            .fetch_all(&self.db)
            .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((orders, total as u64))
    }

    async fn list_open_laybuy_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM orders WHERE is_laybuy AND laybuy_status IN ('active', 'overdue')",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn commit(
        &self,
        order: &Order,
        expected_version: i64,
        transactions: &[PaymentTransaction],
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET customer = $3, items = $4, total_amount = $5, deposit_amount = $6,
                balance_amount = $7, order_status = $8, production_status = $9,
                payment_status = $10, payment_method = $11, is_laybuy = $12,
                laybuy_status = $13, laybuy_terms = $14, laybuy_due_date = $15,
                laybuy_payments_made = $16, laybuy_balance = $17, laybuy_notes = $18,
                order_discount_percent = $19, order_discount_amount = $20,
                expected_delivery_date = $21, admin_notes = $22, payment_notes = $23,
                status_history = $24, version = $25, updated_at = $26, status_updated_at = $27
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(expected_version)
        .bind(Json(&order.customer))
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.deposit_amount)
        .bind(order.balance_amount)
        .bind(order.order_status.as_str())
        .bind(order.production_status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.map(|m| m.as_str()))
        .bind(order.is_laybuy)
        .bind(order.laybuy_status.as_str())
        .bind(order.laybuy_terms.map(|t| t.as_str()))
        .bind(order.laybuy_due_date)
        .bind(order.laybuy_payments_made)
        .bind(order.laybuy_balance)
        .bind(&order.laybuy_notes)
        .bind(order.order_discount_percent)
        .bind(order.order_discount_amount)
        .bind(order.expected_delivery_date)
        .bind(&order.admin_notes)
        .bind(&order.payment_notes)
        .bind(Json(&order.status_history))
        .bind(order.version)
        .bind(order.updated_at)
        .bind(order.status_updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(AppError::ConcurrencyConflict(format!(
                "Order {} was modified concurrently (expected version {})",
                order.order_number, expected_version
            )));
        }

        for entry in transactions {
            sqlx::query(
                r#"
                INSERT INTO payment_transactions (
                    id, order_id, actor_id, kind, payment_method, amount_delta, total_delta,
                    new_balance, payment_status, proof_id, idempotency_key, notes, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(entry.id)
            .bind(entry.order_id)
            .bind(entry.actor_id)
            .bind(entry.kind.as_str())
            .bind(entry.payment_method.map(|m| m.as_str()))
            .bind(entry.amount_delta)
            .bind(entry.total_delta)
            .bind(entry.new_balance)
            .bind(entry.payment_status.as_str())
            .bind(entry.proof_id)
            .bind(&entry.idempotency_key)
            .bind(&entry.notes)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_commit_error)?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn list_transactions(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        let sql = format!(
            "SELECT {} FROM payment_transactions WHERE order_id = $1 ORDER BY created_at, seq",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(PaymentTransaction::try_from).collect()
    }

    async fn find_transaction_by_key(
        &self,
        order_id: Uuid,
        idempotency_key: &str,
    ) -> AppResult<Option<PaymentTransaction>> {
        let sql = format!(
            "SELECT {} FROM payment_transactions WHERE order_id = $1 AND idempotency_key = $2",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(order_id)
            .bind(idempotency_key)
            .fetch_optional(&self.db)
            .await?;

        row.map(PaymentTransaction::try_from).transpose()
    }

    async fn insert_proof(&self, proof: &PaymentProof) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_proofs (id, order_id, file_reference, amount, uploaded_by, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(proof.id)
        .bind(proof.order_id)
        .bind(&proof.file_reference)
        .bind(proof.amount)
        .bind(proof.uploaded_by)
        .bind(proof.uploaded_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get_proof(&self, proof_id: Uuid) -> AppResult<Option<PaymentProof>> {
        let row = sqlx::query_as::<_, ProofRow>(
            r#"
            SELECT id, order_id, file_reference, amount, uploaded_by, uploaded_at
            FROM payment_proofs
            WHERE id = $1
            "#,
        )
        .bind(proof_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_proofs(&self, order_id: Uuid) -> AppResult<Vec<PaymentProof>> {
        let rows = sqlx::query_as::<_, ProofRow>(
            r#"
            SELECT id, order_id, file_reference, amount, uploaded_by, uploaded_at
            FROM payment_proofs
            WHERE order_id = $1
            ORDER BY uploaded_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
