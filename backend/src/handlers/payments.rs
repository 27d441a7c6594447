//! Payment and proof HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::{RegisterProofInput, UpdatePaymentInput};
use crate::AppState;

/// Update deposit, balance or payment status
pub async fn update_payment(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdatePaymentInput>,
) -> impl IntoResponse {
    match state.orders.update_payment(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Ledger history for an order
pub async fn list_transactions(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orders.list_transactions(order_id).await {
        Ok(transactions) => {
            (StatusCode::OK, Json(serde_json::json!({ "transactions": transactions }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Register an uploaded proof of payment
pub async fn register_payment_proof(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RegisterProofInput>,
) -> impl IntoResponse {
    match state.orders.register_payment_proof(&ctx, order_id, input).await {
        Ok(proof) => (StatusCode::CREATED, Json(proof)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Proofs uploaded against an order
pub async fn list_proofs(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orders.list_proofs(order_id).await {
        Ok(proofs) => (StatusCode::OK, Json(serde_json::json!({ "proofs": proofs }))).into_response(),
        Err(e) => e.into_response(),
    }
}
