//! Lay-buy HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::{ConvertToLaybuyInput, RecordLaybuyPaymentInput};
use crate::AppState;

/// Convert an order to lay-buy
pub async fn convert_to_laybuy(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ConvertToLaybuyInput>,
) -> impl IntoResponse {
    match state.orders.convert_to_laybuy(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record an installment against the plan
pub async fn record_laybuy_payment(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RecordLaybuyPaymentInput>,
) -> impl IntoResponse {
    match state.orders.record_laybuy_payment(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Complete a fully paid plan
pub async fn complete_laybuy(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orders.complete_laybuy(&ctx, order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Persist the overdue flag for one plan
pub async fn refresh_laybuy_status(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orders.refresh_laybuy_status(&ctx, order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Sweep every open plan for lapsed due dates (managers only)
pub async fn sweep_overdue(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> impl IntoResponse {
    match state.orders.sweep_overdue(&ctx).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({ "updated": updated })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
