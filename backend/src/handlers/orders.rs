//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{LaybuyStatus, OrderFilter, OrderStatus, Pagination, PaymentStatus};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::{
    CreateOrderInput, Discount, UpdateOrderInput, UpdateOrderStatusInput,
    UpdateProductionStatusInput,
};
use crate::AppState;

/// Query string for order listings
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub laybuy_status: Option<LaybuyStatus>,
    pub is_laybuy: Option<bool>,
}

impl ListOrdersQuery {
    fn split(self) -> (OrderFilter, Pagination) {
        let defaults = Pagination::default();
        (
            OrderFilter {
                order_status: self.order_status,
                payment_status: self.payment_status,
                laybuy_status: self.laybuy_status,
                is_laybuy: self.is_laybuy,
            },
            Pagination {
                page: self.page.unwrap_or(defaults.page),
                per_page: self.per_page.unwrap_or(defaults.per_page).min(100),
            },
        )
    }
}

/// List orders
pub async fn list_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> impl IntoResponse {
    let (filter, pagination) = query.split();

    match state.orders.list_orders(&filter, &pagination).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a single order
pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.orders.get_order(order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a new order
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> impl IntoResponse {
    match state.orders.create_order(&ctx, input).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update customer details, notes and items
pub async fn update_order(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> impl IntoResponse {
    match state.orders.update_order(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Change the order status
pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderStatusInput>,
) -> impl IntoResponse {
    match state.orders.update_order_status(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Change the production status
pub async fn update_production_status(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateProductionStatusInput>,
) -> impl IntoResponse {
    match state.orders.update_production_status(&ctx, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Apply an order-level discount
pub async fn apply_discount(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(discount): Json<Discount>,
) -> impl IntoResponse {
    match state.orders.apply_discount(&ctx, order_id, discount).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}
