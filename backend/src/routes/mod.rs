//! Route definitions for the order engine

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - orders, payments and lay-buy
        .nest("/orders", order_routes(state.clone()))
        // Protected routes - maintenance jobs
        .nest("/laybuy", laybuy_job_routes(state))
}

/// Order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order).put(handlers::update_order))
        .route("/:order_id/status", put(handlers::update_order_status))
        .route("/:order_id/production", put(handlers::update_production_status))
        .route("/:order_id/discount", put(handlers::apply_discount))
        .route("/:order_id/payment", put(handlers::update_payment))
        .route("/:order_id/transactions", get(handlers::list_transactions))
        .route(
            "/:order_id/proofs",
            get(handlers::list_proofs).post(handlers::register_payment_proof),
        )
        .route("/:order_id/laybuy", post(handlers::convert_to_laybuy))
        .route("/:order_id/laybuy/payments", post(handlers::record_laybuy_payment))
        .route("/:order_id/laybuy/complete", post(handlers::complete_laybuy))
        .route("/:order_id/laybuy/refresh", post(handlers::refresh_laybuy_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Lay-buy maintenance routes (protected)
fn laybuy_job_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sweep-overdue", post(handlers::sweep_overdue))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
