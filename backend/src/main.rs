//! Furniture Order Engine - Backend Server

use std::{sync::Arc, time::Duration};

use order_engine_backend::{
    config::{Config, StorageBackend},
    create_app,
    services::OrderService,
    store::{MemoryOrderStore, OrderStore, PgOrderStore},
    AppState,
};
use shared::RequestContext;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "order_engine_server=debug,order_engine_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Furniture Order Engine");
    tracing::info!("Environment: {}", config.environment);

    let store = connect_store(&config).await?;
    let orders = OrderService::new(store, &config.engine);

    if config.engine.overdue_sweep_interval_secs > 0 {
        spawn_overdue_sweep(
            orders.clone(),
            Duration::from_secs(config.engine.overdue_sweep_interval_secs),
        );
    }

    // Create application state
    let state = AppState {
        orders,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr = config.server.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the configured order store, running migrations in development
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn OrderStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory order store; data is lost on restart");
            Ok(Arc::new(MemoryOrderStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;

            tracing::info!("Database connection established");

            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(PgOrderStore::new(db_pool)))
        }
    }
}

/// Periodically persist the overdue flag of lapsed lay-buy plans
fn spawn_overdue_sweep(orders: OrderService, period: Duration) {
    tokio::spawn(async move {
        let ctx = RequestContext::system();
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(err) = orders.sweep_overdue(&ctx).await {
                tracing::error!(error = %err, "Overdue sweep failed");
            }
        }
    });
}
