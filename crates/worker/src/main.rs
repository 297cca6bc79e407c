use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minebud_events::{EventBus, EventPersistence};
use minebud_gateway::{GatewayConfig, LedgerApi};
use minebud_lifecycle::{LifecycleConfig, OperationService};
use minebud_worker::{Sweep, SweepLoop, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minebud_worker=debug,minebud_lifecycle=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let lifecycle_config = LifecycleConfig::from_env();
    let gateway_config = GatewayConfig::from_env();
    tracing::info!(?config, "Loaded worker configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = minebud_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    minebud_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    minebud_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Services ---
    let gateway = Arc::new(LedgerApi::new(gateway_config).expect("Failed to build ledger client"));
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));
    let service = OperationService::new(pool, gateway, Arc::clone(&event_bus), lifecycle_config);

    // --- Sweep loops ---
    let cancel = CancellationToken::new();
    let loops = [
        (Sweep::FinalizeDue, config.finalize_interval_secs),
        (Sweep::Inactivity, config.inactivity_interval_secs),
        (Sweep::PriceRefresh, config.price_refresh_interval_secs),
    ];
    let handles: Vec<_> = loops
        .into_iter()
        .map(|(sweep, secs)| {
            let sweep_loop = SweepLoop::new(sweep, service.clone(), Duration::from_secs(secs));
            let cancel = cancel.clone();
            tokio::spawn(async move { sweep_loop.run(cancel).await })
        })
        .collect();
    drop(service);

    shutdown_signal().await;
    cancel.cancel();

    // --- Post-shutdown cleanup ---
    let drain = config.shutdown_timeout();
    for handle in handles {
        if tokio::time::timeout(drain, handle).await.is_err() {
            tracing::warn!("Sweep loop did not stop before the shutdown timeout");
        }
    }

    drop(event_bus);
    if tokio::time::timeout(drain, persistence_handle).await.is_err() {
        tracing::warn!("Event persistence did not drain before the shutdown timeout");
    }

    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, stopping sweeps"),
        () = terminate => tracing::info!("Received SIGTERM, stopping sweeps"),
    }
}
