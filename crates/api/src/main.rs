use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minebud_api::config::ServerConfig;
use minebud_api::router::build_app_router;
use minebud_api::state::AppState;
use minebud_db::DbPool;
use minebud_events::{EventBus, EventPersistence};
use minebud_gateway::{GatewayConfig, LedgerApi};
use minebud_lifecycle::{LifecycleConfig, OperationService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "minebud_api=debug,minebud_lifecycle=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let pool = connect_database().await;

    let ledger = LedgerApi::new(GatewayConfig::from_env()).expect("Failed to build ledger client");
    let event_bus = Arc::new(EventBus::default());
    let persistence = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        operations: OperationService::new(
            pool,
            Arc::new(ledger),
            Arc::clone(&event_bus),
            LifecycleConfig::from_env(),
        ),
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("HOST must be an IP address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "Mining operations API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // The router and its service clones are gone; releasing the last bus
    // handle closes the channel and lets persistence finish.
    drop(event_bus);
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, persistence).await.is_err() {
        tracing::warn!("Event persistence did not drain before the shutdown timeout");
    }
    tracing::info!("Shutdown complete");
}

/// Connect, check and migrate. Any failure aborts startup.
async fn connect_database() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = minebud_db::create_pool(&url)
        .await
        .expect("Failed to connect to database");
    minebud_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    minebud_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");
    pool
}

/// Resolves on SIGINT, or SIGTERM on Unix.
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
        () = ctrl_c => tracing::info!("SIGINT received, draining connections"),
        () = terminate => tracing::info!("SIGTERM received, draining connections"),
    }
}
