// Main entry point for the job relay server

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::domains::distribution::{CycleCoordinator, CycleRunner};
use relay_core::kernel::{scheduled_tasks::start_scheduler, RelayDeps};
use relay_core::server::{build_app, AppState};
use relay_core::Config;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relay_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting job relay");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let destinations = config.configured_destinations();
    if destinations.is_empty() {
        tracing::warn!("No destination credentials configured; cycles will publish nothing");
    }
    tracing::info!(?destinations, "Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    // Postgres cancels any statement that outlives the store timeout
    let statement_timeout = format!("{}ms", config.store_timeout().as_millis());
    let connect_options = PgConnectOptions::from_str(&config.database_url)
        .context("Invalid DATABASE_URL")?
        .options([("statement_timeout", statement_timeout.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let deps = RelayDeps::from_config(&config, pool).context("Failed to build publishers")?;
    let runner = Arc::new(CycleRunner::new(deps, config.cycle_settings()));
    let coordinator = Arc::new(CycleCoordinator::new(runner, config.polling_interval()));

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = if config.scheduler_enabled {
        Some(
            start_scheduler(coordinator.clone(), config.delivery_retention_days)
                .await
                .context("Failed to start scheduler")?,
        )
    } else {
        tracing::info!("Scheduler disabled; cycles run only on manual trigger");
        None
    };

    let app = build_app(AppState::new(coordinator));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
