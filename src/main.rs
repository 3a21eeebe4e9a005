//! Circulation Server - library lending with overdue reminders

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_server::{
    api,
    config::{AppConfig, DatabaseConfig, LoggingConfig, StorageBackend},
    repository::Repository,
    services::{
        clock::{Clock, SystemClock},
        email,
        notifications::{EmailNotifier, Notifier},
        scheduler::OverdueScheduler,
        tasks::TaskQueue,
        Services,
    },
    AppState,
};

/// Time given to queued notification jobs to finish on shutdown
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    tracing::info!("Starting Circulation Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = connect_repository(&config.database).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier::new(email::from_config(&config.email)));
    let (tasks, task_worker) = TaskQueue::start(repository.clone(), notifier.clone(), &config.tasks);

    let services = Services::new(repository, notifier, tasks, clock.clone(), &config.loans);

    let scheduler = if config.scheduler.enabled {
        let scheduler = OverdueScheduler::new(services.overdue.clone(), clock, &config.scheduler)?;
        let shutdown = scheduler.shutdown_handle();
        Some((shutdown, scheduler.start()))
    } else {
        tracing::info!("Overdue scheduler disabled");
        None
    };

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((shutdown, handle)) = scheduler {
        shutdown.notify_one();
        handle.await.ok();
    }

    // The router (and with it the last queue handle) is gone: let pending jobs finish
    if tokio::time::timeout(TASK_DRAIN_TIMEOUT, task_worker).await.is_err() {
        tracing::warn!("Pending notification jobs did not finish before shutdown");
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("circulation_server={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_repository(database: &DatabaseConfig) -> anyhow::Result<Repository> {
    match database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Ok(Repository::in_memory())
        }
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .min_connections(database.min_connections)
                .connect(&database.url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations completed");

            Ok(Repository::new(pool))
        }
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api::routes(state))
        .merge(api::openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
