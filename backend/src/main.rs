//! Inventory & Procurement - Backend Server
//!
//! Runs the event dispatcher, job worker and daily scheduler next to a
//! health endpoint.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use inventory_procurement_backend::{
    access::AccessControl,
    create_app,
    events::{process_events, EventBus, EventHandler},
    jobs::{run_worker, JobQueue, JobRunner, RetryPolicy, ServiceJobRunner},
    scheduler::spawn_scheduler,
    services::ReorderHandler,
    AppState, Config, Services,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "ipm_server=debug,inventory_procurement_backend=debug,tower_http=debug,sqlx=warn".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(&config.log_format);

    tracing::info!("Starting Inventory & Procurement Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let access = Arc::new(AccessControl::from_config(&config.access)?);
    let (events, event_rx) = EventBus::new(config.jobs.queue_capacity);
    let (jobs, job_rx) = JobQueue::new(config.jobs.queue_capacity);
    let services = Services::new(db_pool.clone(), &config, events.clone(), access.clone())?;

    // Post-commit stock events feed the reorder trigger
    let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(ReorderHandler::new(services.reorder.clone()))];
    tokio::spawn(process_events(event_rx, handlers));

    let runner: Arc<dyn JobRunner> = Arc::new(ServiceJobRunner::new(
        services.metrics.clone(),
        services.reorder.clone(),
    ));
    tokio::spawn(run_worker(job_rx, runner, RetryPolicy::from(&config.jobs)));

    let _scheduler = spawn_scheduler(jobs.clone(), &config.scheduler);

    // Create application state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        events,
        jobs,
        access,
        services,
    };

    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
