//! Inventory & Procurement service
//!
//! EOQ/ROP-driven replenishment with a role-gated procurement workflow.
//! The pure rules live in the `shared` crate; this crate persists them,
//! wires the background event dispatcher, job worker and scheduler, and
//! exposes a health endpoint.

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod access;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod scheduler;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use access::AccessControl;
use events::EventBus;
use jobs::JobQueue;
use services::{
    CostFeedbackService, InventoryService, InventoryStore, MetricsService, PgInventoryStore,
    ProcurementService, ProductionService, ReceiptService, ReorderService, ShipmentService,
};

/// Every service, wired to one pool, event bus and access table
#[derive(Clone)]
pub struct Services {
    pub inventory: InventoryService,
    pub procurement: ProcurementService,
    pub receipts: ReceiptService,
    pub production: ProductionService,
    pub shipments: ShipmentService,
    pub metrics: MetricsService,
    pub reorder: ReorderService,
    pub cost_feedback: CostFeedbackService,
}

impl Services {
    pub fn new(db: PgPool, config: &Config, events: EventBus, access: Arc<AccessControl>) -> AppResult<Self> {
        let metrics_settings = config
            .inventory
            .metrics_settings()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let cost_settings = config
            .inventory
            .cost_feedback_settings()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let store: Arc<dyn InventoryStore> = Arc::new(PgInventoryStore::new(db.clone()));
        let metrics = MetricsService::new(store.clone(), metrics_settings, config.inventory.history_days);
        let reorder = ReorderService::new(
            store.clone(),
            metrics.clone(),
            config.inventory.reorder_lead_window_days,
        );
        let cost_feedback = CostFeedbackService::new(store, cost_settings);
        let inventory = InventoryService::new(db.clone(), events, access.clone());

        Ok(Self {
            procurement: ProcurementService::new(db.clone(), access.clone()),
            receipts: ReceiptService::new(db.clone(), inventory.clone(), cost_feedback.clone(), access.clone()),
            production: ProductionService::new(db.clone(), inventory.clone(), access.clone()),
            shipments: ShipmentService::new(db, inventory.clone(), access),
            inventory,
            metrics,
            reorder,
            cost_feedback,
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub jobs: JobQueue,
    pub access: Arc<AccessControl>,
    pub services: Services,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Inventory & Procurement Service v1.0"
}
