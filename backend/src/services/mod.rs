//! Business logic services for the Inventory & Procurement service

pub mod cost_feedback;
pub mod inventory;
pub mod metrics;
pub mod procurement;
pub mod production;
pub mod receipt;
pub mod reorder;
pub mod shipment;
pub mod store;

pub use cost_feedback::CostFeedbackService;
pub use inventory::InventoryService;
pub use metrics::MetricsService;
pub use procurement::ProcurementService;
pub use production::ProductionService;
pub use receipt::ReceiptService;
pub use reorder::{ReorderHandler, ReorderService};
pub use shipment::ShipmentService;
pub use store::{InventoryStore, PgInventoryStore};
