//! Shared types and domain logic for the Inventory & Procurement platform
//!
//! This crate holds everything that does not touch storage: item and
//! procurement models, the inventory metrics calculator, the reorder policy,
//! the procurement transition table and the cost feedback rules. It is used
//! by the backend and, through WASM, by the browser.

pub mod cost;
pub mod metrics;
pub mod models;
pub mod reorder;
pub mod types;
pub mod validation;
pub mod workflow;

pub use models::*;
pub use types::*;
pub use validation::*;
