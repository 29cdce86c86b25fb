//! Domain models for the Inventory & Procurement platform

mod item;
mod procurement;
mod production;
mod receipt;
mod role;
mod shipment;
mod supplier;

pub use item::*;
pub use procurement::*;
pub use production::*;
pub use receipt::*;
pub use role::*;
pub use shipment::*;
pub use supplier::*;
