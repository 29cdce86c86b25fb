//! Stocked item models (raw materials and products)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ItemKind, ItemRef};

/// A stocked item. Raw materials and products share the same shape.
///
/// `eoq`, `rop` and `safety_stock` are derived by the metrics calculator and
/// are never edited directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub code: String,
    pub name: String,
    /// Unit of measure (kg, pcs, liter, ...)
    pub unit: String,
    pub stock: Decimal,
    pub unit_price: Decimal,
    pub eoq: Decimal,
    pub rop: Decimal,
    pub safety_stock: Decimal,
    /// Learned cost of placing one order
    pub ordering_cost: Decimal,
    /// Annual holding cost as a fraction of unit price (0.20 = 20%)
    pub holding_cost_percent: Decimal,
    pub lead_time_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.kind, self.id)
    }
}

/// Why stock moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    ManualAdjustment,
    GoodsReceipt,
    ShipmentDelivery,
    ProductionCompletion,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::ManualAdjustment => "manual_adjustment",
            StockReason::GoodsReceipt => "goods_receipt",
            StockReason::ShipmentDelivery => "shipment_delivery",
            StockReason::ProductionCompletion => "production_completion",
        }
    }
}

/// Apply a signed delta to a stock level, clamping at zero
pub fn apply_stock_delta(current: Decimal, delta: Decimal) -> Decimal {
    let next = current + delta;
    if next < Decimal::ZERO {
        Decimal::ZERO
    } else {
        next
    }
}

/// Generate an item code, e.g. `BB-0007` for raw materials, `PRD-0012` for products
pub fn generate_item_code(kind: ItemKind, sequence: i64) -> String {
    let prefix = match kind {
        ItemKind::RawMaterial => "BB",
        ItemKind::Product => "PRD",
    };
    format!("{}-{:04}", prefix, sequence)
}
