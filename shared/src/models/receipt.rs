//! Goods receipt (penerimaan) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ItemKind;

/// Goods received against a processing procurement request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: Uuid,
    pub request_id: Uuid,
    /// Cost of placing this order (shipping, admin fees)
    pub ordering_cost: Decimal,
    pub received_by: Option<Uuid>,
    pub note: Option<String>,
    pub lines: Vec<GoodsReceiptLine>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub line_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

/// Quantity still outstanding on a line
pub fn outstanding_quantity(ordered: Decimal, already_received: Decimal) -> Decimal {
    let rest = ordered - already_received;
    if rest < Decimal::ZERO {
        Decimal::ZERO
    } else {
        rest
    }
}
