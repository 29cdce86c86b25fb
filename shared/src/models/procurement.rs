//! Procurement request (pengadaan) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ItemKind, ItemRef};

/// Status of a procurement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementStatus {
    Draft,
    /// "pending": waiting for the warehouse manager
    PendingWarehouseApproval,
    PendingSupplierAllocation,
    PendingProcurementApproval,
    PendingFinanceApproval,
    /// Purchase placed, waiting for goods receipt
    Processing,
    /// Product lines handed to production assignments
    InProduction,
    Completed,
    Cancelled,
}

impl ProcurementStatus {
    pub const ALL: [ProcurementStatus; 9] = [
        ProcurementStatus::Draft,
        ProcurementStatus::PendingWarehouseApproval,
        ProcurementStatus::PendingSupplierAllocation,
        ProcurementStatus::PendingProcurementApproval,
        ProcurementStatus::PendingFinanceApproval,
        ProcurementStatus::Processing,
        ProcurementStatus::InProduction,
        ProcurementStatus::Completed,
        ProcurementStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::Draft => "draft",
            ProcurementStatus::PendingWarehouseApproval => "pending_warehouse_approval",
            ProcurementStatus::PendingSupplierAllocation => "pending_supplier_allocation",
            ProcurementStatus::PendingProcurementApproval => "pending_procurement_approval",
            ProcurementStatus::PendingFinanceApproval => "pending_finance_approval",
            ProcurementStatus::Processing => "processing",
            ProcurementStatus::InProduction => "in_production",
            ProcurementStatus::Completed => "completed",
            ProcurementStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcurementStatus::Completed | ProcurementStatus::Cancelled)
    }

    /// Open requests block a new automatic request for the same item
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Status strings of every open status, for `status = ANY($1)` queries
    pub fn open_statuses() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|s| s.is_open())
            .map(|s| s.as_str())
            .collect()
    }
}

impl std::fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a request came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementKind {
    /// Created by the reorder trigger
    Reorder,
    /// Created by warehouse staff
    Manual,
}

impl ProcurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementKind::Reorder => "reorder",
            ProcurementKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reorder" => Some(ProcurementKind::Reorder),
            "manual" => Some(ProcurementKind::Manual),
            _ => None,
        }
    }
}

/// Urgency of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A procurement request with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementRequest {
    pub id: Uuid,
    /// Human readable code, e.g. `PGD-2026-0042`
    pub code: String,
    pub supplier_id: Option<Uuid>,
    pub kind: ProcurementKind,
    pub requested_at: DateTime<Utc>,
    pub needed_by: NaiveDate,
    pub priority: Priority,
    pub reason: Option<String>,
    pub status: ProcurementStatus,
    pub total_cost: Decimal,
    pub created_by: Option<Uuid>,
    pub lines: Vec<ProcurementLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcurementRequest {
    /// Whether any line references the given item
    pub fn references(&self, item: ItemRef) -> bool {
        self.lines.iter().any(|line| line.item_ref() == item)
    }
}

/// One line of a procurement request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementLine {
    pub id: Uuid,
    pub request_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    /// Snapshot of the item name at request time
    pub item_name: String,
    pub unit: String,
    pub requested_quantity: Decimal,
    pub approved_quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub line_total: Decimal,
    pub supplier_id: Option<Uuid>,
    pub note: Option<String>,
}

impl ProcurementLine {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id)
    }

    /// Quantity that will actually be bought or produced
    pub fn effective_quantity(&self) -> Decimal {
        self.approved_quantity.unwrap_or(self.requested_quantity)
    }

    /// Whether supplier allocation is complete for this line.
    /// Product lines never need a supplier.
    pub fn is_allocated(&self) -> bool {
        match self.item_kind {
            ItemKind::Product => true,
            ItemKind::RawMaterial => {
                self.supplier_id.is_some()
                    && self.unit_price.map_or(false, |price| price > Decimal::ZERO)
            }
        }
    }
}

/// Editable fields on a procurement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineField {
    RequestedQuantity,
    Note,
    ApprovedQuantity,
    Supplier,
    UnitPrice,
}

impl LineField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineField::RequestedQuantity => "requested_quantity",
            LineField::Note => "note",
            LineField::ApprovedQuantity => "approved_quantity",
            LineField::Supplier => "supplier_id",
            LineField::UnitPrice => "unit_price",
        }
    }
}

/// Line total: effective quantity times unit price (zero when unpriced)
pub fn calculate_line_total(
    requested: Decimal,
    approved: Option<Decimal>,
    unit_price: Option<Decimal>,
) -> Decimal {
    approved.unwrap_or(requested) * unit_price.unwrap_or(Decimal::ZERO)
}

/// Request total is the sum of its line totals
pub fn calculate_request_total(lines: &[ProcurementLine]) -> Decimal {
    lines.iter().map(|line| line.line_total).sum()
}

/// Generate a request code
pub fn generate_request_code(year: i32, sequence: i64) -> String {
    format!("PGD-{}-{:04}", year, sequence)
}

/// Transition audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub from_status: Option<ProcurementStatus>,
    pub to_status: ProcurementStatus,
    pub role: String,
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
