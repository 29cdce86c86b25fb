//! Production assignment (penugasan produksi) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::procurement::ProcurementLine;
use crate::types::ItemKind;

/// Status of a production assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Assigned => "assigned",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(ProductionStatus::Assigned),
            "in_progress" => Some(ProductionStatus::InProgress),
            "completed" => Some(ProductionStatus::Completed),
            "cancelled" => Some(ProductionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductionStatus::Completed | ProductionStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ProductionStatus) -> bool {
        use ProductionStatus::*;
        matches!(
            (self, next),
            (Assigned, InProgress)
                | (Assigned, Completed)
                | (InProgress, Completed)
                | (Assigned, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

/// Errors raised by production assignment rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductionError {
    #[error("Assignment is {0} and can no longer be changed")]
    Immutable(&'static str),

    #[error("Cannot move assignment from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Produced quantity cannot be negative")]
    NegativeQuantity,
}

/// A unit of production work assigned to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionAssignment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub worker_id: Uuid,
    pub requested_quantity: Decimal,
    pub produced_quantity: Decimal,
    pub deadline: NaiveDate,
    pub status: ProductionStatus,
    pub note: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reject any change to a completed or cancelled assignment
pub fn ensure_mutable(status: ProductionStatus) -> Result<(), ProductionError> {
    if status.is_terminal() {
        Err(ProductionError::Immutable(status.as_str()))
    } else {
        Ok(())
    }
}

/// Validate a status change
pub fn check_transition(
    from: ProductionStatus,
    to: ProductionStatus,
) -> Result<(), ProductionError> {
    ensure_mutable(from)?;
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ProductionError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

/// Stock to add to the product for this status change.
///
/// Only the step into `completed` from a non-terminal status produces an
/// increment, so saving a completed assignment again never adds stock twice.
pub fn completion_increment(
    from: ProductionStatus,
    to: ProductionStatus,
    produced: Decimal,
) -> Option<Decimal> {
    if from.is_terminal() || to != ProductionStatus::Completed || produced <= Decimal::ZERO {
        return None;
    }
    Some(produced)
}

/// Where one assignment stands, as read back for the completion check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentProgress {
    pub line_id: Uuid,
    pub status: ProductionStatus,
    pub produced: Decimal,
}

/// A request's production path is finished when no assignment is still open
/// and, for every product line, completed assignments produced at least the
/// line's quantity. A line short of its quantity keeps the request in
/// production so another assignment can still be created for it.
pub fn production_finished(lines: &[ProcurementLine], assignments: &[AssignmentProgress]) -> bool {
    if assignments.iter().any(|a| !a.status.is_terminal()) {
        return false;
    }

    let mut product_lines = lines
        .iter()
        .filter(|line| line.item_kind == ItemKind::Product)
        .peekable();
    if product_lines.peek().is_none() {
        return false;
    }

    product_lines.all(|line| {
        let produced: Decimal = assignments
            .iter()
            .filter(|a| a.line_id == line.id && a.status == ProductionStatus::Completed)
            .map(|a| a.produced)
            .sum();
        produced > Decimal::ZERO && produced >= line.effective_quantity()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProductionStatus::*;

    #[test]
    fn test_transitions() {
        assert!(check_transition(Assigned, InProgress).is_ok());
        assert!(check_transition(InProgress, Completed).is_ok());
        assert!(check_transition(Assigned, Cancelled).is_ok());
        assert!(check_transition(InProgress, Assigned).is_err());
    }

    #[test]
    fn test_terminal_assignments_are_immutable() {
        assert_eq!(
            check_transition(Completed, Cancelled),
            Err(ProductionError::Immutable("completed"))
        );
        assert_eq!(ensure_mutable(Cancelled), Err(ProductionError::Immutable("cancelled")));
        assert!(ensure_mutable(InProgress).is_ok());
    }

    #[test]
    fn test_completion_increment_once() {
        let produced = Decimal::from(40);
        assert_eq!(completion_increment(InProgress, Completed, produced), Some(produced));
        assert_eq!(completion_increment(Completed, Completed, produced), None);
        assert_eq!(completion_increment(InProgress, Cancelled, produced), None);
        assert_eq!(completion_increment(Assigned, Completed, Decimal::ZERO), None);
    }

    fn product_line(quantity: i64) -> ProcurementLine {
        ProcurementLine {
            id: Uuid::new_v4(),
            request_id: Uuid::nil(),
            item_kind: ItemKind::Product,
            item_id: Uuid::new_v4(),
            item_name: "Roti Tawar".to_string(),
            unit: "pcs".to_string(),
            requested_quantity: Decimal::from(quantity),
            approved_quantity: None,
            unit_price: None,
            line_total: Decimal::ZERO,
            supplier_id: None,
            note: None,
        }
    }

    fn progress(line: &ProcurementLine, status: ProductionStatus, produced: i64) -> AssignmentProgress {
        AssignmentProgress {
            line_id: line.id,
            status,
            produced: Decimal::from(produced),
        }
    }

    #[test]
    fn test_production_finished() {
        let line = product_line(100);
        let lines = vec![line.clone()];
        assert!(production_finished(&lines, &[progress(&line, Completed, 100), progress(&line, Cancelled, 0)]));
        assert!(!production_finished(&lines, &[progress(&line, Cancelled, 0)]));
        assert!(!production_finished(&lines, &[progress(&line, Completed, 100), progress(&line, InProgress, 0)]));
        assert!(!production_finished(&lines, &[]));
    }

    #[test]
    fn test_partial_quantity_keeps_request_open() {
        let line = product_line(100);
        let lines = vec![line.clone()];
        assert!(!production_finished(&lines, &[progress(&line, Completed, 10)]));
        assert!(production_finished(&lines, &[progress(&line, Completed, 10), progress(&line, Completed, 90)]));
    }

    #[test]
    fn test_every_product_line_needs_production() {
        let first = product_line(20);
        let second = product_line(30);
        let lines = vec![first.clone(), second.clone()];
        assert!(!production_finished(&lines, &[progress(&first, Completed, 20)]));
        assert!(production_finished(&lines, &[progress(&first, Completed, 20), progress(&second, Completed, 30)]));
    }
}
