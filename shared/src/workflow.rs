//! Procurement workflow: the transition table and every authorization rule
//!
//! All role checks for procurement requests go through this module. The
//! superuser passes every role and state-window check; structural rules
//! (the edge must exist, routing after warehouse approval, supplier
//! allocation before procurement approval, terminal requests are frozen,
//! system edges) apply to everyone.

use serde::Serialize;
use thiserror::Error;

use crate::models::{LineField, ProcurementLine, ProcurementStatus, RoleId};
use crate::types::ItemKind;

use ProcurementStatus::*;
use RoleId::*;

/// Extra condition attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionGuard {
    None,
    /// Every raw-material line has supplier and unit price
    SuppliersAllocated,
    /// Request has no product line
    RawMaterialsOnly,
    /// Request has at least one product line
    HasProductLine,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransitionRule {
    pub from: ProcurementStatus,
    pub to: ProcurementStatus,
    pub roles: &'static [RoleId],
    pub guard: TransitionGuard,
}

impl TransitionRule {
    /// Edge with no role: only a goods receipt or finished production moves it
    pub fn is_system(&self) -> bool {
        self.roles.is_empty()
    }
}

/// State × role table for procurement requests.
///
/// Both edges into `completed` have no role. `processing → completed` is
/// written by a goods receipt that covers every line, `in_production →
/// completed` by the production service once every product line is made.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: Draft,
        to: PendingWarehouseApproval,
        roles: &[WarehouseStaff, WarehouseManager],
        guard: TransitionGuard::None,
    },
    TransitionRule {
        from: PendingWarehouseApproval,
        to: PendingSupplierAllocation,
        roles: &[WarehouseManager],
        guard: TransitionGuard::RawMaterialsOnly,
    },
    TransitionRule {
        from: PendingWarehouseApproval,
        to: InProduction,
        roles: &[WarehouseManager],
        guard: TransitionGuard::HasProductLine,
    },
    TransitionRule {
        from: PendingSupplierAllocation,
        to: PendingProcurementApproval,
        roles: &[ProcurementStaff],
        guard: TransitionGuard::SuppliersAllocated,
    },
    TransitionRule {
        from: PendingProcurementApproval,
        to: PendingFinanceApproval,
        roles: &[ProcurementManager],
        guard: TransitionGuard::None,
    },
    TransitionRule {
        from: PendingFinanceApproval,
        to: Processing,
        roles: &[FinanceManager],
        guard: TransitionGuard::None,
    },
    TransitionRule {
        from: Processing,
        to: Completed,
        roles: &[],
        guard: TransitionGuard::None,
    },
    TransitionRule {
        from: InProduction,
        to: Completed,
        roles: &[],
        guard: TransitionGuard::HasProductLine,
    },
];

/// Roles allowed to cancel any open request
pub const CANCEL_ROLES: &[RoleId] = &[WarehouseStaff, WarehouseManager];

/// Roles allowed to record a goods receipt
pub const RECEIPT_ROLES: &[RoleId] = &[WarehouseStaff, WarehouseManager];

/// Roles allowed to delete a request
pub const DELETE_ROLES: &[RoleId] = &[WarehouseStaff, WarehouseManager];

/// States in which a request may be deleted
pub const DELETABLE_STATUSES: &[ProcurementStatus] = &[Draft, PendingWarehouseApproval, Cancelled];

struct LineEditRule {
    field: LineField,
    statuses: &'static [ProcurementStatus],
    roles: &'static [RoleId],
}

const LINE_EDIT_RULES: &[LineEditRule] = &[
    LineEditRule {
        field: LineField::RequestedQuantity,
        statuses: &[Draft, PendingWarehouseApproval],
        roles: &[WarehouseStaff, WarehouseManager],
    },
    LineEditRule {
        field: LineField::Note,
        statuses: &[Draft, PendingWarehouseApproval],
        roles: &[WarehouseStaff, WarehouseManager],
    },
    LineEditRule {
        field: LineField::ApprovedQuantity,
        statuses: &[PendingWarehouseApproval],
        roles: &[WarehouseManager],
    },
    LineEditRule {
        field: LineField::Supplier,
        statuses: &[PendingSupplierAllocation],
        roles: &[ProcurementStaff, ProcurementManager],
    },
    LineEditRule {
        field: LineField::UnitPrice,
        statuses: &[PendingSupplierAllocation],
        roles: &[ProcurementStaff, ProcurementManager],
    },
];

/// Workflow rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Role or state window does not allow the action (HTTP 403)
    #[error("Role {role} may not {action} while request is {status}")]
    Unauthorized {
        role: RoleId,
        action: String,
        status: ProcurementStatus,
    },

    #[error("Cannot move request from {from} to {to}")]
    InvalidTransition {
        from: ProcurementStatus,
        to: ProcurementStatus,
    },

    #[error("{missing} raw material line(s) still need a supplier and unit price")]
    SupplierAllocationIncomplete { missing: usize },

    #[error("Request is {0} and can no longer be changed")]
    Immutable(ProcurementStatus),

    #[error("Request cannot be deleted while {0}")]
    NotDeletable(ProcurementStatus),

    #[error("Request has {receipts} goods receipt(s) and {assignments} production assignment(s) and cannot be deleted")]
    HasDependents { receipts: i64, assignments: i64 },
}

impl WorkflowError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, WorkflowError::Unauthorized { .. })
    }
}

/// Kinds present on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineComposition {
    pub raw_materials: usize,
    pub products: usize,
    /// Raw-material lines missing supplier or price
    pub unallocated: usize,
}

impl LineComposition {
    pub fn of(lines: &[ProcurementLine]) -> Self {
        let mut composition = Self::default();
        for line in lines {
            match line.item_kind {
                ItemKind::RawMaterial => {
                    composition.raw_materials += 1;
                    if !line.is_allocated() {
                        composition.unallocated += 1;
                    }
                }
                ItemKind::Product => composition.products += 1,
            }
        }
        composition
    }

    pub fn has_product(&self) -> bool {
        self.products > 0
    }
}

pub fn find_rule(from: ProcurementStatus, to: ProcurementStatus) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|rule| rule.from == from && rule.to == to)
}

/// Where a warehouse approval sends the request: any product line routes to
/// production, otherwise to supplier allocation
pub fn route_after_warehouse_approval(composition: &LineComposition) -> ProcurementStatus {
    if composition.has_product() {
        InProduction
    } else {
        PendingSupplierAllocation
    }
}

/// Target of the "approve" action from `from`, if approving is possible there
pub fn approval_target(from: ProcurementStatus, composition: &LineComposition) -> Option<ProcurementStatus> {
    match from {
        Draft => Some(PendingWarehouseApproval),
        PendingWarehouseApproval => Some(route_after_warehouse_approval(composition)),
        PendingSupplierAllocation => Some(PendingProcurementApproval),
        PendingProcurementApproval => Some(PendingFinanceApproval),
        PendingFinanceApproval => Some(Processing),
        _ => None,
    }
}

fn unauthorized(role: RoleId, action: impl Into<String>, status: ProcurementStatus) -> WorkflowError {
    WorkflowError::Unauthorized {
        role,
        action: action.into(),
        status,
    }
}

/// Role check for a transition. Does not look at line data.
pub fn authorize_transition(
    role: RoleId,
    from: ProcurementStatus,
    to: ProcurementStatus,
) -> Result<(), WorkflowError> {
    if from.is_terminal() {
        return Err(WorkflowError::Immutable(from));
    }

    if to == Cancelled {
        return if role.is_superuser() || CANCEL_ROLES.contains(&role) {
            Ok(())
        } else {
            Err(unauthorized(role, "cancel", from))
        };
    }

    let rule = find_rule(from, to).ok_or(WorkflowError::InvalidTransition { from, to })?;
    if rule.is_system() {
        return Err(unauthorized(role, format!("move to {}", to), from));
    }
    if role.is_superuser() || rule.roles.contains(&role) {
        Ok(())
    } else {
        Err(unauthorized(role, format!("move to {}", to), from))
    }
}

/// Whether `role` may receive goods against a request in `status`
pub fn authorize_receipt(role: RoleId, status: ProcurementStatus) -> Result<(), WorkflowError> {
    if status.is_terminal() {
        return Err(WorkflowError::Immutable(status));
    }
    if role.is_superuser() || RECEIPT_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(unauthorized(role, "receive goods", status))
    }
}

/// Structural check for a transition against the request's lines
pub fn check_guard(
    from: ProcurementStatus,
    to: ProcurementStatus,
    composition: &LineComposition,
) -> Result<(), WorkflowError> {
    if to == Cancelled {
        return Ok(());
    }
    let rule = find_rule(from, to).ok_or(WorkflowError::InvalidTransition { from, to })?;
    match rule.guard {
        TransitionGuard::None => Ok(()),
        TransitionGuard::SuppliersAllocated if composition.unallocated > 0 => {
            Err(WorkflowError::SupplierAllocationIncomplete {
                missing: composition.unallocated,
            })
        }
        TransitionGuard::SuppliersAllocated => Ok(()),
        TransitionGuard::RawMaterialsOnly if composition.has_product() => {
            Err(WorkflowError::InvalidTransition { from, to })
        }
        TransitionGuard::RawMaterialsOnly => Ok(()),
        TransitionGuard::HasProductLine if !composition.has_product() => {
            Err(WorkflowError::InvalidTransition { from, to })
        }
        TransitionGuard::HasProductLine => Ok(()),
    }
}

/// Full check used before any transition is written
pub fn validate_transition(
    role: RoleId,
    from: ProcurementStatus,
    to: ProcurementStatus,
    lines: &[ProcurementLine],
) -> Result<(), WorkflowError> {
    authorize_transition(role, from, to)?;
    check_guard(from, to, &LineComposition::of(lines))
}

/// Whether `role` may change `field` on a line of a request in `status`
pub fn authorize_line_edit(
    role: RoleId,
    status: ProcurementStatus,
    field: LineField,
) -> Result<(), WorkflowError> {
    if status.is_terminal() {
        return Err(WorkflowError::Immutable(status));
    }
    if role.is_superuser() {
        return Ok(());
    }

    let allowed = LINE_EDIT_RULES
        .iter()
        .filter(|rule| rule.field == field)
        .any(|rule| rule.statuses.contains(&status) && rule.roles.contains(&role));

    if allowed {
        Ok(())
    } else {
        Err(unauthorized(role, format!("edit {}", field.as_str()), status))
    }
}

/// Whether `role` may delete a request in `status`
pub fn authorize_delete(role: RoleId, status: ProcurementStatus) -> Result<(), WorkflowError> {
    if !DELETABLE_STATUSES.contains(&status) {
        return Err(WorkflowError::NotDeletable(status));
    }
    if role.is_superuser() || DELETE_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(unauthorized(role, "delete", status))
    }
}

/// Records written against a request that a delete would leave dangling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestDependents {
    pub receipts: i64,
    pub assignments: i64,
}

/// A cancelled request that already received goods or started production
/// keeps its history and cannot be deleted
pub fn check_no_dependents(dependents: RequestDependents) -> Result<(), WorkflowError> {
    if dependents.receipts > 0 || dependents.assignments > 0 {
        Err(WorkflowError::HasDependents {
            receipts: dependents.receipts,
            assignments: dependents.assignments,
        })
    } else {
        Ok(())
    }
}

/// Roles that may move a request out of `from`, for display
pub fn roles_acting_on(from: ProcurementStatus) -> Vec<RoleId> {
    let mut roles: Vec<RoleId> = TRANSITIONS
        .iter()
        .filter(|rule| rule.from == from)
        .flat_map(|rule| rule.roles.iter().copied())
        .collect();
    roles.sort();
    roles.dedup();
    roles
}
