//! Access control tests
//!
//! - Built-in grants per role
//! - Configuration overrides
//! - Superuser bypass

use std::collections::HashMap;

use inventory_procurement_backend::access::AccessControl;
use inventory_procurement_backend::AppError;
use shared::models::{Action, Actor, Resource, RoleId};
use uuid::Uuid;

#[test]
fn test_default_grants() {
    let access = AccessControl::with_defaults();

    assert!(access.is_allowed(RoleId::WarehouseStaff, Resource::Inventory, Action::Adjust));
    assert!(access.is_allowed(RoleId::WarehouseManager, Resource::Inventory, Action::Create));
    assert!(access.is_allowed(RoleId::ProcurementStaff, Resource::Supplier, Action::Edit));
    assert!(access.is_allowed(RoleId::Viewer, Resource::Procurement, Action::View));
    assert!(!access.is_allowed(RoleId::Viewer, Resource::Inventory, Action::Adjust));
    assert!(!access.is_allowed(RoleId::FinanceStaff, Resource::Shipment, Action::Create));
}

#[test]
fn test_superuser_allowed_everything() {
    let access = AccessControl::from_config(&HashMap::from([(
        "super_admin".to_string(),
        Vec::new(),
    )]))
    .unwrap();

    for resource in [Resource::Inventory, Resource::Procurement, Resource::Production] {
        for action in [Action::View, Action::Create, Action::Edit, Action::Delete, Action::Adjust] {
            assert!(access.is_allowed(RoleId::SuperAdmin, resource, action));
        }
    }
}

#[test]
fn test_config_replaces_role_grants() {
    let overrides = HashMap::from([(
        "viewer".to_string(),
        vec!["inventory:adjust".to_string(), " report : view ".to_string()],
    )]);
    let access = AccessControl::from_config(&overrides).unwrap();

    assert!(access.is_allowed(RoleId::Viewer, Resource::Inventory, Action::Adjust));
    assert!(access.is_allowed(RoleId::Viewer, Resource::Report, Action::View));
    assert!(!access.is_allowed(RoleId::Viewer, Resource::Procurement, Action::View));
    // Untouched roles keep their defaults
    assert!(access.is_allowed(RoleId::WarehouseStaff, Resource::Inventory, Action::Adjust));
}

#[test]
fn test_unknown_role_or_grant_is_rejected() {
    let bad_role = HashMap::from([("janitor".to_string(), vec!["inventory:view".to_string()])]);
    assert!(matches!(AccessControl::from_config(&bad_role), Err(AppError::Configuration(_))));

    let bad_grant = HashMap::from([("viewer".to_string(), vec!["inventory:fly".to_string()])]);
    assert!(matches!(AccessControl::from_config(&bad_grant), Err(AppError::Configuration(_))));
}

#[test]
fn test_require_denies_with_permission_error() {
    let access = AccessControl::with_defaults();
    let viewer = Actor::new(Uuid::new_v4(), RoleId::Viewer);

    let err = access.require(&viewer, Resource::Inventory, Action::Adjust).unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions));
    assert!(err.is_authorization());
}
