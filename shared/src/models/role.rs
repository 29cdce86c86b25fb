//! Role catalog and permission models
//!
//! Roles are a fixed catalog. Authorization everywhere compares only the
//! role identifier, never display attributes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    SuperAdmin,
    WarehouseStaff,
    WarehouseManager,
    ProcurementStaff,
    ProcurementManager,
    FinanceStaff,
    FinanceManager,
    RndStaff,
    RndManager,
    Viewer,
}

impl RoleId {
    pub const ALL: [RoleId; 10] = [
        RoleId::SuperAdmin,
        RoleId::WarehouseStaff,
        RoleId::WarehouseManager,
        RoleId::ProcurementStaff,
        RoleId::ProcurementManager,
        RoleId::FinanceStaff,
        RoleId::FinanceManager,
        RoleId::RndStaff,
        RoleId::RndManager,
        RoleId::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::SuperAdmin => "super_admin",
            RoleId::WarehouseStaff => "warehouse_staff",
            RoleId::WarehouseManager => "warehouse_manager",
            RoleId::ProcurementStaff => "procurement_staff",
            RoleId::ProcurementManager => "procurement_manager",
            RoleId::FinanceStaff => "finance_staff",
            RoleId::FinanceManager => "finance_manager",
            RoleId::RndStaff => "rnd_staff",
            RoleId::RndManager => "rnd_manager",
            RoleId::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.as_str() == s)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoleId::SuperAdmin => "Super Admin",
            RoleId::WarehouseStaff => "Warehouse Staff",
            RoleId::WarehouseManager => "Warehouse Manager",
            RoleId::ProcurementStaff => "Procurement Staff",
            RoleId::ProcurementManager => "Procurement Manager",
            RoleId::FinanceStaff => "Finance Staff",
            RoleId::FinanceManager => "Finance Manager",
            RoleId::RndStaff => "R&D Staff",
            RoleId::RndManager => "R&D Manager",
            RoleId::Viewer => "Viewer",
        }
    }

    /// Indonesian display name
    pub fn display_name_id(&self) -> &'static str {
        match self {
            RoleId::SuperAdmin => "Admin Utama",
            RoleId::WarehouseStaff => "Staf Gudang",
            RoleId::WarehouseManager => "Manajer Gudang",
            RoleId::ProcurementStaff => "Staf Pengadaan",
            RoleId::ProcurementManager => "Manajer Pengadaan",
            RoleId::FinanceStaff => "Staf Keuangan",
            RoleId::FinanceManager => "Manajer Keuangan",
            RoleId::RndStaff => "Staf RnD",
            RoleId::RndManager => "Manajer RnD",
            RoleId::Viewer => "Pengamat",
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, RoleId::SuperAdmin)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: RoleId,
}

impl Actor {
    pub fn new(user_id: Uuid, role: RoleId) -> Self {
        Self { user_id, role }
    }
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Inventory,
    Procurement,
    Supplier,
    Production,
    Shipment,
    Report,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Inventory => "inventory",
            Resource::Procurement => "procurement",
            Resource::Supplier => "supplier",
            Resource::Production => "production",
            Resource::Shipment => "shipment",
            Resource::Report => "report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inventory" => Some(Resource::Inventory),
            "procurement" => Some(Resource::Procurement),
            "supplier" => Some(Resource::Supplier),
            "production" => Some(Resource::Production),
            "shipment" => Some(Resource::Shipment),
            "report" => Some(Resource::Report),
            _ => None,
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Adjust,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Adjust => "adjust",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "edit" => Some(Action::Edit),
            "delete" => Some(Action::Delete),
            "adjust" => Some(Action::Adjust),
            _ => None,
        }
    }
}

/// A single `resource:action` permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub resource: Resource,
    pub action: Action,
}

impl Grant {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Parse `"inventory:adjust"`
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        Some(Self::new(
            Resource::parse(resource.trim())?,
            Action::parse(action.trim())?,
        ))
    }
}

impl std::fmt::Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

/// Default grants for each role, used when configuration does not override them
pub fn default_grants(role: RoleId) -> Vec<Grant> {
    use Action::*;
    use Resource::*;

    let views = [Inventory, Procurement, Supplier, Production, Shipment]
        .into_iter()
        .map(|r| Grant::new(r, View));

    let extra: Vec<Grant> = match role {
        RoleId::SuperAdmin => return Vec::new(),
        RoleId::WarehouseStaff => vec![
            Grant::new(Inventory, Adjust),
            Grant::new(Procurement, Create),
            Grant::new(Procurement, Edit),
            Grant::new(Shipment, Create),
            Grant::new(Shipment, Edit),
        ],
        RoleId::WarehouseManager => vec![
            Grant::new(Inventory, Create),
            Grant::new(Inventory, Edit),
            Grant::new(Inventory, Adjust),
            Grant::new(Procurement, Create),
            Grant::new(Procurement, Edit),
            Grant::new(Procurement, Delete),
            Grant::new(Shipment, Create),
            Grant::new(Shipment, Edit),
            Grant::new(Report, View),
        ],
        RoleId::ProcurementStaff => vec![
            Grant::new(Procurement, Edit),
            Grant::new(Supplier, Create),
            Grant::new(Supplier, Edit),
        ],
        RoleId::ProcurementManager => vec![
            Grant::new(Procurement, Edit),
            Grant::new(Supplier, Create),
            Grant::new(Supplier, Edit),
            Grant::new(Supplier, Delete),
            Grant::new(Report, View),
        ],
        RoleId::FinanceStaff => vec![Grant::new(Report, View)],
        RoleId::FinanceManager => vec![Grant::new(Procurement, Edit), Grant::new(Report, View)],
        RoleId::RndStaff => vec![Grant::new(Production, Edit)],
        RoleId::RndManager => vec![
            Grant::new(Production, Create),
            Grant::new(Production, Edit),
            Grant::new(Production, Delete),
        ],
        RoleId::Viewer => Vec::new(),
    };

    views.chain(extra).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_ten_roles() {
        assert_eq!(RoleId::ALL.len(), 10);
        for role in RoleId::ALL {
            assert_eq!(RoleId::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_only_super_admin_is_superuser() {
        let superusers: Vec<_> = RoleId::ALL.iter().filter(|r| r.is_superuser()).collect();
        assert_eq!(superusers, vec![&RoleId::SuperAdmin]);
    }

    #[test]
    fn test_grant_parse() {
        assert_eq!(
            Grant::parse("inventory:adjust"),
            Some(Grant::new(Resource::Inventory, Action::Adjust))
        );
        assert_eq!(Grant::parse("inventory"), None);
        assert_eq!(Grant::parse("payroll:view"), None);
        assert_eq!(Grant::new(Resource::Shipment, Action::Create).to_string(), "shipment:create");
    }

    #[test]
    fn test_default_grants() {
        let staff = default_grants(RoleId::WarehouseStaff);
        assert!(staff.contains(&Grant::new(Resource::Inventory, Action::Adjust)));
        assert!(!staff.contains(&Grant::new(Resource::Procurement, Action::Delete)));

        let viewer = default_grants(RoleId::Viewer);
        assert!(viewer.iter().all(|g| g.action == Action::View));
    }
}
