//! Access-control component for non-workflow permissions
//!
//! Built once at startup from the `access` configuration section. Roles the
//! configuration does not mention keep the built-in grant catalog.

use std::collections::{HashMap, HashSet};

use shared::models::{default_grants, Action, Actor, Grant, Resource, RoleId};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AccessControl {
    grants: HashMap<RoleId, HashSet<Grant>>,
}

impl AccessControl {
    /// Catalog defaults for every role
    pub fn with_defaults() -> Self {
        let grants = RoleId::ALL
            .iter()
            .map(|role| (*role, default_grants(*role).into_iter().collect()))
            .collect();
        Self { grants }
    }

    /// Defaults overridden per role by `role → ["resource:action", ...]`
    pub fn from_config(overrides: &HashMap<String, Vec<String>>) -> AppResult<Self> {
        let mut access = Self::with_defaults();

        for (role_key, entries) in overrides {
            let role = RoleId::parse(role_key)
                .ok_or_else(|| AppError::Configuration(format!("Unknown role in access: {}", role_key)))?;

            let grants = entries
                .iter()
                .map(|entry| {
                    Grant::parse(entry).ok_or_else(|| {
                        AppError::Configuration(format!("Invalid grant '{}' for role {}", entry, role_key))
                    })
                })
                .collect::<AppResult<HashSet<Grant>>>()?;

            access.grants.insert(role, grants);
        }

        Ok(access)
    }

    pub fn is_allowed(&self, role: RoleId, resource: Resource, action: Action) -> bool {
        if role.is_superuser() {
            return true;
        }
        self.grants
            .get(&role)
            .is_some_and(|grants| grants.contains(&Grant::new(resource, action)))
    }

    /// Reject with `InsufficientPermissions` when the actor's role lacks the grant
    pub fn require(&self, actor: &Actor, resource: Resource, action: Action) -> AppResult<()> {
        if self.is_allowed(actor.role, resource, action) {
            Ok(())
        } else {
            tracing::warn!(
                "Denied {}:{} for user {} with role {}",
                resource.as_str(),
                action.as_str(),
                actor.user_id,
                actor.role.as_str()
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}
