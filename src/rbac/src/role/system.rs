//! Built-in system roles seeded into every fresh store

use super::types::Role;
use crate::permission::Permission;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Catalog of immutable system roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRole {
    SuperAdmin,
    Admin,
    Developer,
    Analyst,
    Viewer,
}

impl SystemRole {
    pub const ALL: [SystemRole; 5] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::Developer,
        Self::Analyst,
        Self::Viewer,
    ];

    /// Stable role identifier
    pub fn id(self) -> &'static str {
        match self {
            Self::SuperAdmin => "role-super-admin",
            Self::Admin => "role-admin",
            Self::Developer => "role-developer",
            Self::Analyst => "role-analyst",
            Self::Viewer => "role-viewer",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Developer => "developer",
            Self::Analyst => "analyst",
            Self::Viewer => "viewer",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::SuperAdmin => "Unrestricted access to every resource",
            Self::Admin => "Manages agents, workflows, users, roles and policies",
            Self::Developer => "Builds and runs agents, workflows and tools",
            Self::Analyst => "Reads operational data and produces reports",
            Self::Viewer => "Read-only access to agents, workflows and executions",
        }
    }

    fn permissions(self) -> &'static [&'static str] {
        match self {
            Self::SuperAdmin => &["*:*"],
            Self::Admin => &[
                "users:*",
                "roles:*",
                "policies:*",
                "settings:*",
                "audit:read",
            ],
            Self::Developer => &[
                "agents:*",
                "workflows:*",
                "tools:*",
                "executions:*",
            ],
            Self::Analyst => &["reports:*", "audit:read", "metrics:read"],
            Self::Viewer => &["agents:read", "workflows:read", "executions:read"],
        }
    }

    fn inherits(self) -> &'static [SystemRole] {
        match self {
            Self::SuperAdmin => &[],
            Self::Admin => &[Self::Developer, Self::Analyst],
            Self::Developer | Self::Analyst => &[Self::Viewer],
            Self::Viewer => &[],
        }
    }

    /// Look up a system role by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.id() == id)
    }

    fn to_role(self, now: DateTime<Utc>) -> Role {
        let permissions: BTreeSet<Permission> = self
            .permissions()
            .iter()
            .filter_map(|token| Permission::parse(token).ok())
            .collect();

        Role {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            permissions,
            inherits: self.inherits().iter().map(|r| r.id().to_string()).collect(),
            is_system: true,
            created_at: now,
            updated_at: now,
            metadata: None,
        }
    }
}

/// Fresh copies of every system role, stamped with `now`
pub fn system_roles(now: DateTime<Utc>) -> Vec<Role> {
    SystemRole::ALL.into_iter().map(|r| r.to_role(now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_complete() {
        let roles = system_roles(Utc::now());
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["super_admin", "admin", "developer", "analyst", "viewer"]);
        assert!(roles.iter().all(|r| r.is_system));
    }

    #[test]
    fn test_catalog_permissions_are_valid() {
        for role in SystemRole::ALL {
            assert_eq!(
                role.to_role(Utc::now()).permissions.len(),
                role.permissions().len(),
                "{} has a malformed permission",
                role.name()
            );
        }
    }

    #[test]
    fn test_from_id() {
        assert_eq!(SystemRole::from_id("role-admin"), Some(SystemRole::Admin));
        assert_eq!(SystemRole::from_id("role-custom"), None);
    }
}
