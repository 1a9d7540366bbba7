//! Role inheritance resolution
//!
//! Flattens a role and everything it inherits into one permission set.
//! Inheritance graphs are not required to be acyclic: a role already on the
//! current expansion path is not expanded again, and permissions gathered
//! so far are kept.

use super::types::Role;
use crate::assignment::AssignmentManager;
use crate::error::Result;
use crate::permission::Permission;
use crate::types::RoleId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// A principal's flattened permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPermissions {
    pub permissions: BTreeSet<Permission>,

    /// Earliest expiry among the contributing assignments
    pub valid_until: Option<DateTime<Utc>>,
}

/// Resolves permissions over a snapshot of role definitions
pub struct RoleResolver<'a> {
    roles: &'a HashMap<RoleId, Role>,
}

impl<'a> RoleResolver<'a> {
    pub fn new(roles: &'a HashMap<RoleId, Role>) -> Self {
        Self { roles }
    }

    /// Own permissions of a role unioned with every inherited role's
    pub fn resolve_permissions(&self, role_id: &str) -> BTreeSet<Permission> {
        let mut permissions = BTreeSet::new();
        let mut visited = HashSet::new();
        self.expand(role_id, &mut visited, &mut Vec::new(), &mut permissions);
        permissions
    }

    /// Union of the resolved permissions of several roles
    pub fn resolve_roles<I, S>(&self, role_ids: I) -> BTreeSet<Permission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut permissions = BTreeSet::new();
        let mut visited = HashSet::new();
        for role_id in role_ids {
            self.expand(role_id.as_ref(), &mut visited, &mut Vec::new(), &mut permissions);
        }
        permissions
    }

    /// Role ids reachable from `role_id`, itself included
    pub fn effective_roles(&self, role_id: &str) -> BTreeSet<RoleId> {
        let mut visited = HashSet::new();
        self.expand(role_id, &mut visited, &mut Vec::new(), &mut BTreeSet::new());
        visited.into_iter().filter(|id| self.roles.contains_key(id)).collect()
    }

    /// Resolve a principal's permissions from its non-expired assignments,
    /// along with when the set stops being valid
    pub async fn resolve_user(
        &self,
        user_id: &str,
        assignments: &AssignmentManager,
    ) -> Result<ResolvedPermissions> {
        let active = assignments.list_active(user_id).await?;
        let permissions = self.resolve_roles(active.iter().map(|a| a.role_id.as_str()));
        let valid_until = active.iter().filter_map(|a| a.expires_at).min();

        debug!(
            "Resolved {} permissions for {} from {} assignments",
            permissions.len(),
            user_id,
            active.len()
        );

        Ok(ResolvedPermissions {
            permissions,
            valid_until,
        })
    }

    fn expand(
        &self,
        role_id: &str,
        visited: &mut HashSet<RoleId>,
        path: &mut Vec<RoleId>,
        permissions: &mut BTreeSet<Permission>,
    ) {
        if path.iter().any(|id| id == role_id) {
            warn!(
                "Role inheritance cycle detected: {} -> {}",
                path.join(" -> "),
                role_id
            );
            return;
        }

        // Diamond inheritance: already fully expanded through another branch
        if !visited.insert(role_id.to_string()) {
            return;
        }

        let Some(role) = self.roles.get(role_id) else {
            warn!("Unknown role referenced during resolution: {}", role_id);
            return;
        };

        permissions.extend(role.permissions.iter().cloned());

        path.push(role_id.to_string());
        for parent in &role.inherits {
            self.expand(parent, visited, path, permissions);
        }
        path.pop();
    }
}
