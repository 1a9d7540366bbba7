//! Storage abstraction for roles, policies and assignments
//!
//! The store is the source of truth; the engine only caches what it loads
//! from here. `InMemoryAccessStore` is seeded with the system roles and is
//! suitable for tests and single-process deployments.

use crate::assignment::{NewAssignment, UserRoleAssignment};
use crate::error::{AccessError, Result};
use crate::policy::{NewPolicy, Policy, PolicyUpdate};
use crate::role::{system_roles, NewRole, Role, RoleUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistent storage backend consumed by the engine
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// List all roles
    async fn get_roles(&self) -> Result<Vec<Role>>;

    /// Get a role by ID
    async fn get_role(&self, id: &str) -> Result<Option<Role>>;

    /// Create a role, assigning its ID and timestamps
    async fn create_role(&self, role: NewRole) -> Result<Role>;

    /// Update a role; fails if absent
    async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Role>;

    /// Delete a role
    async fn delete_role(&self, id: &str) -> Result<()>;

    /// List all policies in storage order
    async fn get_policies(&self) -> Result<Vec<Policy>>;

    /// Get a policy by ID
    async fn get_policy(&self, id: &str) -> Result<Option<Policy>>;

    /// Create a policy, assigning its ID
    async fn create_policy(&self, policy: NewPolicy) -> Result<Policy>;

    /// Update a policy; fails if absent
    async fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy>;

    /// Delete a policy
    async fn delete_policy(&self, id: &str) -> Result<()>;

    /// All assignments for a principal, expired ones included
    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<UserRoleAssignment>>;

    /// Grant a role, stamping `granted_at`
    async fn assign_role(&self, assignment: NewAssignment) -> Result<UserRoleAssignment>;

    /// Remove the `(user, role, scope)` assignment if present
    async fn revoke_role(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> Result<()>;
}

#[derive(Default)]
struct StoreState {
    roles: Vec<Role>,
    policies: Vec<Policy>,
    assignments: Vec<UserRoleAssignment>,
}

/// In-memory store implementation
pub struct InMemoryAccessStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryAccessStore {
    /// Create a store seeded with the system roles
    pub fn new() -> Self {
        let state = StoreState {
            roles: system_roles(Utc::now()),
            ..Default::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }
}

impl Default for InMemoryAccessStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessStore for InMemoryAccessStore {
    async fn get_roles(&self) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.clone())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn create_role(&self, role: NewRole) -> Result<Role> {
        let role = role.into_role(format!("role-{}", Uuid::new_v4()), Utc::now());
        let mut state = self.state.write().await;
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Role> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AccessError::RoleNotFound(id.to_string()))?;

        update.apply_to(role, Utc::now());
        Ok(role.clone())
    }

    async fn delete_role(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.roles.len();
        state.roles.retain(|r| r.id != id);
        if state.roles.len() == before {
            return Err(AccessError::RoleNotFound(id.to_string()));
        }

        state.assignments.retain(|a| a.role_id != id);
        Ok(())
    }

    async fn get_policies(&self) -> Result<Vec<Policy>> {
        let state = self.state.read().await;
        Ok(state.policies.clone())
    }

    async fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        let state = self.state.read().await;
        Ok(state.policies.iter().find(|p| p.id == id).cloned())
    }

    async fn create_policy(&self, policy: NewPolicy) -> Result<Policy> {
        let policy = policy.into_policy(format!("policy-{}", Uuid::new_v4()));
        let mut state = self.state.write().await;
        state.policies.push(policy.clone());
        Ok(policy)
    }

    async fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy> {
        let mut state = self.state.write().await;
        let policy = state
            .policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AccessError::PolicyNotFound(id.to_string()))?;

        update.apply_to(policy);
        Ok(policy.clone())
    }

    async fn delete_policy(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.policies.len();
        state.policies.retain(|p| p.id != id);
        if state.policies.len() == before {
            return Err(AccessError::PolicyNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<UserRoleAssignment>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn assign_role(&self, assignment: NewAssignment) -> Result<UserRoleAssignment> {
        let assignment = assignment.into_assignment(Utc::now());
        let mut state = self.state.write().await;

        // Re-granting the same (user, role, scope) replaces the previous grant
        state.assignments.retain(|a| {
            !a.same_key(&assignment.user_id, &assignment.role_id, assignment.scope.as_deref())
        });
        state.assignments.push(assignment.clone());

        Ok(assignment)
    }

    async fn revoke_role(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> Result<()> {
        let mut state = self.state.write().await;
        state.assignments.retain(|a| !a.same_key(user_id, role_id, scope));
        Ok(())
    }
}
