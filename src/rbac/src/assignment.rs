//! Principal-to-role assignments
//!
//! Assignments may be scoped and may expire. Expiry is a read-time filter:
//! expired rows stay in storage but are invisible to resolution.

use crate::error::{AccessError, Result};
use crate::store::AccessStore;
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A role granted to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleAssignment {
    pub user_id: UserId,
    pub role_id: RoleId,

    /// Optional qualifier (team, org, project)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
}

impl UserRoleAssignment {
    /// Whether the assignment is still in force at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    /// Revocation identity: `(user, role, scope)`, where no scope is its own key
    pub fn same_key(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> bool {
        self.user_id == user_id && self.role_id == role_id && self.scope.as_deref() == scope
    }
}

/// Assignment request; the store stamps `granted_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub user_id: UserId,
    pub role_id: RoleId,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    pub granted_by: UserId,
}

impl NewAssignment {
    pub fn new(
        user_id: impl Into<UserId>,
        role_id: impl Into<RoleId>,
        granted_by: impl Into<UserId>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role_id: role_id.into(),
            scope: None,
            expires_at: None,
            granted_by: granted_by.into(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AccessError::validation("Assignment user id cannot be empty"));
        }
        if self.role_id.trim().is_empty() {
            return Err(AccessError::validation("Assignment role id cannot be empty"));
        }
        if self.granted_by.trim().is_empty() {
            return Err(AccessError::validation("Assignment grantor cannot be empty"));
        }
        Ok(())
    }

    pub fn into_assignment(self, granted_at: DateTime<Utc>) -> UserRoleAssignment {
        UserRoleAssignment {
            user_id: self.user_id,
            role_id: self.role_id,
            scope: self.scope,
            expires_at: self.expires_at,
            granted_by: self.granted_by,
            granted_at,
        }
    }
}

/// Manages the principal/role relation on top of the store
#[derive(Clone)]
pub struct AssignmentManager {
    store: Arc<dyn AccessStore>,
}

impl AssignmentManager {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Grant a role; fails if the role does not exist
    pub async fn assign(&self, assignment: NewAssignment) -> Result<UserRoleAssignment> {
        assignment.validate()?;

        if self.store.get_role(&assignment.role_id).await?.is_none() {
            return Err(AccessError::RoleNotFound(assignment.role_id));
        }

        let assignment = self.store.assign_role(assignment).await?;
        debug!(
            "Assigned role {} to {} (scope={:?}, expires_at={:?})",
            assignment.role_id, assignment.user_id, assignment.scope, assignment.expires_at
        );

        Ok(assignment)
    }

    /// Remove an assignment; revoking a missing assignment is not an error
    pub async fn revoke(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> Result<()> {
        self.store.revoke_role(user_id, role_id, scope).await?;
        debug!("Revoked role {} from {} (scope={:?})", role_id, user_id, scope);
        Ok(())
    }

    /// Non-expired assignments for a principal, evaluated at call time
    pub async fn list_active(&self, user_id: &str) -> Result<Vec<UserRoleAssignment>> {
        let now = Utc::now();
        let assignments = self.store.get_user_roles(user_id).await?;

        Ok(assignments
            .into_iter()
            .filter(|a| a.is_active_at(now))
            .collect())
    }
}
