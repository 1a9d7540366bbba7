//! Role type definitions

use crate::error::{AccessError, Result};
use crate::permission::{self, Permission};
use crate::types::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Role definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Unique role identifier (e.g., "role-admin")
    pub id: RoleId,

    /// Role name (e.g., "admin")
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Permissions granted directly by this role
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,

    /// Roles whose permissions this role also grants
    #[serde(default)]
    pub inherits: Vec<RoleId>,

    /// Built-in roles cannot be updated or deleted
    #[serde(default)]
    pub is_system: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Role definition without identity or timestamps, as passed to `create_role`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub permissions: BTreeSet<Permission>,

    #[serde(default)]
    pub inherits: Vec<RoleId>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl NewRole {
    /// Start a role definition with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add permission tokens, rejecting malformed ones
    pub fn with_permissions<I, S>(mut self, tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permissions.extend(permission::parse_all(tokens)?);
        Ok(self)
    }

    /// Inherit the permissions of another role
    pub fn inheriting(mut self, role_id: impl Into<RoleId>) -> Self {
        self.inherits.push(role_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Validate required fields
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AccessError::validation("Role name cannot be empty"));
        }
        Ok(())
    }

    /// Materialize into a stored role
    pub fn into_role(self, id: RoleId, now: DateTime<Utc>) -> Role {
        Role {
            id,
            name: self.name,
            description: self.description,
            permissions: self.permissions,
            inherits: self.inherits,
            is_system: false,
            created_at: now,
            updated_at: now,
            metadata: self.metadata,
        }
    }
}

/// Partial role update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub permissions: Option<BTreeSet<Permission>>,

    #[serde(default)]
    pub inherits: Option<Vec<RoleId>>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl RoleUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the permission set, rejecting malformed tokens
    pub fn permissions<I, S>(mut self, tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permissions = Some(permission::parse_all(tokens)?);
        Ok(self)
    }

    pub fn inherits(mut self, role_ids: Vec<RoleId>) -> Self {
        self.inherits = Some(role_ids);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(AccessError::validation("Role name cannot be empty"));
        }
        Ok(())
    }

    /// Apply the provided fields and bump `updated_at`
    pub fn apply_to(self, role: &mut Role, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            role.name = name;
        }
        if let Some(description) = self.description {
            role.description = Some(description);
        }
        if let Some(permissions) = self.permissions {
            role.permissions = permissions;
        }
        if let Some(inherits) = self.inherits {
            role.inherits = inherits;
        }
        if let Some(metadata) = self.metadata {
            role.metadata = Some(metadata);
        }
        role.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_role_rejects_bad_permission() {
        let err = NewRole::new("auditor")
            .with_permissions(["audit:read", "audit"])
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));
    }

    #[test]
    fn test_new_role_validation() {
        assert!(NewRole::new("  ").validate().is_err());
        assert!(NewRole::new("auditor").validate().is_ok());
    }

    #[test]
    fn test_update_applies_fields() {
        let created = Utc::now();
        let mut role = NewRole::new("auditor")
            .with_permissions(["audit:read"])
            .unwrap()
            .into_role("role-auditor".to_string(), created);

        let later = created + chrono::Duration::seconds(5);
        RoleUpdate::new()
            .description("Reads audit logs")
            .permissions(["audit:read", "reports:read"])
            .unwrap()
            .apply_to(&mut role, later);

        assert_eq!(role.name, "auditor");
        assert_eq!(role.description.as_deref(), Some("Reads audit logs"));
        assert_eq!(role.permissions.len(), 2);
        assert_eq!(role.updated_at, later);
        assert_eq!(role.created_at, created);
    }
}
