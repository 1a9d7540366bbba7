//! Error types for the access-control engine

use crate::types::{PolicyId, RoleId};
use thiserror::Error;

/// Access-control engine errors
#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed input (bad permission string, missing field)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Role not found
    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),

    /// Policy not found
    #[error("Policy not found: {0}")]
    PolicyNotFound(PolicyId),

    /// Attempt to modify a system role
    #[error("System role '{0}' cannot be modified")]
    ImmutableRole(RoleId),

    /// Raised by `require_access` when a check is denied
    #[error("Access denied: cannot {action} {resource}: {reason}")]
    AccessDenied {
        action: String,
        resource: String,
        reason: String,
    },

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Audit sink failure
    #[error("Audit sink error: {0}")]
    AuditSink(String),
}

impl AccessError {
    /// True for any of the not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RoleNotFound(_) | Self::PolicyNotFound(_))
    }

    /// True if this error carries an access denial
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for access-control operations
pub type Result<T> = std::result::Result<T, AccessError>;
