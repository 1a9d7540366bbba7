//! # CretoAI Role/Policy Access Control
//!
//! Role-based permissions combined with priority-ordered allow/deny policies.
//!
//! ## Features
//!
//! - **`resource:action` permissions** with `*` wildcards on either side
//! - **Role inheritance** with cycle-safe resolution
//! - **Attribute, IP and time conditions** on allow/deny policies
//! - **Scoped, expiring role assignments**
//! - **Snapshot caching** invalidated on every mutation
//! - **Pluggable storage and audit sinks** via async traits
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rbac::{
//!     AccessContext, AccessControl, AccessControlConfig, Action, InMemoryAccessStore,
//!     NewAssignment, Resource,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AccessControl::new(
//!         AccessControlConfig::default(),
//!         Arc::new(InMemoryAccessStore::new()),
//!     );
//!
//!     engine
//!         .assign_role(NewAssignment::new("alice", "role-viewer", "admin"))
//!         .await?;
//!
//!     let result = engine
//!         .check_access(
//!             &AccessContext::new("alice"),
//!             &Action::new("read"),
//!             &Resource::new("agent", "42"),
//!         )
//!         .await?;
//!
//!     if result.allowed {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod audit;
pub mod engine;
pub mod error;
pub mod permission;
pub mod policy;
pub mod role;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use assignment::{AssignmentManager, NewAssignment, UserRoleAssignment};
pub use audit::{AuditLogEntry, AuditSink, AuditStats, MemoryAuditSink, TracingAuditSink};
pub use engine::{AccessControl, AccessControlConfig, CacheStats, EngineMetrics};
pub use error::{AccessError, Result};
pub use permission::Permission;
pub use policy::{
    ConditionOperator, ConditionType, NewPolicy, Policy, PolicyCondition, PolicyEffect, PolicyUpdate,
};
pub use role::{NewRole, Role, RoleResolver, RoleUpdate, SystemRole};
pub use store::{AccessStore, InMemoryAccessStore};
pub use types::{
    AccessCheckResult, AccessContext, Action, AttributeValue, PolicyId, Resource, RoleId, UserId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
