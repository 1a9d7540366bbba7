//! Roles, role inheritance and the built-in role catalog
//!
//! A role bundles permission tokens and may inherit other roles. The
//! resolver flattens a role (or a user's assignments) into one permission
//! set, tolerating inheritance cycles.

pub mod resolver;
pub mod system;
pub mod types;

pub use resolver::{ResolvedPermissions, RoleResolver};
pub use system::{system_roles, SystemRole};
pub use types::{NewRole, Role, RoleUpdate};
