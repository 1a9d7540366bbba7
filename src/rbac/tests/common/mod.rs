//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cretoai_rbac::{
    AccessControl, AccessControlConfig, AccessError, AccessStore, AuditLogEntry, AuditSink,
    InMemoryAccessStore, MemoryAuditSink, NewAssignment, NewPolicy, NewRole, Policy, PolicyUpdate,
    Result, Role, RoleUpdate, UserRoleAssignment,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Route engine logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine over a seeded in-memory store with a memory audit sink
pub fn engine_with_audit(config: AccessControlConfig) -> (AccessControl, Arc<MemoryAuditSink>) {
    init_tracing();
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = AccessControl::new(config, Arc::new(InMemoryAccessStore::new())).with_audit_sink(sink.clone());
    (engine, sink)
}

pub fn engine() -> AccessControl {
    engine_with_audit(AccessControlConfig::default()).0
}

pub async fn assign(engine: &AccessControl, user: &str, role: &str) -> UserRoleAssignment {
    engine
        .assign_role(NewAssignment::new(user, role, "test-admin"))
        .await
        .unwrap()
}

/// Audit sink that always fails
#[derive(Default)]
pub struct FailingAuditSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn log_access(&self, _entry: AuditLogEntry) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AccessError::AuditSink("audit pipeline unavailable".to_string()))
    }
}

/// Store whose every operation fails
pub struct FailingStore;

fn unavailable<T>() -> Result<T> {
    Err(AccessError::Storage("connection refused".to_string()))
}

#[async_trait]
impl AccessStore for FailingStore {
    async fn get_roles(&self) -> Result<Vec<Role>> {
        unavailable()
    }

    async fn get_role(&self, _id: &str) -> Result<Option<Role>> {
        unavailable()
    }

    async fn create_role(&self, _role: NewRole) -> Result<Role> {
        unavailable()
    }

    async fn update_role(&self, _id: &str, _update: RoleUpdate) -> Result<Role> {
        unavailable()
    }

    async fn delete_role(&self, _id: &str) -> Result<()> {
        unavailable()
    }

    async fn get_policies(&self) -> Result<Vec<Policy>> {
        unavailable()
    }

    async fn get_policy(&self, _id: &str) -> Result<Option<Policy>> {
        unavailable()
    }

    async fn create_policy(&self, _policy: NewPolicy) -> Result<Policy> {
        unavailable()
    }

    async fn update_policy(&self, _id: &str, _update: PolicyUpdate) -> Result<Policy> {
        unavailable()
    }

    async fn delete_policy(&self, _id: &str) -> Result<()> {
        unavailable()
    }

    async fn get_user_roles(&self, _user_id: &str) -> Result<Vec<UserRoleAssignment>> {
        unavailable()
    }

    async fn assign_role(&self, _assignment: NewAssignment) -> Result<UserRoleAssignment> {
        unavailable()
    }

    async fn revoke_role(&self, _user_id: &str, _role_id: &str, _scope: Option<&str>) -> Result<()> {
        unavailable()
    }
}

/// Seeded store that loses the `is_system` flag on every role it returns
#[derive(Default)]
pub struct UnflaggedStore {
    inner: InMemoryAccessStore,
}

fn unflag(mut role: Role) -> Role {
    role.is_system = false;
    role
}

#[async_trait]
impl AccessStore for UnflaggedStore {
    async fn get_roles(&self) -> Result<Vec<Role>> {
        Ok(self.inner.get_roles().await?.into_iter().map(unflag).collect())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.inner.get_role(id).await?.map(unflag))
    }

    async fn create_role(&self, role: NewRole) -> Result<Role> {
        self.inner.create_role(role).await
    }

    async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Role> {
        self.inner.update_role(id, update).await
    }

    async fn delete_role(&self, id: &str) -> Result<()> {
        self.inner.delete_role(id).await
    }

    async fn get_policies(&self) -> Result<Vec<Policy>> {
        self.inner.get_policies().await
    }

    async fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        self.inner.get_policy(id).await
    }

    async fn create_policy(&self, policy: NewPolicy) -> Result<Policy> {
        self.inner.create_policy(policy).await
    }

    async fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy> {
        self.inner.update_policy(id, update).await
    }

    async fn delete_policy(&self, id: &str) -> Result<()> {
        self.inner.delete_policy(id).await
    }

    async fn get_user_roles(&self, user_id: &str) -> Result<Vec<UserRoleAssignment>> {
        self.inner.get_user_roles(user_id).await
    }

    async fn assign_role(&self, assignment: NewAssignment) -> Result<UserRoleAssignment> {
        self.inner.assign_role(assignment).await
    }

    async fn revoke_role(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> Result<()> {
        self.inner.revoke_role(user_id, role_id, scope).await
    }
}
