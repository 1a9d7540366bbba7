//! Access-control engine
//!
//! Composes permission matching, role resolution, policy evaluation and
//! assignments into a single decision path with snapshot caching, audit
//! emission and metrics.

pub mod cache;
pub mod config;
pub mod metrics;

pub use cache::{AccessCache, CacheStats, Snapshot};
pub use config::AccessControlConfig;
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::assignment::{AssignmentManager, NewAssignment, UserRoleAssignment};
use crate::audit::{AuditLogEntry, AuditSink, TracingAuditSink};
use crate::error::{AccessError, Result};
use crate::permission::{self, Permission};
use crate::policy::{NewPolicy, Policy, PolicyEvaluator, PolicyUpdate, PolicyVerdict};
use crate::role::{NewRole, Role, RoleResolver, RoleUpdate, SystemRole};
use crate::store::AccessStore;
use crate::types::{AccessCheckResult, AccessContext, Action, Resource};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Access-control engine
///
/// # Architecture
///
/// ```text
/// Request → Snapshot → RoleResolver → Permission match ─┐
///             ↓                                         ├→ Decision → [Audit] → [Metrics]
///          [Cache] → PolicyEvaluator (priority order) ──┘
/// ```
///
/// Every instance owns its cache; two engines over the same store never
/// share memoized state.
pub struct AccessControl {
    config: AccessControlConfig,

    /// Storage backend for roles, policies and assignments
    store: Arc<dyn AccessStore>,

    assignments: AssignmentManager,

    /// Receives one entry per `check_access` when auditing is enabled
    audit_sink: Option<Arc<dyn AuditSink>>,

    cache: AccessCache,

    evaluator: PolicyEvaluator,

    metrics: MetricsCollector,
}

impl AccessControl {
    /// Create an engine over `store`
    ///
    /// With auditing enabled, decisions go to `TracingAuditSink` until a
    /// sink is supplied through `with_audit_sink`.
    pub fn new(config: AccessControlConfig, store: Arc<dyn AccessStore>) -> Self {
        info!(
            "AccessControl initialized with cache={} (ttl={:?}), audit={}, default_deny_all={}",
            config.cache_enabled, config.cache_ttl, config.enable_audit_log, config.default_deny_all
        );

        let audit_sink: Option<Arc<dyn AuditSink>> = if config.enable_audit_log {
            Some(Arc::new(TracingAuditSink))
        } else {
            None
        };

        Self {
            cache: AccessCache::new(config.cache_ttl),
            assignments: AssignmentManager::new(Arc::clone(&store)),
            evaluator: PolicyEvaluator::new(),
            metrics: MetricsCollector::new(),
            audit_sink,
            store,
            config,
        }
    }

    /// Replace the audit sink; ignored when auditing is disabled
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        if self.config.enable_audit_log {
            self.audit_sink = Some(sink);
        } else {
            debug!("Audit disabled, ignoring injected audit sink");
        }
        self
    }

    pub fn config(&self) -> &AccessControlConfig {
        &self.config
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Decide whether `context.user_id` may perform `action` on `resource`
    ///
    /// # Pipeline
    ///
    /// 1. Load (or reuse) the role/policy snapshot
    /// 2. Resolve the principal's permissions from active assignments
    /// 3. Evaluate applicable policies in priority order
    /// 4. Fall back to permission membership when no policy matches
    /// 5. Record metrics and emit the audit entry
    ///
    /// Denials are returned as `allowed == false`, never as errors. Storage
    /// failures propagate; audit sink failures are logged and swallowed.
    pub async fn check_access(
        &self,
        context: &AccessContext,
        action: &Action,
        resource: &Resource,
    ) -> Result<AccessCheckResult> {
        let start = Instant::now();

        debug!(
            "Access check: user={}, action={}, resource={}",
            context.user_id, action, resource
        );

        let (result, by_policy) = match self.decide(context, action, resource).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Access check failed for {}: {}", context.user_id, e);
                self.metrics.record_error();
                return Err(e);
            }
        };

        self.metrics.record_decision(result.allowed, by_policy);
        self.metrics.record_latency(start.elapsed());

        if let Some(sink) = &self.audit_sink {
            let entry = AuditLogEntry::for_decision(context, action, resource, &result);
            if let Err(e) = sink.log_access(entry).await {
                warn!("Audit sink failed, decision unaffected: {}", e);
                self.metrics.record_audit_failure();
            }
        }

        debug!(
            "Access {} for {} on {} ({})",
            if result.allowed { "granted" } else { "denied" },
            context.user_id,
            resource.pattern(),
            result.reason.as_deref().unwrap_or("")
        );

        Ok(result)
    }

    /// Like `check_access`, but a denial becomes `AccessError::AccessDenied`
    pub async fn require_access(
        &self,
        context: &AccessContext,
        action: &Action,
        resource: &Resource,
    ) -> Result<()> {
        let result = self.check_access(context, action, resource).await?;
        if result.allowed {
            return Ok(());
        }

        Err(AccessError::AccessDenied {
            action: action.name.clone(),
            resource: resource.pattern(),
            reason: result.reason.unwrap_or_else(|| "Access denied".to_string()),
        })
    }

    /// Check several (action, resource) pairs for one principal
    ///
    /// Results are keyed `"{action}:{type}:{id|*}"`; a repeated pair keeps one entry.
    pub async fn check_multiple_access(
        &self,
        context: &AccessContext,
        checks: &[(Action, Resource)],
    ) -> Result<HashMap<String, AccessCheckResult>> {
        let futures = checks.iter().map(|(action, resource)| async move {
            let result = self.check_access(context, action, resource).await?;
            Ok::<_, AccessError>((format!("{}:{}", action, resource.pattern()), result))
        });

        let results = futures::future::try_join_all(futures).await?;
        Ok(results.into_iter().collect())
    }

    async fn decide(
        &self,
        context: &AccessContext,
        action: &Action,
        resource: &Resource,
    ) -> Result<(AccessCheckResult, bool)> {
        let snapshot = self.snapshot().await?;
        let permissions = self.permissions_for(&context.user_id, &snapshot).await?;

        // Tokens may name the collection (`agents:read`) or the bare type (`audit:read`)
        let has_permission = permission::matches(&permissions, &resource.permission_type(), action.as_str())
            || permission::matches(&permissions, &resource.resource_type, action.as_str());

        let pattern = resource.pattern();
        let applicable = self
            .evaluator
            .applicable_policies(&snapshot.policies, &pattern, action.as_str());

        debug!(
            "{} applicable policies for {} {}, has_permission={}",
            applicable.len(),
            action,
            pattern,
            has_permission
        );

        let decision = match self.evaluator.decide(&applicable, context, resource) {
            PolicyVerdict::Denied(policy) => (AccessCheckResult::denied_by(policy), true),
            PolicyVerdict::Allowed(policy) => (AccessCheckResult::allowed_by(policy), true),
            PolicyVerdict::NoMatch => (AccessCheckResult::from_permissions(has_permission), false),
        };

        Ok(decision)
    }

    /// Current role/policy snapshot, reloading from storage when stale
    async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if self.config.cache_enabled {
            if let Some(snapshot) = self.cache.fresh_snapshot() {
                return Ok(snapshot);
            }
        }

        // Read before loading so a mutation racing the load is detected
        let generation = self.cache.generation();
        let (roles, policies) = futures::try_join!(self.store.get_roles(), self.store.get_policies())?;

        let snapshot = Arc::new(self.cache.build_snapshot(roles, policies, generation));

        if self.config.cache_enabled {
            if self.cache.install(Arc::clone(&snapshot)) {
                info!(
                    "Access cache refreshed: {} roles, {} policies",
                    snapshot.roles.len(),
                    snapshot.policies.len()
                );
            } else {
                debug!("Discarding snapshot loaded across a mutation");
            }
        }

        Ok(snapshot)
    }

    /// Resolved permissions for a principal under `snapshot`
    async fn permissions_for(&self, user_id: &str, snapshot: &Snapshot) -> Result<Arc<BTreeSet<Permission>>> {
        if self.config.cache_enabled {
            if let Some(permissions) = self.cache.user_permissions(user_id, snapshot) {
                debug!("Permission memo hit for {}", user_id);
                return Ok(permissions);
            }
        }

        let resolved = RoleResolver::new(&snapshot.roles)
            .resolve_user(user_id, &self.assignments)
            .await?;
        let permissions = Arc::new(resolved.permissions);

        if self.config.cache_enabled {
            self.cache
                .remember_user_permissions(user_id, snapshot, Arc::clone(&permissions), resolved.valid_until);
        }

        Ok(permissions)
    }

    // ========================================================================
    // Role administration
    // ========================================================================

    /// Create a non-system role
    pub async fn create_role(&self, role: NewRole) -> Result<Role> {
        role.validate()?;
        self.check_inherited_roles(None, &role.inherits).await?;

        let role = self.store.create_role(role).await?;
        self.cache.invalidate();

        info!("Created role {} ({})", role.id, role.name);
        Ok(role)
    }

    /// Update a non-system role
    pub async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Role> {
        update.validate()?;
        self.mutable_role(id).await?;
        if let Some(inherits) = &update.inherits {
            self.check_inherited_roles(Some(id), inherits).await?;
        }

        let role = self.store.update_role(id, update).await?;
        self.cache.invalidate();

        info!("Updated role {}", role.id);
        Ok(role)
    }

    /// Delete a non-system role together with its assignments
    pub async fn delete_role(&self, id: &str) -> Result<()> {
        self.mutable_role(id).await?;

        self.store.delete_role(id).await?;
        self.cache.invalidate();

        info!("Deleted role {}", id);
        Ok(())
    }

    pub async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        self.store.get_role(id).await
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.store.get_roles().await
    }

    async fn mutable_role(&self, id: &str) -> Result<Role> {
        let role = self
            .store
            .get_role(id)
            .await?
            .ok_or_else(|| AccessError::RoleNotFound(id.to_string()))?;

        // Stores that drop the flag must not unlock a catalog role
        if role.is_system || SystemRole::from_id(id).is_some() {
            warn!("Rejected modification of system role {}", id);
            return Err(AccessError::ImmutableRole(id.to_string()));
        }

        Ok(role)
    }

    async fn check_inherited_roles(&self, role_id: Option<&str>, inherits: &[String]) -> Result<()> {
        for parent in inherits {
            if role_id == Some(parent.as_str()) {
                return Err(AccessError::validation(format!("Role '{}' cannot inherit itself", parent)));
            }
            if self.store.get_role(parent).await?.is_none() {
                return Err(AccessError::RoleNotFound(parent.clone()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Policy administration
    // ========================================================================

    pub async fn create_policy(&self, policy: NewPolicy) -> Result<Policy> {
        policy.validate()?;

        let policy = self.store.create_policy(policy).await?;
        self.invalidate_policies();

        info!(
            "Created {:?} policy {} ({}, priority={})",
            policy.effect, policy.id, policy.name, policy.priority
        );
        Ok(policy)
    }

    pub async fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy> {
        update.validate()?;

        let policy = self.store.update_policy(id, update).await?;
        self.invalidate_policies();

        info!("Updated policy {}", policy.id);
        Ok(policy)
    }

    pub async fn delete_policy(&self, id: &str) -> Result<()> {
        self.store.delete_policy(id).await?;
        self.invalidate_policies();

        info!("Deleted policy {}", id);
        Ok(())
    }

    pub async fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        self.store.get_policy(id).await
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.store.get_policies().await
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    /// Grant a role to a principal
    pub async fn assign_role(&self, assignment: NewAssignment) -> Result<UserRoleAssignment> {
        let assignment = self.assignments.assign(assignment).await?;
        self.cache.invalidate();

        info!(
            "Assigned role {} to {} by {}",
            assignment.role_id, assignment.user_id, assignment.granted_by
        );
        Ok(assignment)
    }

    /// Revoke a role; revoking an absent assignment succeeds
    pub async fn revoke_role(&self, user_id: &str, role_id: &str, scope: Option<&str>) -> Result<()> {
        self.assignments.revoke(user_id, role_id, scope).await?;
        self.cache.invalidate();

        info!("Revoked role {} from {}", role_id, user_id);
        Ok(())
    }

    /// Non-expired assignments for a principal
    pub async fn user_roles(&self, user_id: &str) -> Result<Vec<UserRoleAssignment>> {
        self.assignments.list_active(user_id).await
    }

    /// Flattened permissions from all active assignments
    pub async fn user_permissions(&self, user_id: &str) -> Result<BTreeSet<Permission>> {
        let snapshot = self.snapshot().await?;
        let permissions = self.permissions_for(user_id, &snapshot).await?;
        Ok(permissions.as_ref().clone())
    }

    /// True if the principal holds `role_id` directly or through inheritance
    pub async fn has_role(&self, user_id: &str, role_id: &str) -> Result<bool> {
        let snapshot = self.snapshot().await?;
        let resolver = RoleResolver::new(&snapshot.roles);

        Ok(self
            .assignments
            .list_active(user_id)
            .await?
            .iter()
            .any(|a| resolver.effective_roles(&a.role_id).contains(role_id)))
    }

    /// Permissions from unscoped assignments and those scoped to `scope`
    pub async fn scoped_permissions(&self, user_id: &str, scope: &str) -> Result<BTreeSet<Permission>> {
        let snapshot = self.snapshot().await?;
        let active = self.assignments.list_active(user_id).await?;

        let role_ids = active
            .iter()
            .filter(|a| a.scope.as_deref().map_or(true, |s| s == scope))
            .map(|a| a.role_id.as_str());

        Ok(RoleResolver::new(&snapshot.roles).resolve_roles(role_ids))
    }

    // ========================================================================
    // Cache and metrics
    // ========================================================================

    /// Force a reload on the next access
    pub fn clear_cache(&self) {
        self.invalidate_policies();
        info!("Access cache cleared");
    }

    /// Policy changes also retire the patterns compiled for old conditions
    fn invalidate_policies(&self) {
        self.cache.invalidate();
        self.evaluator.clear_regexes();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAccessStore;

    fn engine(config: AccessControlConfig) -> AccessControl {
        AccessControl::new(config, Arc::new(InMemoryAccessStore::new()))
    }

    #[tokio::test]
    async fn test_no_roles_no_access() {
        let engine = engine(AccessControlConfig::default());
        let result = engine
            .check_access(&AccessContext::new("nobody"), &Action::new("read"), &Resource::new("agent", "1"))
            .await
            .unwrap();

        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("No matching permission"));
    }

    #[tokio::test]
    async fn test_snapshot_reused_until_mutation() {
        let engine = engine(AccessControlConfig::default());
        let context = AccessContext::new("alice");
        let resource = Resource::of_type("agent");

        engine.check_access(&context, &Action::new("read"), &resource).await.unwrap();
        engine.check_access(&context, &Action::new("read"), &resource).await.unwrap();
        assert_eq!(engine.cache_stats().refreshes, 1);
        assert_eq!(engine.cache_stats().memo_hits, 1);

        engine
            .assign_role(NewAssignment::new("alice", "role-viewer", "admin"))
            .await
            .unwrap();
        assert!(engine.check_access(&context, &Action::new("read"), &resource).await.unwrap().allowed);
        assert_eq!(engine.cache_stats().refreshes, 2);
    }

    #[tokio::test]
    async fn test_audit_sink_ignored_when_disabled() {
        let config = AccessControlConfig {
            enable_audit_log: false,
            ..Default::default()
        };
        let sink = Arc::new(crate::audit::MemoryAuditSink::new());
        let engine = engine(config).with_audit_sink(sink.clone());

        engine
            .check_access(&AccessContext::new("alice"), &Action::new("read"), &Resource::of_type("agent"))
            .await
            .unwrap();
        assert!(sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_policy_changes_drop_compiled_patterns() {
        use crate::policy::{ConditionOperator, PolicyCondition};

        let email_matches =
            |pattern: &str| PolicyCondition::attribute("email", ConditionOperator::Matches, pattern);

        let engine = engine(AccessControlConfig::default());
        let policy = engine
            .create_policy(
                NewPolicy::allow("staff")
                    .on_resource("agent:*")
                    .for_action("read")
                    .when(email_matches(r"@creto\.ai$")),
            )
            .await
            .unwrap();

        let context = AccessContext::new("alice").with_attribute("email", "alice@creto.ai");
        let resource = Resource::of_type("agent");
        let read = Action::new("read");

        assert!(engine.check_access(&context, &read, &resource).await.unwrap().allowed);
        assert_eq!(engine.evaluator.cached_patterns(), 1);

        engine
            .update_policy(&policy.id, PolicyUpdate::new().conditions(vec![email_matches(r"@example\.com$")]))
            .await
            .unwrap();
        assert_eq!(engine.evaluator.cached_patterns(), 0);
        assert!(!engine.check_access(&context, &read, &resource).await.unwrap().allowed);
        assert_eq!(engine.evaluator.cached_patterns(), 1, "only the current pattern is kept");

        engine.delete_policy(&policy.id).await.unwrap();
        assert_eq!(engine.evaluator.cached_patterns(), 0);

        engine
            .create_policy(NewPolicy::allow("a-users").on_resource("*").for_action("read").when(email_matches("^a")))
            .await
            .unwrap();
        engine.check_access(&context, &read, &resource).await.unwrap();
        assert_eq!(engine.evaluator.cached_patterns(), 1);

        engine.clear_cache();
        assert_eq!(engine.evaluator.cached_patterns(), 0);
    }

    #[tokio::test]
    async fn test_self_inheritance_rejected_on_update() {
        let engine = engine(AccessControlConfig::default());
        let role = engine.create_role(NewRole::new("ops")).await.unwrap();

        let err = engine
            .update_role(&role.id, RoleUpdate::new().inherits(vec![role.id.clone()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));
    }
}
