//! Engine configuration

use std::time::Duration;
use tracing::warn;

/// Access-control engine configuration
///
/// The storage adapter and audit handler are injected separately through
/// `AccessControl::new` and `AccessControl::with_audit_sink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlConfig {
    /// Documented default-deny posture. When no policy matches, access is
    /// still decided by role permissions alone, whatever this is set to.
    pub default_deny_all: bool,

    /// Emit one audit entry per access check
    pub enable_audit_log: bool,

    /// Memoize role/policy snapshots and per-user permission sets
    pub cache_enabled: bool,

    /// Maximum snapshot age before it is reloaded from storage
    pub cache_ttl: Duration,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            default_deny_all: true,
            enable_audit_log: true,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl AccessControlConfig {
    /// Load configuration from environment variables
    ///
    /// - `RBAC_DEFAULT_DENY_ALL` (default: true)
    /// - `RBAC_AUDIT_ENABLED` (default: true)
    /// - `RBAC_CACHE_ENABLED` (default: true)
    /// - `RBAC_CACHE_TTL_SECS` (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            default_deny_all: parse_or(&lookup, "RBAC_DEFAULT_DENY_ALL", defaults.default_deny_all),
            enable_audit_log: parse_or(&lookup, "RBAC_AUDIT_ENABLED", defaults.enable_audit_log),
            cache_enabled: parse_or(&lookup, "RBAC_CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "RBAC_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}
