//! Role/policy snapshot cache with per-user permission memo
//!
//! Invalidation is coarse: any role, policy or assignment mutation bumps the
//! generation counter, drops the snapshot and clears the memo. A snapshot
//! loaded under an older generation is served to the caller that loaded it
//! but never installed, so a reload racing a mutation cannot resurrect
//! pre-mutation state.

use crate::permission::Permission;
use crate::policy::Policy;
use crate::role::Role;
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consistent view of all roles and policies at load time
#[derive(Debug)]
pub struct Snapshot {
    /// Roles indexed by id
    pub roles: HashMap<RoleId, Role>,

    /// Policies in storage order
    pub policies: Vec<Policy>,

    /// Unique per loaded snapshot; memo entries are bound to it
    epoch: u64,

    /// Cache generation the snapshot was loaded under
    generation: u64,

    loaded_at: Instant,
}

impl Snapshot {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}

/// Memoized permission set for one principal
#[derive(Debug, Clone)]
struct MemoEntry {
    epoch: u64,
    permissions: Arc<BTreeSet<Permission>>,
    /// Earliest expiry among the assignments that produced the set
    valid_until: Option<DateTime<Utc>>,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Memoized principals
    pub entries: usize,
    pub refreshes: u64,
    pub invalidations: u64,
    pub memo_hits: u64,
    pub memo_misses: u64,
    pub generation: u64,
}

impl CacheStats {
    /// Calculate memo hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.memo_hits + self.memo_misses;
        if total == 0 {
            0.0
        } else {
            self.memo_hits as f64 / total as f64
        }
    }
}

/// Snapshot + memo cache owned by one engine instance
pub struct AccessCache {
    ttl: Duration,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    user_permissions: DashMap<UserId, MemoEntry>,
    generation: AtomicU64,
    next_epoch: AtomicU64,
    refreshes: AtomicU64,
    invalidations: AtomicU64,
    memo_hits: AtomicU64,
    memo_misses: AtomicU64,
}

impl AccessCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
            user_permissions: DashMap::new(),
            generation: AtomicU64::new(0),
            next_epoch: AtomicU64::new(1),
            refreshes: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            memo_hits: AtomicU64::new(0),
            memo_misses: AtomicU64::new(0),
        }
    }

    /// Current mutation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Build a snapshot from freshly loaded data
    ///
    /// `generation` must be read before the storage load started.
    pub fn build_snapshot(&self, roles: Vec<Role>, policies: Vec<Policy>, generation: u64) -> Snapshot {
        Snapshot {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
            policies,
            epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
            generation,
            loaded_at: Instant::now(),
        }
    }

    /// The installed snapshot, if not stale
    pub fn fresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref()?;

        if snapshot.generation != self.generation() || snapshot.age() > self.ttl {
            return None;
        }

        Some(Arc::clone(snapshot))
    }

    /// Install a snapshot unless a mutation happened while it was loading
    pub fn install(&self, snapshot: Arc<Snapshot>) -> bool {
        let mut guard = self.snapshot.write();
        if snapshot.generation != self.generation() {
            return false;
        }

        *guard = Some(snapshot);
        self.user_permissions.clear();
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Memoized permissions for a principal under `snapshot`
    pub fn user_permissions(&self, user_id: &str, snapshot: &Snapshot) -> Option<Arc<BTreeSet<Permission>>> {
        let hit = self.user_permissions.get(user_id).and_then(|entry| {
            let expired = entry.valid_until.is_some_and(|until| until <= Utc::now());
            (entry.epoch == snapshot.epoch && !expired).then(|| Arc::clone(&entry.permissions))
        });

        let counter = if hit.is_some() { &self.memo_hits } else { &self.memo_misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Memoize a permission set computed from `snapshot`
    pub fn remember_user_permissions(
        &self,
        user_id: &str,
        snapshot: &Snapshot,
        permissions: Arc<BTreeSet<Permission>>,
        valid_until: Option<DateTime<Utc>>,
    ) {
        if snapshot.generation != self.generation() {
            return;
        }

        self.user_permissions.insert(
            user_id.to_string(),
            MemoEntry {
                epoch: snapshot.epoch,
                permissions,
                valid_until,
            },
        );
    }

    /// Drop everything and force a reload on next access
    pub fn invalidate(&self) {
        let mut guard = self.snapshot.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *guard = None;
        self.user_permissions.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.user_permissions.len(),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
            memo_misses: self.memo_misses.load(Ordering::Relaxed),
            generation: self.generation(),
        }
    }
}
