//! Access check benchmarks
//!
//! Measures `check_access` over growing policy sets, with the snapshot cache
//! disabled (every check reloads from the store) and enabled.

use cretoai_rbac::{
    permission, AccessContext, AccessControl, AccessControlConfig, Action, ConditionOperator,
    InMemoryAccessStore, NewAssignment, NewPolicy, PolicyCondition, Resource,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn test_policy(i: usize) -> NewPolicy {
    let policy = if i % 2 == 0 {
        NewPolicy::allow(format!("Test policy {}", i))
    } else {
        NewPolicy::deny(format!("Test policy {}", i))
    };

    policy
        .on_resource(format!("agent:{}", i % 100))
        .for_action("read")
        .when(PolicyCondition::attribute("department", ConditionOperator::Equals, "engineering"))
        .with_priority(i as i32)
}

fn setup_engine(rt: &Runtime, cache_enabled: bool, policy_count: usize) -> AccessControl {
    rt.block_on(async {
        let config = AccessControlConfig {
            cache_enabled,
            enable_audit_log: false, // Benchmark without audit
            ..Default::default()
        };
        let engine = AccessControl::new(config, Arc::new(InMemoryAccessStore::new()));

        for i in 0..policy_count {
            engine.create_policy(test_policy(i)).await.unwrap();
        }
        engine
            .assign_role(NewAssignment::new("alice", "role-developer", "bench"))
            .await
            .unwrap();

        engine
    })
}

fn bench_check_access(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    for (name, cache_enabled) in [("check_access_uncached", false), ("check_access_cached", true)] {
        let mut group = c.benchmark_group(name);

        for policy_count in [10, 100, 1000].iter() {
            group.bench_with_input(BenchmarkId::new("policies", policy_count), policy_count, |b, &count| {
                let engine = setup_engine(&rt, cache_enabled, count);
                let context = AccessContext::new("alice").with_attribute("department", "engineering");
                let action = Action::new("read");
                let resource = Resource::new("agent", "sensitive-123");

                b.to_async(&rt).iter(|| async {
                    let result = engine
                        .check_access(black_box(&context), black_box(&action), black_box(&resource))
                        .await
                        .unwrap();
                    black_box(result);
                });
            });
        }

        group.finish();
    }
}

fn bench_permission_matching(c: &mut Criterion) {
    let permissions =
        permission::parse_all(["agents:read", "workflows:*", "*:execute", "tools:invoke", "reports:read"]).unwrap();

    c.bench_function("permission_matches", |b| {
        b.iter(|| {
            black_box(permission::matches(
                black_box(&permissions),
                black_box("executions"),
                black_box("execute"),
            ))
        })
    });
}

criterion_group!(benches, bench_check_access, bench_permission_matching);
criterion_main!(benches);
