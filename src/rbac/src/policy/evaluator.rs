//! Policy applicability, ordering and verdicts

use super::condition::RegexCache;
use super::types::Policy;
use crate::types::{AccessContext, Resource};
use tracing::debug;

/// Result of evaluating the applicable policies for a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyVerdict<'a> {
    /// A deny policy matched before any allow policy
    Denied(&'a Policy),
    /// At least one allow policy matched; holds the last one matched
    Allowed(&'a Policy),
    /// No applicable policy had all of its conditions hold
    NoMatch,
}

/// Policy evaluator with a shared regex cache
#[derive(Debug, Default)]
pub struct PolicyEvaluator {
    regexes: RegexCache,
}

impl PolicyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policies covering `resource_pattern` and `action`, highest priority first
    ///
    /// The sort is stable: equal priorities keep their storage order.
    pub fn applicable_policies<'a>(
        &self,
        policies: &'a [Policy],
        resource_pattern: &str,
        action: &str,
    ) -> Vec<&'a Policy> {
        let mut applicable: Vec<&Policy> = policies
            .iter()
            .filter(|p| p.applies_to(resource_pattern, action))
            .collect();

        applicable.sort_by(|a, b| b.priority.cmp(&a.priority));
        applicable
    }

    /// Forget compiled condition patterns once policies change
    pub fn clear_regexes(&self) {
        self.regexes.clear();
    }

    pub fn cached_patterns(&self) -> usize {
        self.regexes.len()
    }

    /// True when every condition on the policy holds
    pub fn evaluate(&self, policy: &Policy, context: &AccessContext, resource: &Resource) -> bool {
        policy
            .conditions
            .iter()
            .all(|condition| condition.evaluate(context, resource, &self.regexes))
    }

    /// Walk sorted policies and combine them into a verdict
    ///
    /// A deny reached before any allow stops evaluation. Once an allow has
    /// matched, lower-ranked denies are skipped and later allows replace
    /// the matched policy.
    pub fn decide<'a>(
        &self,
        sorted: &[&'a Policy],
        context: &AccessContext,
        resource: &Resource,
    ) -> PolicyVerdict<'a> {
        let mut allowed_by: Option<&'a Policy> = None;

        for &policy in sorted {
            if !self.evaluate(policy, context, resource) {
                debug!("Policy '{}' conditions not met", policy.id);
                continue;
            }

            if !policy.is_deny() {
                debug!("Policy '{}' allows (priority={})", policy.id, policy.priority);
                allowed_by = Some(policy);
            } else if allowed_by.is_none() {
                debug!("Policy '{}' denies (priority={})", policy.id, policy.priority);
                return PolicyVerdict::Denied(policy);
            } else {
                debug!(
                    "Policy '{}' ranks below an allow, skipped (priority={})",
                    policy.id, policy.priority
                );
            }
        }

        allowed_by.map_or(PolicyVerdict::NoMatch, PolicyVerdict::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::condition::{ConditionOperator, PolicyCondition};
    use crate::policy::types::NewPolicy;
    use proptest::prelude::*;

    fn with_id(policy: NewPolicy, id: &str) -> Policy {
        policy.into_policy(id.to_string())
    }

    fn request() -> (AccessContext, Resource) {
        (AccessContext::new("user-1"), Resource::new("agent", "42"))
    }

    #[test]
    fn test_sorted_by_priority_descending() {
        let policies = vec![
            with_id(NewPolicy::allow("low").on_resource("*").for_action("read").with_priority(1), "low"),
            with_id(NewPolicy::allow("high").on_resource("*").for_action("read").with_priority(9), "high"),
            with_id(NewPolicy::allow("default").on_resource("*").for_action("read"), "default"),
            with_id(NewPolicy::allow("other").on_resource("workflow:*").for_action("read"), "other"),
        ];

        let evaluator = PolicyEvaluator::new();
        let ids: Vec<_> = evaluator
            .applicable_policies(&policies, "agent:42", "read")
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["high", "low", "default"]);
    }

    #[test]
    fn test_allow_outranks_lower_deny() {
        let policies = vec![
            with_id(NewPolicy::deny("deny").on_resource("*").for_action("read").with_priority(5), "deny"),
            with_id(NewPolicy::allow("allow").on_resource("*").for_action("read").with_priority(10), "allow"),
        ];
        let evaluator = PolicyEvaluator::new();
        let (ctx, resource) = request();
        let sorted = evaluator.applicable_policies(&policies, "agent:42", "read");

        assert!(matches!(
            evaluator.decide(&sorted, &ctx, &resource),
            PolicyVerdict::Allowed(p) if p.id == "allow"
        ));
    }

    #[test]
    fn test_higher_deny_wins() {
        let policies = vec![
            with_id(NewPolicy::allow("allow").on_resource("*").for_action("read").with_priority(5), "allow"),
            with_id(NewPolicy::deny("deny").on_resource("*").for_action("read").with_priority(10), "deny"),
        ];
        let evaluator = PolicyEvaluator::new();
        let (ctx, resource) = request();
        let sorted = evaluator.applicable_policies(&policies, "agent:42", "read");

        assert!(matches!(
            evaluator.decide(&sorted, &ctx, &resource),
            PolicyVerdict::Denied(p) if p.id == "deny"
        ));
    }

    #[test]
    fn test_last_matching_allow_is_reported() {
        let policies = vec![
            with_id(NewPolicy::allow("first").on_resource("*").for_action("read").with_priority(3), "first"),
            with_id(NewPolicy::allow("second").on_resource("*").for_action("read").with_priority(2), "second"),
        ];
        let evaluator = PolicyEvaluator::new();
        let (ctx, resource) = request();
        let sorted = evaluator.applicable_policies(&policies, "agent:42", "read");

        assert!(matches!(
            evaluator.decide(&sorted, &ctx, &resource),
            PolicyVerdict::Allowed(p) if p.id == "second"
        ));
    }

    #[test]
    fn test_failed_conditions_fall_through() {
        let policies = vec![with_id(
            NewPolicy::deny("office-only")
                .on_resource("*")
                .for_action("read")
                .when(PolicyCondition::ip(ConditionOperator::Equals, "10.0.0.1")),
            "office-only",
        )];
        let evaluator = PolicyEvaluator::new();
        let resource = Resource::new("agent", "42");
        let sorted = evaluator.applicable_policies(&policies, "agent:42", "read");

        let ctx = AccessContext::new("user-1").with_ip("10.0.0.2");
        assert_eq!(evaluator.decide(&sorted, &ctx, &resource), PolicyVerdict::NoMatch);

        let ctx = AccessContext::new("user-1").with_ip("10.0.0.1");
        assert!(matches!(evaluator.decide(&sorted, &ctx, &resource), PolicyVerdict::Denied(_)));
    }

    proptest! {
        #[test]
        fn prop_sort_is_stable(priorities in proptest::collection::vec(-3i32..3, 0..24)) {
            let policies: Vec<Policy> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| with_id(
                    NewPolicy::allow(format!("p{i}")).on_resource("*").for_action("*").with_priority(*p),
                    &i.to_string(),
                ))
                .collect();

            let evaluator = PolicyEvaluator::new();
            let first = evaluator.applicable_policies(&policies, "agent:1", "read");
            let second = evaluator.applicable_policies(&policies, "agent:1", "read");
            prop_assert_eq!(&first, &second);

            for pair in first.windows(2) {
                prop_assert!(pair[0].priority >= pair[1].priority);
                if pair[0].priority == pair[1].priority {
                    let a: usize = pair[0].id.parse().unwrap();
                    let b: usize = pair[1].id.parse().unwrap();
                    prop_assert!(a < b);
                }
            }
        }
    }
}
