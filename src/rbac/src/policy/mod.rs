//! Policy definitions, conditions and evaluation
//!
//! Policies are allow/deny rules over resource patterns and actions,
//! optionally gated by attribute conditions and ranked by priority.

pub mod condition;
pub mod evaluator;
pub mod types;

pub use condition::{ConditionOperator, ConditionType, PolicyCondition, RegexCache};
pub use evaluator::{PolicyEvaluator, PolicyVerdict};
pub use types::{NewPolicy, Policy, PolicyEffect, PolicyUpdate};
