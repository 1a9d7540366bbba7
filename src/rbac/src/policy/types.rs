//! Policy definitions

use super::condition::PolicyCondition;
use crate::error::{AccessError, Result};
use crate::types::PolicyId;
use serde::{Deserialize, Serialize};

/// Policy effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Allow the action
    Allow,
    /// Deny the action
    Deny,
}

/// Policy definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy identifier
    pub id: PolicyId,

    /// Policy name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Policy effect (allow or deny)
    pub effect: PolicyEffect,

    /// Resource patterns (`*`, `agent:42`, `agent:*`, `agent:prod-*`)
    pub resources: Vec<String>,

    /// Actions covered (`read`, `delete`, `*`)
    pub actions: Vec<String>,

    /// All conditions must hold for the policy to match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PolicyCondition>,

    /// Policy priority (higher = evaluated first)
    #[serde(default)]
    pub priority: i32,
}

impl Policy {
    /// Check if this policy covers the action and resource pattern
    pub fn applies_to(&self, resource_pattern: &str, action: &str) -> bool {
        let action_matches = self.actions.iter().any(|a| a == "*" || a == action);

        action_matches
            && self
                .resources
                .iter()
                .any(|pattern| Self::matches_resource(pattern, resource_pattern))
    }

    /// `*` matches anything, a trailing `*` matches by prefix, otherwise exact
    fn matches_resource(pattern: &str, resource: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        if let Some(prefix) = pattern.strip_suffix('*') {
            return resource.starts_with(prefix);
        }

        pattern == resource
    }

    pub fn is_deny(&self) -> bool {
        self.effect == PolicyEffect::Deny
    }
}

/// Policy definition without an id, as passed to `create_policy`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub effect: PolicyEffect,

    pub resources: Vec<String>,

    pub actions: Vec<String>,

    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,

    #[serde(default)]
    pub priority: i32,
}

impl NewPolicy {
    pub fn new(name: impl Into<String>, effect: PolicyEffect) -> Self {
        Self {
            name: name.into(),
            description: None,
            effect,
            resources: Vec::new(),
            actions: Vec::new(),
            conditions: Vec::new(),
            priority: 0,
        }
    }

    pub fn allow(name: impl Into<String>) -> Self {
        Self::new(name, PolicyEffect::Allow)
    }

    pub fn deny(name: impl Into<String>) -> Self {
        Self::new(name, PolicyEffect::Deny)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn on_resource(mut self, pattern: impl Into<String>) -> Self {
        self.resources.push(pattern.into());
        self
    }

    pub fn for_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn when(mut self, condition: PolicyCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_targets(&self.resources, &self.actions)?;
        self.conditions.iter().try_for_each(PolicyCondition::validate)
    }

    pub fn into_policy(self, id: PolicyId) -> Policy {
        Policy {
            id,
            name: self.name,
            description: self.description,
            effect: self.effect,
            resources: self.resources,
            actions: self.actions,
            conditions: self.conditions,
            priority: self.priority,
        }
    }
}

/// Partial policy update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub effect: Option<PolicyEffect>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub conditions: Option<Vec<PolicyCondition>>,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl PolicyUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect(mut self, effect: PolicyEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn resources(mut self, resources: Vec<String>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn conditions(mut self, conditions: Vec<PolicyCondition>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if matches!(&self.resources, Some(r) if r.is_empty()) {
            return Err(AccessError::validation("Policy must cover at least one resource"));
        }
        if matches!(&self.actions, Some(a) if a.is_empty()) {
            return Err(AccessError::validation("Policy must cover at least one action"));
        }
        match &self.conditions {
            Some(conditions) => conditions.iter().try_for_each(PolicyCondition::validate),
            None => Ok(()),
        }
    }

    pub fn apply_to(self, policy: &mut Policy) {
        if let Some(name) = self.name {
            policy.name = name;
        }
        if let Some(description) = self.description {
            policy.description = Some(description);
        }
        if let Some(effect) = self.effect {
            policy.effect = effect;
        }
        if let Some(resources) = self.resources {
            policy.resources = resources;
        }
        if let Some(actions) = self.actions {
            policy.actions = actions;
        }
        if let Some(conditions) = self.conditions {
            policy.conditions = conditions;
        }
        if let Some(priority) = self.priority {
            policy.priority = priority;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AccessError::validation("Policy name cannot be empty"));
    }
    Ok(())
}

fn validate_targets(resources: &[String], actions: &[String]) -> Result<()> {
    if resources.is_empty() {
        return Err(AccessError::validation("Policy must cover at least one resource"));
    }
    if actions.is_empty() {
        return Err(AccessError::validation("Policy must cover at least one action"));
    }
    Ok(())
}
