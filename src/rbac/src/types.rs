//! Core access-control types

use crate::policy::Policy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique policy identifier
pub type PolicyId = String;

/// Unique role identifier
pub type RoleId = String;

/// Principal identifier
pub type UserId = String;

/// Attribute value carried by contexts, resources and policy conditions
///
/// Serialized untagged, so `"eu"`, `3`, `true` and `["a", "b"]` all
/// deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Borrow the inner string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Inner number, if this is a numeric value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow the inner list, if this is a collection
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Action being performed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Action name (read, create, update, delete, execute, etc.)
    pub name: String,
}

impl Action {
    /// Create a new action
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resource being accessed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type (agent, workflow, policy, etc.)
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Resource identifier; absent when the action targets the whole collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Resource attributes (owner, team, sensitivity, ...)
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl Resource {
    /// A specific resource instance
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.into()),
            attributes: HashMap::new(),
        }
    }

    /// The collection of all resources of a type
    pub fn of_type(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute to the resource
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resource pattern used for policy matching: `type:id`, or `type:*` without an id
    pub fn pattern(&self) -> String {
        format!("{}:{}", self.resource_type, self.id.as_deref().unwrap_or("*"))
    }

    /// Collection name used in permission tokens (`agent` -> `agents`)
    pub fn permission_type(&self) -> String {
        pluralize(&self.resource_type)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

fn pluralize(word: &str) -> String {
    if word.is_empty() || word == "*" || word.ends_with('s') {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix('y') {
        let before_y = stem.chars().last();
        if matches!(before_y, Some(c) if !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", word)
}

/// Caller context for an access check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessContext {
    /// Already-authenticated principal
    pub user_id: UserId,

    /// Principal attributes (department, clearance, ...)
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,

    /// Caller IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Request time; `None` means "now"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AccessContext {
    /// Create a context for a principal
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: HashMap::new(),
            ip_address: None,
            timestamp: None,
        }
    }

    /// Add a principal attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the caller IP address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Pin the request time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Request time, falling back to the current time
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// Outcome of a single access check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResult {
    /// Whether access is granted
    pub allowed: bool,

    /// Allow policy that granted access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy: Option<Policy>,

    /// Deny policy that refused access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<Policy>,

    /// Human-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessCheckResult {
    /// Access granted by an allow policy
    pub fn allowed_by(policy: &Policy) -> Self {
        Self {
            allowed: true,
            matched_policy: Some(policy.clone()),
            denied_by: None,
            reason: Some(format!("Allowed by policy '{}'", policy.name)),
        }
    }

    /// Access refused by a deny policy
    pub fn denied_by(policy: &Policy) -> Self {
        Self {
            allowed: false,
            matched_policy: None,
            denied_by: Some(policy.clone()),
            reason: Some(format!("Denied by policy '{}'", policy.name)),
        }
    }

    /// Decision taken from role permissions alone
    pub fn from_permissions(allowed: bool) -> Self {
        let reason = if allowed {
            "Granted by role permissions"
        } else {
            "No matching permission"
        };

        Self {
            allowed,
            matched_policy: None,
            denied_by: None,
            reason: Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_pattern() {
        assert_eq!(Resource::new("agent", "42").pattern(), "agent:42");
        assert_eq!(Resource::of_type("agent").pattern(), "agent:*");
    }

    #[test]
    fn test_permission_type() {
        assert_eq!(Resource::of_type("agent").permission_type(), "agents");
        assert_eq!(Resource::of_type("agents").permission_type(), "agents");
        assert_eq!(Resource::of_type("policy").permission_type(), "policies");
        assert_eq!(Resource::of_type("key").permission_type(), "keys");
    }

    #[test]
    fn test_attribute_value_deserialization() {
        let value: AttributeValue = serde_json::from_str(r#"["eu", 3, true]"#).unwrap();
        assert_eq!(
            value,
            AttributeValue::List(vec![
                AttributeValue::from("eu"),
                AttributeValue::Number(3.0),
                AttributeValue::Bool(true),
            ])
        );
    }

    #[test]
    fn test_context_builder() {
        let ctx = AccessContext::new("user-1")
            .with_attribute("department", "engineering")
            .with_ip("10.0.0.1");

        assert_eq!(ctx.user_id, "user-1");
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            ctx.attributes.get("department").and_then(AttributeValue::as_str),
            Some("engineering")
        );
    }
}
