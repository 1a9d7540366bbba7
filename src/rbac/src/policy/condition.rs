//! Attribute-based policy conditions
//!
//! Every condition on a policy must hold for the policy to match. Any
//! operator/value combination that does not make sense evaluates to `false`.
//! A missing subject is strictly unequal to any value, so `not_equals` and
//! `not_in` hold when the field is absent.

use crate::error::{AccessError, Result};
use crate::types::{AccessContext, AttributeValue, Resource};
use chrono::{DateTime, Datelike, Timelike};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::warn;

/// Where a condition reads its subject value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Request time (`context.timestamp`, or now)
    TimeRange,
    /// Caller IP (`context.ip_address`)
    IpRange,
    /// Principal attribute (`context.attributes[field]`)
    Attribute,
    /// Resource attribute (`resource.attributes[field]`)
    ResourceAttribute,
    /// Reserved for host-defined conditions; always fails closed
    Custom,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Contains,
    Matches,
    Greater,
    Less,
}

/// A single policy condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub operator: ConditionOperator,
    pub field: String,
    pub value: AttributeValue,
}

impl PolicyCondition {
    pub fn new(
        condition_type: ConditionType,
        operator: ConditionOperator,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            condition_type,
            operator,
            field: field.into(),
            value: value.into(),
        }
    }

    /// Condition on a principal attribute
    pub fn attribute(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::new(ConditionType::Attribute, operator, field, value)
    }

    /// Condition on a resource attribute
    pub fn resource_attribute(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::new(ConditionType::ResourceAttribute, operator, field, value)
    }

    /// Condition on the caller IP address
    pub fn ip(operator: ConditionOperator, value: impl Into<AttributeValue>) -> Self {
        Self::new(ConditionType::IpRange, operator, "ip", value)
    }

    /// Condition on the request time
    ///
    /// `field` is `hour` (0-23 UTC), `day_of_week` (1 = Monday) or anything
    /// else for epoch milliseconds.
    pub fn time(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::new(ConditionType::TimeRange, operator, field, value)
    }

    /// Reject conditions whose value can never satisfy the operator
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(AccessError::validation("Condition field cannot be empty"));
        }

        match self.operator {
            ConditionOperator::In | ConditionOperator::NotIn if self.value.as_list().is_none() => {
                Err(AccessError::validation(format!(
                    "Operator {:?} on '{}' requires a list value",
                    self.operator, self.field
                )))
            }
            ConditionOperator::Contains if self.value.as_str().is_none() => {
                Err(AccessError::validation(format!(
                    "Operator Contains on '{}' requires a string value",
                    self.field
                )))
            }
            ConditionOperator::Matches => match self.value.as_str() {
                Some(pattern) => Regex::new(pattern).map(|_| ()).map_err(|e| {
                    AccessError::validation(format!(
                        "Invalid regular expression for '{}': {}",
                        self.field, e
                    ))
                }),
                None => Err(AccessError::validation(format!(
                    "Operator Matches on '{}' requires a string value",
                    self.field
                ))),
            },
            _ => Ok(()),
        }
    }

    /// Evaluate against a request
    pub fn evaluate(&self, context: &AccessContext, resource: &Resource, regexes: &RegexCache) -> bool {
        if self.condition_type == ConditionType::Custom {
            warn!("Custom condition on '{}' has no evaluator, failing closed", self.field);
            return false;
        }

        let Some(subject) = self.subject(context, resource) else {
            return match self.operator {
                ConditionOperator::NotEquals => true,
                ConditionOperator::NotIn => self.value.as_list().is_some(),
                _ => false,
            };
        };
        let expected = self.expected();

        match self.operator {
            ConditionOperator::Equals => subject == expected,
            ConditionOperator::NotEquals => subject != expected,
            ConditionOperator::In => expected
                .as_list()
                .is_some_and(|items| items.iter().any(|item| self.is_member(&subject, item))),
            ConditionOperator::NotIn => expected
                .as_list()
                .is_some_and(|items| !items.iter().any(|item| self.is_member(&subject, item))),
            ConditionOperator::Contains => match (subject.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            ConditionOperator::Matches => match (subject.as_str(), expected.as_str()) {
                (Some(value), Some(pattern)) => regexes.is_match(pattern, value),
                _ => false,
            },
            ConditionOperator::Greater => match (subject.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            ConditionOperator::Less => match (subject.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }

    fn subject(&self, context: &AccessContext, resource: &Resource) -> Option<AttributeValue> {
        match self.condition_type {
            ConditionType::Attribute => context.attributes.get(&self.field).cloned(),
            ConditionType::ResourceAttribute => resource.attributes.get(&self.field).cloned(),
            ConditionType::IpRange => context.ip_address.clone().map(AttributeValue::String),
            ConditionType::TimeRange => {
                let time = context.effective_time();
                let value = match self.field.as_str() {
                    "hour" => f64::from(time.hour()),
                    "day_of_week" => f64::from(time.weekday().number_from_monday()),
                    _ => time.timestamp_millis() as f64,
                };
                Some(AttributeValue::Number(value))
            }
            ConditionType::Custom => None,
        }
    }

    /// Condition value, with RFC 3339 timestamps normalized to epoch millis
    fn expected(&self) -> AttributeValue {
        if self.condition_type != ConditionType::TimeRange
            || matches!(self.field.as_str(), "hour" | "day_of_week")
        {
            return self.value.clone();
        }

        normalize_time(&self.value)
    }

    fn is_member(&self, subject: &AttributeValue, item: &AttributeValue) -> bool {
        if subject == item {
            return true;
        }

        match (self.condition_type, subject.as_str(), item.as_str()) {
            (ConditionType::IpRange, Some(ip), Some(range)) if range.contains('/') => {
                ip_in_cidr(ip, range)
            }
            _ => false,
        }
    }
}

fn normalize_time(value: &AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(time) => AttributeValue::Number(time.timestamp_millis() as f64),
            Err(_) => value.clone(),
        },
        AttributeValue::List(items) => AttributeValue::List(items.iter().map(normalize_time).collect()),
        _ => value.clone(),
    }
}

/// Test whether `ip` falls inside `cidr` (IPv4 or IPv6)
fn ip_in_cidr(ip: &str, cidr: &str) -> bool {
    let Some((network, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(ip), Ok(network), Ok(prefix)) = (
        ip.parse::<IpAddr>(),
        network.parse::<IpAddr>(),
        prefix.parse::<u32>(),
    ) else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(network)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(ip) & mask == u32::from(network) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(network)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(ip) & mask == u128::from(network) & mask
        }
        _ => false,
    }
}

/// Compiled regular expressions keyed by pattern
///
/// Invalid patterns are cached as `None` so they are only reported once.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: DashMap<String, Option<Regex>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_match(&self, pattern: &str, value: &str) -> bool {
        if let Some(entry) = self.compiled.get(pattern) {
            return entry.as_ref().is_some_and(|re| re.is_match(value));
        }

        let compiled = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Invalid condition pattern '{}': {}", pattern, e);
                None
            }
        };
        let matched = compiled.as_ref().is_some_and(|re| re.is_match(value));
        self.compiled.insert(pattern.to_string(), compiled);
        matched
    }

    /// Drop every compiled pattern
    pub fn clear(&self) {
        self.compiled.clear();
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
