//! Permission tokens and wildcard matching
//!
//! A permission is a `resource:action` token. Either segment may be the
//! wildcard `*`; no other pattern forms exist.

use crate::error::{AccessError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Wildcard segment
pub const WILDCARD: &str = "*";

/// Validated `resource:action` permission token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Parse and validate a permission token
    pub fn parse(token: &str) -> Result<Self> {
        let mut segments = token.split(':');
        let (Some(resource), Some(action), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(AccessError::validation(format!(
                "Invalid permission format '{}': expected 'resource:action'",
                token
            )));
        };

        if resource.trim().is_empty() || action.trim().is_empty() {
            return Err(AccessError::validation(format!(
                "Invalid permission format '{}': empty segment",
                token
            )));
        }

        Ok(Self(token.to_string()))
    }

    /// Resource segment
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or_default()
    }

    /// Action segment
    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Permission {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Permission {
    type Error = AccessError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.0
    }
}

// Lets permission sets be queried by `&str`; ordering and hashing agree with `String`
impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a list of permission tokens, failing on the first malformed one
pub fn parse_all<I, S>(tokens: I) -> Result<BTreeSet<Permission>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens.into_iter().map(|t| Permission::parse(t.as_ref())).collect()
}

/// Check whether a permission set grants `action` on `resource_type`
///
/// Accepted forms: `*:*`, `resource:*`, `*:action`, `resource:action`.
pub fn matches(permissions: &BTreeSet<Permission>, resource_type: &str, action: &str) -> bool {
    if permissions.is_empty() {
        return false;
    }
    if permissions.contains("*:*") {
        return true;
    }

    let mut candidate = String::with_capacity(resource_type.len() + action.len() + 1);
    [(resource_type, WILDCARD), (WILDCARD, action), (resource_type, action)]
        .into_iter()
        .any(|(resource, verb)| {
            candidate.clear();
            candidate.push_str(resource);
            candidate.push(':');
            candidate.push_str(verb);
            permissions.contains(candidate.as_str())
        })
}
