//! Authorization core - policy table, role resolution and decision engine
//!
//! This module implements the request-time access policy engine:
//! - a closed role vocabulary validated at the resolver boundary
//! - an ordered longest-prefix policy table over path prefixes
//! - a TTL role cache with singleflight lookup coalescing
//! - a decision engine rendering one action per request

mod engine;
mod policy;
mod resolver;
mod source;

pub use engine::DecisionEngine;
pub use policy::{PolicyRule, PolicyTable, RoleRequirement, UnauthenticatedAction};
pub use resolver::{CachedRoleResolver, RoleSource};
pub use source::SqlRoleSource;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named capability class assigned to a subject by the external system of
/// record. The vocabulary is closed: strings outside it never enter the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    Owner,
    Manager,
    Consumer,
    Courier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "ADMINISTRATOR",
            Role::Owner => "OWNER",
            Role::Manager => "MANAGER",
            Role::Consumer => "CONSUMER",
            Role::Courier => "COURIER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADMINISTRATOR" => Ok(Role::Administrator),
            "OWNER" => Ok(Role::Owner),
            "MANAGER" => Ok(Role::Manager),
            "CONSUMER" => Ok(Role::Consumer),
            "COURIER" => Ok(Role::Courier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// The routing decision for one request. Computed fresh per request, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the request through unmodified.
    Allow,
    /// The caller has no valid session; send them to re-authenticate.
    RedirectLogin,
    /// Authenticated but unauthorized; serve the generic not-found response
    /// so the protected area's existence is not revealed.
    DenyNotFound,
}
