use std::collections::HashSet;

use serde::Deserialize;

use super::{Decision, Role};
use crate::errors::AppError;

/// What an unauthenticated (or failed-resolution) caller gets on a protected
/// path. Redirecting to login is the default; areas whose existence should
/// stay hidden even from anonymous callers can opt into the generic 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthenticatedAction {
    #[default]
    RedirectLogin,
    DenyNotFound,
}

impl UnauthenticatedAction {
    pub fn decision(self) -> Decision {
        match self {
            UnauthenticatedAction::RedirectLogin => Decision::RedirectLogin,
            UnauthenticatedAction::DenyNotFound => Decision::DenyNotFound,
        }
    }
}

/// Roles a rule admits. In the JSON policy file this is either the keyword
/// `"any"` (any authenticated subject, including one with zero roles) or a
/// non-empty list of role names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RoleRequirementRepr")]
pub enum RoleRequirement {
    AnyAuthenticated,
    AnyOf(HashSet<Role>),
}

impl RoleRequirement {
    pub fn satisfied_by(&self, roles: &HashSet<Role>) -> bool {
        match self {
            RoleRequirement::AnyAuthenticated => true,
            RoleRequirement::AnyOf(allowed) => !allowed.is_disjoint(roles),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRequirementRepr {
    Keyword(String),
    Roles(Vec<Role>),
}

impl TryFrom<RoleRequirementRepr> for RoleRequirement {
    type Error = String;

    fn try_from(repr: RoleRequirementRepr) -> Result<Self, Self::Error> {
        match repr {
            RoleRequirementRepr::Keyword(keyword) if keyword == "any" => {
                Ok(RoleRequirement::AnyAuthenticated)
            }
            RoleRequirementRepr::Keyword(keyword) => Err(format!(
                "roles must be \"any\" or a list of role names, got \"{keyword}\""
            )),
            RoleRequirementRepr::Roles(roles) => {
                Ok(RoleRequirement::AnyOf(roles.into_iter().collect()))
            }
        }
    }
}

/// One entry of the route-group allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyRule {
    pub prefix: String,
    #[serde(rename = "roles")]
    pub requirement: RoleRequirement,
    #[serde(default)]
    pub unauthenticated: UnauthenticatedAction,
}

impl PolicyRule {
    pub fn new(prefix: impl Into<String>, requirement: RoleRequirement) -> Self {
        Self {
            prefix: prefix.into(),
            requirement,
            unauthenticated: UnauthenticatedAction::default(),
        }
    }

    pub fn with_unauthenticated(mut self, action: UnauthenticatedAction) -> Self {
        self.unauthenticated = action;
        self
    }
}

/// Ordered, immutable rule set evaluated by longest matching prefix.
///
/// Rules are static configuration: the table is built once at process start
/// and never mutated on the data path. Paths with no matching rule are
/// unprotected (protected-by-exception), so the gateway allows them without
/// touching the verifier or resolver.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
}

impl PolicyTable {
    pub fn new(rules: Vec<PolicyRule>) -> Result<Self, AppError> {
        let mut normalized = Vec::with_capacity(rules.len());
        for mut rule in rules {
            if !rule.prefix.starts_with('/') {
                return Err(AppError::configuration(format!(
                    "policy prefix must start with '/': \"{}\"",
                    rule.prefix
                )));
            }
            if let RoleRequirement::AnyOf(allowed) = &rule.requirement {
                if allowed.is_empty() {
                    return Err(AppError::configuration(format!(
                        "policy rule for \"{}\" has an empty role list; use \"any\" to admit any authenticated subject",
                        rule.prefix
                    )));
                }
            }
            // Trailing-slash prefixes match the same paths as their trimmed form.
            while rule.prefix.len() > 1 && rule.prefix.ends_with('/') {
                rule.prefix.pop();
            }
            normalized.push(rule);
        }
        Ok(Self { rules: normalized })
    }

    /// Select the rule with the longest matching prefix; ties go to the
    /// first-declared rule so evaluation stays deterministic and auditable.
    pub fn matched(&self, path: &str) -> Option<&PolicyRule> {
        let mut best: Option<&PolicyRule> = None;
        for rule in &self.rules {
            if !prefix_matches(&rule.prefix, path) {
                continue;
            }
            if best.map_or(true, |current| rule.prefix.len() > current.prefix.len()) {
                best = Some(rule);
            }
        }
        best
    }
}

/// Segment-aware prefix match: `/business` covers `/business` and
/// `/business/…` but not `/businessfoo`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_of(roles: &[Role]) -> RoleRequirement {
        RoleRequirement::AnyOf(roles.iter().copied().collect())
    }

    fn table(rules: Vec<PolicyRule>) -> PolicyTable {
        PolicyTable::new(rules).expect("rules should validate")
    }

    #[test]
    fn unmatched_path_returns_none() {
        let table = table(vec![PolicyRule::new("/admin", any_of(&[Role::Administrator]))]);
        assert!(table.matched("/").is_none());
        assert!(table.matched("/menu").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table(vec![
            PolicyRule::new("/business", any_of(&[Role::Owner, Role::Manager, Role::Administrator])),
            PolicyRule::new("/business/manager", any_of(&[Role::Manager])),
        ]);

        let rule = table.matched("/business/manager/x").expect("should match");
        assert_eq!(rule.prefix, "/business/manager");

        let rule = table.matched("/business/sales").expect("should match");
        assert_eq!(rule.prefix, "/business");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let first = PolicyRule::new("/courier", any_of(&[Role::Courier]));
        let second = PolicyRule::new("/courier", any_of(&[Role::Administrator]));
        let table = table(vec![first.clone(), second]);

        assert_eq!(table.matched("/courier/runs"), Some(&first));
    }

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        let table = table(vec![PolicyRule::new("/business", any_of(&[Role::Owner]))]);

        assert!(table.matched("/business").is_some());
        assert!(table.matched("/business/").is_some());
        assert!(table.matched("/business/orders").is_some());
        assert!(table.matched("/businessfoo").is_none());
    }

    #[test]
    fn root_prefix_covers_every_path() {
        let table = table(vec![PolicyRule::new("/", RoleRequirement::AnyAuthenticated)]);
        assert!(table.matched("/anything/at/all").is_some());
    }

    #[test]
    fn trailing_slash_prefix_is_normalized() {
        let table = table(vec![PolicyRule::new("/admin/", any_of(&[Role::Administrator]))]);
        assert!(table.matched("/admin").is_some());
        assert!(table.matched("/admin/negocios").is_some());
    }

    #[test]
    fn empty_role_list_is_a_configuration_error() {
        let result = PolicyTable::new(vec![PolicyRule::new("/admin", RoleRequirement::AnyOf(HashSet::new()))]);
        assert!(result.is_err());
    }

    #[test]
    fn prefix_without_leading_slash_is_rejected() {
        let result = PolicyTable::new(vec![PolicyRule::new("admin", any_of(&[Role::Administrator]))]);
        assert!(result.is_err());
    }

    #[test]
    fn requirement_intersection_semantics() {
        let requirement = any_of(&[Role::Owner, Role::Manager]);
        assert!(requirement.satisfied_by(&[Role::Manager, Role::Consumer].into_iter().collect()));
        assert!(!requirement.satisfied_by(&[Role::Consumer].into_iter().collect()));
        assert!(!requirement.satisfied_by(&HashSet::new()));
        assert!(RoleRequirement::AnyAuthenticated.satisfied_by(&HashSet::new()));
    }

    #[test]
    fn rule_deserializes_from_policy_json() {
        let rule: PolicyRule = serde_json::from_str(
            r#"{"prefix": "/admin", "roles": ["ADMINISTRATOR"], "unauthenticated": "deny_not_found"}"#,
        )
        .expect("rule should parse");
        assert_eq!(rule.prefix, "/admin");
        assert_eq!(rule.requirement, any_of(&[Role::Administrator]));
        assert_eq!(rule.unauthenticated, UnauthenticatedAction::DenyNotFound);

        let rule: PolicyRule =
            serde_json::from_str(r#"{"prefix": "/pickdash", "roles": "any"}"#).expect("rule should parse");
        assert_eq!(rule.requirement, RoleRequirement::AnyAuthenticated);
        assert_eq!(rule.unauthenticated, UnauthenticatedAction::RedirectLogin);
    }

    #[test]
    fn unknown_roles_keyword_fails_to_parse() {
        let result: Result<PolicyRule, _> =
            serde_json::from_str(r#"{"prefix": "/admin", "roles": "everyone"}"#);
        assert!(result.is_err());
    }
}
