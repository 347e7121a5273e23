use std::sync::Arc;

use super::{CachedRoleResolver, Decision, PolicyTable};
use crate::errors::ResolveError;
use crate::token::TokenVerifier;

/// Orchestrates policy matching, credential verification and role resolution
/// into one routing decision per request.
///
/// Evaluation order:
/// 1. no matching rule -> allow (unprotected path, verifier never invoked)
/// 2. credential failure -> the rule's unauthenticated action
/// 3. resolution failure -> fail closed, same as an unauthenticated caller
/// 4. role intersection -> allow, disjoint -> masked as not found
pub struct DecisionEngine {
    verifier: TokenVerifier,
    resolver: Arc<CachedRoleResolver>,
    policy: Arc<PolicyTable>,
}

impl DecisionEngine {
    pub fn new(
        verifier: TokenVerifier,
        resolver: Arc<CachedRoleResolver>,
        policy: Arc<PolicyTable>,
    ) -> Self {
        Self {
            verifier,
            resolver,
            policy,
        }
    }

    pub async fn decide(&self, path: &str, token: Option<&str>) -> Decision {
        let Some(rule) = self.policy.matched(path) else {
            return Decision::Allow;
        };

        let subject = match self.verifier.verify(token) {
            Ok(subject) => subject,
            Err(err) => {
                tracing::debug!(
                    path = %path,
                    error = %err,
                    "unauthenticated request on protected path"
                );
                return rule.unauthenticated.decision();
            }
        };

        let roles = match self.resolver.resolve(subject.id).await {
            Ok(roles) => roles,
            Err(err) => {
                match &err {
                    ResolveError::Unavailable(_) => tracing::error!(
                        subject = %subject.id,
                        path = %path,
                        error = %err,
                        "failing closed: role membership source degraded"
                    ),
                    ResolveError::Timeout => tracing::warn!(
                        subject = %subject.id,
                        path = %path,
                        "failing closed: role lookup timed out"
                    ),
                    ResolveError::NotFound => tracing::debug!(
                        subject = %subject.id,
                        path = %path,
                        "failing closed: subject unknown to membership source"
                    ),
                }
                return rule.unauthenticated.decision();
            }
        };

        if rule.requirement.satisfied_by(&roles) {
            Decision::Allow
        } else {
            tracing::debug!(
                subject = %subject.id,
                path = %path,
                "role set disjoint from rule, masking as not found"
            );
            Decision::DenyNotFound
        }
    }
}
