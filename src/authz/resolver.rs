use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::Role;
use crate::errors::ResolveError;

/// The external role-membership system of record.
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// Fetch the current role membership for a subject. Returns raw role
    /// names; validation into the closed `Role` vocabulary happens at the
    /// resolver boundary. An empty list is a valid result (authenticated
    /// subject with no roles), distinct from a `ResolveError`.
    async fn roles_for_subject(&self, subject: Uuid) -> Result<Vec<String>, ResolveError>;
}

struct CacheEntry {
    roles: HashSet<Role>,
    fetched_at: Instant,
}

/// Role resolver fronted by a TTL cache with singleflight coalescing.
///
/// Concurrent resolutions for the same subject while no fresh entry exists
/// collapse into one source lookup; all waiters observe the entry that lookup
/// stored. Eviction is lazy: stale entries are ignored on read and replaced
/// on the next refresh, so no background sweep is needed. Lookup errors are
/// never cached; each failed request fails closed on its own.
pub struct CachedRoleResolver {
    source: Arc<dyn RoleSource>,
    ttl: Duration,
    lookup_timeout: Duration,
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
    flights: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CachedRoleResolver {
    pub fn new(source: Arc<dyn RoleSource>, ttl: Duration, lookup_timeout: Duration) -> Self {
        Self {
            source,
            ttl,
            lookup_timeout,
            entries: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, subject: Uuid) -> Result<HashSet<Role>, ResolveError> {
        if let Some(roles) = self.cached(subject).await {
            return Ok(roles);
        }

        // Collapse concurrent misses for this subject into one lookup.
        let flight = self
            .flights
            .lock()
            .await
            .entry(subject)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = flight.lock().await;

        // A coalesced waiter lands here after the winning lookup finished and
        // finds the entry it stored.
        if let Some(roles) = self.cached(subject).await {
            return Ok(roles);
        }

        let result = match tokio::time::timeout(
            self.lookup_timeout,
            self.source.roles_for_subject(subject),
        )
        .await
        {
            Ok(Ok(names)) => {
                let roles = validate_roles(subject, names);
                self.entries.write().await.insert(
                    subject,
                    CacheEntry {
                        roles: roles.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(roles)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ResolveError::Timeout),
        };

        drop(guard);
        self.flights.lock().await.remove(&subject);
        result
    }

    async fn cached(&self, subject: Uuid) -> Option<HashSet<Role>> {
        let entries = self.entries.read().await;
        entries
            .get(&subject)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.roles.clone())
    }
}

/// Validate raw role names from the membership source. Unrecognized names
/// are logged and skipped: one bad row must not lock a subject out of areas
/// their valid roles grant.
fn validate_roles(subject: Uuid, names: Vec<String>) -> HashSet<Role> {
    let mut roles = HashSet::with_capacity(names.len());
    for name in names {
        match Role::from_str(&name) {
            Ok(role) => {
                roles.insert(role);
            }
            Err(_) => {
                tracing::warn!(
                    subject = %subject,
                    role = %name,
                    "ignoring unrecognized role from membership source"
                );
            }
        }
    }
    roles
}
