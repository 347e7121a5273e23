use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::RoleSource;
use crate::errors::ResolveError;

/// Default role-membership adapter reading the `subject_roles` table.
///
/// The table is written by the external system of record; the gateway only
/// reads it. An empty result set is an empty membership, not an error.
pub struct SqlRoleSource {
    pool: SqlitePool,
}

impl SqlRoleSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleSource for SqlRoleSource {
    async fn roles_for_subject(&self, subject: Uuid) -> Result<Vec<String>, ResolveError> {
        let rows = sqlx::query("SELECT role FROM subject_roles WHERE subject_id = ? ORDER BY role")
            .bind(subject.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|err| ResolveError::Unavailable(err.to_string()))?;

        Ok(rows.iter().map(|row| row.get::<String, _>("role")).collect())
    }
}
