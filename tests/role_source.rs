use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use rolegate::authz::{CachedRoleResolver, Role, RoleSource, SqlRoleSource};

async fn test_pool(dir: &TempDir, name: &str) -> Result<SqlitePool> {
    let db_path = dir.path().join(name);
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    Ok(pool)
}

async fn grant(pool: &SqlitePool, subject: Uuid, role: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO subject_roles (subject_id, role) VALUES (?, ?)")
        .bind(subject.to_string())
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn membership_rows_come_back_as_role_names() -> Result<()> {
    let dir = TempDir::new()?;
    let pool = test_pool(&dir, "source.db").await?;

    let subject = Uuid::new_v4();
    grant(&pool, subject, "OWNER").await?;
    grant(&pool, subject, "MANAGER").await?;

    let source = SqlRoleSource::new(pool);
    let names = source.roles_for_subject(subject).await?;
    assert_eq!(names, vec!["MANAGER".to_string(), "OWNER".to_string()]);

    Ok(())
}

#[tokio::test]
async fn unknown_subject_has_empty_membership() -> Result<()> {
    let dir = TempDir::new()?;
    let pool = test_pool(&dir, "empty.db").await?;

    let source = SqlRoleSource::new(pool);
    let names = source.roles_for_subject(Uuid::new_v4()).await?;
    assert!(names.is_empty());

    Ok(())
}

#[tokio::test]
async fn resolver_validates_rows_from_the_table() -> Result<()> {
    let dir = TempDir::new()?;
    let pool = test_pool(&dir, "validate.db").await?;

    let subject = Uuid::new_v4();
    grant(&pool, subject, "COURIER").await?;
    // A row the closed vocabulary does not know; must be skipped, not fatal.
    grant(&pool, subject, "NIGHT_SHIFT").await?;

    let resolver = CachedRoleResolver::new(
        Arc::new(SqlRoleSource::new(pool)),
        Duration::from_secs(60),
        Duration::from_secs(1),
    );

    let roles = resolver.resolve(subject).await?;
    assert_eq!(roles, [Role::Courier].into_iter().collect());

    Ok(())
}
