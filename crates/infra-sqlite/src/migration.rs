// Schema migrations, applied in version order

use crate::error::map_sqlx_error;
use sqlx::SqlitePool;
use taskboard_core::error::Result;
use tracing::info;

/// Ordered schema migrations: (version, description, SQL)
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "initial schema", include_str!("../migrations/001_initial_schema.sql")),
    (2, "activity log", include_str!("../migrations/002_activity_log.sql")),
];

/// Bring the schema up to the latest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = schema_version(pool).await?;
    info!(current_version = current_version, "Checking database schema");

    for (version, description, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }
        info!(version = *version, description = *description, "Applying migration");
        apply_migration(pool, sql).await?;
    }

    Ok(())
}

/// Highest applied version, 0 on a fresh database
async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;
    if table_exists == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(version.unwrap_or(0))
}

/// Run one migration file in a transaction, statement by statement
async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    for statement in sql.split(';') {
        let statement = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        if statement.trim().is_empty() {
            continue;
        }
        sqlx::query(statement.trim())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in [
            "boards",
            "tasks",
            "task_dependencies",
            "recurring_definitions",
            "activity_log",
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 2);
    }
}
