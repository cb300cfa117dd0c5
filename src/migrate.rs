use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use crate::{AppError, AppResult};
use tracing::{error, info};

pub const SCHEMA_TOO_NEW: &str = "SCHEMA/TOO_NEW";
pub const SCHEMA_CHECKSUM_MISMATCH: &str = "SCHEMA/CHECKSUM_MISMATCH";

/// One forward-only schema step. Versions within a set increase by one.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// A named, independently versioned list of migrations. Several sets may share
/// one database file; each keeps its own version counter.
#[derive(Debug, Clone, Copy)]
pub struct MigrationSet {
    pub scope: &'static str,
    pub migrations: &'static [Migration],
}

impl MigrationSet {
    pub fn latest_version(&self) -> i64 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }
}

pub static LOCAL_MIGRATIONS: MigrationSet = MigrationSet {
    scope: "local",
    migrations: &[
        Migration {
            version: 1,
            name: "0001_create_assets.sql",
            sql: include_str!("../migrations/local/0001_create_assets.sql"),
        },
        Migration {
            version: 2,
            name: "0002_assets_asset_tag_idx.sql",
            sql: include_str!("../migrations/local/0002_assets_asset_tag_idx.sql"),
        },
    ],
};

pub static REMOTE_MIGRATIONS: MigrationSet = MigrationSet {
    scope: "remote",
    migrations: &[Migration {
        version: 1,
        name: "0001_create_items.sql",
        sql: include_str!("../migrations/remote/0001_create_items.sql"),
    }],
};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.chars().count() > 160 {
        let cut: String = trimmed.chars().take(160).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

fn strip_comments(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn checksum(cleaned: &str) -> String {
    format!("{:x}", Sha256::digest(cleaned.as_bytes()))
}

async fn ensure_migrations_table(pool: &SqlitePool) -> AppResult<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           scope      TEXT NOT NULL,\
           version    INTEGER NOT NULL,\
           name       TEXT NOT NULL,\
           applied_at INTEGER NOT NULL,\
           checksum   TEXT NOT NULL,\
           PRIMARY KEY (scope, version)\
         )",
    )
    .await?;
    Ok(())
}

/// Highest applied version for `scope`, or 0 on a fresh database.
pub async fn schema_version(pool: &SqlitePool, scope: &str) -> AppResult<i64> {
    ensure_migrations_table(pool).await?;
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations WHERE scope = ?")
            .bind(scope)
            .fetch_one(pool)
            .await?;
    Ok(version.unwrap_or(0))
}

/// Bring the database up to the latest version of `set`.
///
/// Idempotent: applied steps are skipped after their checksum is confirmed.
/// A database written by a newer build is refused rather than touched.
pub async fn apply_migrations(pool: &SqlitePool, set: &MigrationSet) -> AppResult<i64> {
    ensure_migrations_table(pool).await?;

    let current = schema_version(pool, set.scope).await?;
    let latest = set.latest_version();
    if current > latest {
        error!(
            target: "edu_inventory",
            event = "schema_too_new",
            scope = set.scope,
            current,
            latest
        );
        return Err(AppError::new(
            SCHEMA_TOO_NEW,
            "The database was created by a newer version of this program.",
        )
        .with_context("scope", set.scope)
        .with_context("current", current.to_string())
        .with_context("latest", latest.to_string()));
    }

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations WHERE scope = ?")
        .bind(set.scope)
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<i64, String> = HashMap::new();
    for r in rows {
        let version: i64 = r.try_get("version")?;
        let sum: String = r.try_get("checksum")?;
        applied.insert(version, sum);
    }

    for migration in set.migrations {
        let cleaned = strip_comments(migration.sql);
        let sum = checksum(&cleaned);

        if let Some(stored) = applied.get(&migration.version) {
            if stored != &sum {
                return Err(AppError::new(
                    SCHEMA_CHECKSUM_MISMATCH,
                    "A schema migration was edited after it was applied.",
                )
                .with_context("scope", set.scope)
                .with_context("file", migration.name));
            }
            tracing::debug!(
                target: "edu_inventory",
                event = "migration_skip_file",
                scope = set.scope,
                file = migration.name
            );
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in cleaned.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            info!(
                target: "edu_inventory",
                event = "migration_stmt",
                scope = set.scope,
                file = migration.name,
                sql = %preview(s)
            );
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(
                    target: "edu_inventory",
                    event = "migration_stmt_error",
                    scope = set.scope,
                    file = migration.name,
                    sql = %preview(s),
                    error = %e
                );
                return Err(AppError::from(e).with_context("file", migration.name));
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (scope, version, name, applied_at, checksum) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(set.scope)
        .bind(migration.version)
        .bind(migration.name)
        .bind(now_ms())
        .bind(&sum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            target: "edu_inventory",
            event = "migration_file_applied",
            scope = set.scope,
            file = migration.name,
            version = migration.version
        );
    }

    Ok(latest)
}
