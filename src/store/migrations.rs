//! Version-tracked schema migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;
use tracing::info;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_pending_approvals",
        sql: r#"
            CREATE TABLE IF NOT EXISTS pending_approvals (
                run_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                message TEXT NOT NULL,
                received_at TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                intent TEXT NOT NULL,
                sla_breached INTEGER NOT NULL DEFAULT 0,
                proposed_action TEXT NOT NULL,
                supervisor_note TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pending_created_at
                ON pending_approvals(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_message_stats",
        sql: r#"
            CREATE TABLE IF NOT EXISTS message_stats (
                run_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                intent TEXT NOT NULL,
                sla_breached INTEGER NOT NULL DEFAULT 0,
                proposed_action TEXT NOT NULL,
                final_status TEXT NOT NULL,
                human_approved INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_stats_final_status
                ON message_stats(final_status);
            CREATE INDEX IF NOT EXISTS idx_stats_client_id
                ON message_stats(client_id);
        "#,
    },
    Migration {
        version: 3,
        name: "add_suggested_response",
        sql: r#"
            ALTER TABLE pending_approvals ADD COLUMN suggested_response TEXT;
        "#,
    },
];

/// Run all pending migrations against the connection.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("creating _migrations table: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql).await.map_err(|e| {
            DatabaseError::Migration(format!(
                "applying migration {} ({}): {e}",
                migration.version, migration.name
            ))
        })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| {
            DatabaseError::Migration(format!(
                "recording migration {}: {e}",
                migration.version
            ))
        })?;
        info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

/// Highest applied migration version, or 0 on a fresh database.
async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(e.to_string())),
        None => Ok(0),
    }
}
