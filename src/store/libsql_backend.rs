//! libSQL backend — async implementation of both store traits.
//!
//! Supports local file and in-memory databases. All operations are
//! single statements, so the pipeline and supervisor workflow get
//! atomic, isolated row access without explicit transactions.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::metrics::{ClientActivity, DistributionEntry, MetricsSummary, pct};
use crate::pipeline::types::{Intent, ProposedAction, Run, RunStatus, Sentiment};
use crate::store::migrations;
use crate::store::traits::{ApprovalStore, StatsStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string written by this backend.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql error on INSERT to Constraint when the primary key is
/// violated, Query otherwise.
fn map_insert_error(e: libsql::Error) -> DatabaseError {
    let text = e.to_string();
    if text.contains("UNIQUE constraint") || text.contains("PRIMARY KEY") {
        DatabaseError::Constraint(text)
    } else {
        DatabaseError::Query(text)
    }
}

const PENDING_COLUMNS: &str = "run_id, client_id, message, received_at, sentiment, intent, \
     sla_breached, proposed_action, supervisor_note, suggested_response, created_at";

/// Map a libsql row (PENDING_COLUMNS order) to a Run. A pending run has
/// no decision and no execution result yet, by definition.
fn row_to_run(row: &libsql::Row) -> Result<Run, libsql::Error> {
    let run_id_str: String = row.get(0)?;
    let sentiment_str: String = row.get(4)?;
    let intent_str: String = row.get(5)?;
    let sla_breached: i64 = row.get(6)?;
    let action_str: String = row.get(7)?;
    let created_str: String = row.get(10)?;

    Ok(Run {
        run_id: Uuid::parse_str(&run_id_str).unwrap_or_else(|_| Uuid::nil()),
        client_id: row.get(1)?,
        message: row.get(2)?,
        received_at: row.get(3)?,
        sentiment: Sentiment::parse(&sentiment_str).unwrap_or(Sentiment::Neutral),
        intent: Intent::parse(&intent_str).unwrap_or(Intent::GeneralInquiry),
        sla_breached: sla_breached != 0,
        proposed_action: ProposedAction::parse(&action_str)
            .unwrap_or(ProposedAction::EscalateToHuman),
        supervisor_note: row.get(8).ok(),
        suggested_response: row.get(9).ok(),
        human_approved: None,
        execution_result: None,
        created_at: parse_datetime(&created_str),
    })
}

/// Run a scalar COUNT query.
async fn count(conn: &Connection, sql: &str) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?
    {
        Some(row) => {
            let n: i64 = row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
            Ok(n.max(0) as u64)
        }
        None => Ok(0),
    }
}

/// Grouped count over one column of `message_stats`, descending by count.
async fn distribution(
    conn: &Connection,
    column: &str,
    total: u64,
) -> Result<Vec<DistributionEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {column}, COUNT(*) FROM message_stats GROUP BY {column} ORDER BY COUNT(*) DESC"
    );
    let mut rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

    let mut entries = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?
    {
        let label: String = row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
        let n: i64 = row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?;
        let n = n.max(0) as u64;
        entries.push(DistributionEntry {
            label,
            count: n,
            percentage: pct(n, total),
        });
    }
    Ok(entries)
}

// ── Approval store ──────────────────────────────────────────────────

#[async_trait]
impl ApprovalStore for LibSqlBackend {
    async fn save(&self, run: &Run) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO pending_approvals (run_id, client_id, message, received_at, \
                 sentiment, intent, sla_breached, proposed_action, supervisor_note, \
                 suggested_response, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    run.run_id.to_string(),
                    run.client_id.clone(),
                    run.message.clone(),
                    run.received_at.clone(),
                    run.sentiment.as_str(),
                    run.intent.as_str(),
                    run.sla_breached as i64,
                    run.proposed_action.as_str(),
                    opt_text(run.supervisor_note.as_deref()),
                    opt_text(run.suggested_response.as_deref()),
                    run.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn get(&self, run_id: Uuid) -> Result<Option<Run>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PENDING_COLUMNS} FROM pending_approvals WHERE run_id = ?1"),
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(
                row_to_run(&row).map_err(|e| DatabaseError::Query(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, run_id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM pending_approvals WHERE run_id = ?1",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Run>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PENDING_COLUMNS} FROM pending_approvals \
                     ORDER BY created_at ASC, run_id ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut runs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            runs.push(row_to_run(&row).map_err(|e| DatabaseError::Query(e.to_string()))?);
        }
        Ok(runs)
    }
}

// ── Stats store ─────────────────────────────────────────────────────

#[async_trait]
impl StatsStore for LibSqlBackend {
    async fn record(&self, run: &Run, final_status: RunStatus) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO message_stats (run_id, client_id, sentiment, intent, \
                 sla_breached, proposed_action, final_status, human_approved, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
                params![
                    run.run_id.to_string(),
                    run.client_id.clone(),
                    run.sentiment.as_str(),
                    run.intent.as_str(),
                    run.sla_breached as i64,
                    run.proposed_action.as_str(),
                    final_status.as_str(),
                    run.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn amend(&self, run_id: Uuid, approved: bool) -> Result<(), DatabaseError> {
        let new_status = if approved {
            RunStatus::ApprovedAndExecuted
        } else {
            RunStatus::Rejected
        };

        // Guarded update: only a still-pending row is amendable, so a
        // second amend (or an amend of a non-escalated run) hits no rows.
        let affected = self
            .conn()
            .execute(
                "UPDATE message_stats SET final_status = ?1, human_approved = ?2 \
                 WHERE run_id = ?3 AND final_status = 'pending_approval'",
                params![new_status.as_str(), approved as i64, run_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message_stat".into(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    async fn summarize(&self) -> Result<MetricsSummary, DatabaseError> {
        let conn = self.conn();

        let total = count(conn, "SELECT COUNT(*) FROM message_stats").await?;
        if total == 0 {
            return Ok(MetricsSummary::empty());
        }

        let escalated = count(
            conn,
            "SELECT COUNT(*) FROM message_stats \
             WHERE proposed_action = 'escalate_to_human'",
        )
        .await?;
        let sla_breached = count(
            conn,
            "SELECT COUNT(*) FROM message_stats WHERE sla_breached = 1",
        )
        .await?;
        let approved = count(
            conn,
            "SELECT COUNT(*) FROM message_stats WHERE human_approved = 1",
        )
        .await?;
        let pending = count(
            conn,
            "SELECT COUNT(*) FROM message_stats \
             WHERE final_status = 'pending_approval'",
        )
        .await?;

        let sentiment_distribution = distribution(conn, "sentiment", total).await?;
        let intent_distribution = distribution(conn, "intent", total).await?;
        let action_distribution = distribution(conn, "proposed_action", total).await?;

        let mut rows = conn
            .query(
                "SELECT client_id, COUNT(*), \
                 SUM(CASE WHEN sentiment = 'negative' THEN 1 ELSE 0 END), \
                 SUM(CASE WHEN sla_breached = 1 THEN 1 ELSE 0 END) \
                 FROM message_stats GROUP BY client_id \
                 ORDER BY COUNT(*) DESC LIMIT 10",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut top_clients = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            let client_id: String =
                row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
            let client_total: i64 =
                row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?;
            let negative: i64 = row.get(2).map_err(|e| DatabaseError::Query(e.to_string()))?;
            let breached: i64 = row.get(3).map_err(|e| DatabaseError::Query(e.to_string()))?;
            top_clients.push(ClientActivity {
                client_id,
                total: client_total.max(0) as u64,
                negative_count: negative.max(0) as u64,
                sla_breached_count: breached.max(0) as u64,
            });
        }

        Ok(MetricsSummary {
            total_messages: total,
            escalation_rate: pct(escalated, total),
            sla_breach_rate: pct(sla_breached, total),
            approval_rate: pct(approved, escalated),
            pending_approvals: pending,
            sentiment_distribution,
            intent_distribution,
            action_distribution,
            top_clients,
        })
    }
}
