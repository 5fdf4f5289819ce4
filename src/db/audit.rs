use rusqlite::{params, Connection, Row};

use super::models::{AuditActor, AuditLogEntry};
use super::DbPool;

const AUDIT_COLUMNS: &str = "id, timestamp, actor_id, actor_name, actor_email, action, resource, \
     resource_id, severity, details, metadata, ip, user_agent";

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        actor: AuditActor {
            id: row.get("actor_id")?,
            name: row.get("actor_name")?,
            email: row.get("actor_email")?,
        },
        action: row.get("action")?,
        resource: row.get("resource")?,
        resource_id: row.get("resource_id")?,
        severity: row.get("severity")?,
        details: row.get("details")?,
        metadata: row.get("metadata")?,
        ip: row.get("ip")?,
        user_agent: row.get("user_agent")?,
    })
}

pub(crate) fn insert_audit(conn: &Connection, entry: &AuditLogEntry) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO audit_logs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            AUDIT_COLUMNS
        ),
        params![
            entry.id,
            entry.timestamp,
            entry.actor.id,
            entry.actor.name,
            entry.actor.email,
            entry.action,
            entry.resource,
            entry.resource_id,
            entry.severity,
            entry.details,
            entry.metadata,
            entry.ip,
            entry.user_agent,
        ],
    )
}

pub async fn log_audit(pool: &DbPool, entry: &AuditLogEntry) -> anyhow::Result<()> {
    let conn = pool.get()?;
    insert_audit(&conn, entry)?;
    Ok(())
}

/// Candidate entries for the audit view, optionally narrowed to one actor.
/// Ordering and the remaining filters are applied by `crate::audit`.
pub async fn list_audit_logs(pool: &DbPool, actor_id: Option<&str>) -> anyhow::Result<Vec<AuditLogEntry>> {
    let conn = pool.get()?;
    let logs = match actor_id {
        Some(actor) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_logs WHERE actor_id = ?1",
                AUDIT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![actor], audit_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM audit_logs", AUDIT_COLUMNS))?;
            let rows = stmt.query_map([], audit_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(logs)
}
