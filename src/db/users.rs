use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{AuditLogEntry, User, VerificationStatus};
use super::DbPool;

const USER_COLUMNS: &str = "id, name, email, role, verification_status, flag_reason, \
     verification_notes, verified_by, verified_at, location, latitude, longitude, join_date, \
     last_active, profile_complete, donations_count, total_donated";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: row.get("role")?,
        verification_status: row.get("verification_status")?,
        flag_reason: row.get("flag_reason")?,
        verification_notes: row.get("verification_notes")?,
        verified_by: row.get("verified_by")?,
        verified_at: row.get("verified_at")?,
        location: row.get("location")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        join_date: row.get("join_date")?,
        last_active: row.get("last_active")?,
        profile_complete: row.get("profile_complete")?,
        donations_count: row.get("donations_count")?,
        total_donated: row.get("total_donated")?,
    })
}

pub(crate) fn write_user(conn: &Connection, user: &User) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            USER_COLUMNS
        ),
        params![
            user.id,
            user.name,
            user.email,
            user.role,
            user.verification_status,
            user.flag_reason,
            user.verification_notes,
            user.verified_by,
            user.verified_at,
            user.location,
            user.latitude,
            user.longitude,
            user.join_date,
            user.last_active,
            user.profile_complete,
            user.donations_count,
            user.total_donated,
        ],
    )
}

pub async fn insert_user(pool: &DbPool, user: &User) -> anyhow::Result<()> {
    let conn = pool.get()?;
    write_user(&conn, user)?;
    Ok(())
}

pub async fn list_users(pool: &DbPool) -> anyhow::Result<Vec<User>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users", USER_COLUMNS))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub async fn get_user(pool: &DbPool, id: &str) -> anyhow::Result<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub async fn count_users(pool: &DbPool) -> anyhow::Result<i64> {
    let conn = pool.get()?;
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

/// Sets the verification status. Verifying clears any flag; returns the
/// updated user, or `None` when the id is unknown.
pub async fn set_user_verification(
    pool: &DbPool,
    id: &str,
    status: VerificationStatus,
    notes: Option<&str>,
    verified_by: &str,
    at: DateTime<Utc>,
) -> anyhow::Result<Option<User>> {
    let changed = {
        let conn = pool.get()?;
        match status {
            VerificationStatus::Verified => conn.execute(
                "UPDATE users SET verification_status = ?2, flag_reason = NULL, \
                 verification_notes = ?3, verified_by = ?4, verified_at = ?5 WHERE id = ?1",
                params![id, status, notes.unwrap_or(""), verified_by, at],
            )?,
            _ => conn.execute(
                "UPDATE users SET verification_status = ?2, verification_notes = ?3, \
                 verified_by = NULL, verified_at = NULL WHERE id = ?1",
                params![id, status, notes.unwrap_or("")],
            )?,
        }
    };
    if changed == 0 {
        return Ok(None);
    }
    get_user(pool, id).await
}

pub async fn flag_user(pool: &DbPool, id: &str, reason: &str) -> anyhow::Result<Option<User>> {
    let changed = {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE users SET verification_status = ?2, flag_reason = ?3, \
             verified_by = NULL, verified_at = NULL WHERE id = ?1",
            params![id, VerificationStatus::Flagged, reason],
        )?
    };
    if changed == 0 {
        return Ok(None);
    }
    get_user(pool, id).await
}

/// Deletes a user and records the audit entry in the same transaction.
pub async fn delete_user(pool: &DbPool, id: &str, audit: &AuditLogEntry) -> anyhow::Result<bool> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if removed == 0 {
        tx.rollback()?;
        return Ok(false);
    }
    super::audit::insert_audit(&tx, audit)?;
    tx.commit()?;
    Ok(true)
}

pub async fn touch_user(pool: &DbPool, id: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute("UPDATE users SET last_active = ?2 WHERE id = ?1", params![id, at])?;
    Ok(())
}
