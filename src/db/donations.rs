use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Donation, DonationStatus};
use super::{json_column, json_text, DbPool};

const DONATION_COLUMNS: &str = "id, donor_id, donor_name, donor_type, items, status, created_at, \
     scheduled_pickup, completed_at, value, notes, flag_reason, predicted_category";

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<Donation> {
    Ok(Donation {
        id: row.get("id")?,
        donor_id: row.get("donor_id")?,
        donor_name: row.get("donor_name")?,
        donor_type: row.get("donor_type")?,
        items: json_column(row, "items")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        scheduled_pickup: row.get("scheduled_pickup")?,
        completed_at: row.get("completed_at")?,
        value: row.get("value")?,
        notes: row.get("notes")?,
        flag_reason: row.get("flag_reason")?,
        predicted_category: row.get("predicted_category")?,
    })
}

pub(crate) fn write_donation(conn: &Connection, donation: &Donation) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO donations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            DONATION_COLUMNS
        ),
        params![
            donation.id,
            donation.donor_id,
            donation.donor_name,
            donation.donor_type,
            json_text(&donation.items)?,
            donation.status,
            donation.created_at,
            donation.scheduled_pickup,
            donation.completed_at,
            donation.value,
            donation.notes,
            donation.flag_reason,
            donation.predicted_category,
        ],
    )
}

pub async fn add_donation(pool: &DbPool, donation: &Donation) -> anyhow::Result<()> {
    let conn = pool.get()?;
    write_donation(&conn, donation)?;
    Ok(())
}

pub async fn list_donations(pool: &DbPool) -> anyhow::Result<Vec<Donation>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM donations ORDER BY created_at DESC",
        DONATION_COLUMNS
    ))?;
    let donations = stmt
        .query_map([], donation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(donations)
}

pub async fn list_donations_by_status(pool: &DbPool, status: DonationStatus) -> anyhow::Result<Vec<Donation>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM donations WHERE status = ?1 ORDER BY created_at DESC",
        DONATION_COLUMNS
    ))?;
    let donations = stmt
        .query_map(params![status], donation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(donations)
}

pub async fn get_donation(pool: &DbPool, id: &str) -> anyhow::Result<Option<Donation>> {
    let conn = pool.get()?;
    let donation = conn
        .query_row(
            &format!("SELECT {} FROM donations WHERE id = ?1", DONATION_COLUMNS),
            params![id],
            donation_from_row,
        )
        .optional()?;
    Ok(donation)
}

/// Persists the status-related fields of a donation after a transition.
pub async fn save_donation_status(pool: &DbPool, donation: &Donation) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE donations SET status = ?2, flag_reason = ?3, completed_at = ?4, notes = ?5 WHERE id = ?1",
        params![
            donation.id,
            donation.status,
            donation.flag_reason,
            donation.completed_at,
            donation.notes,
        ],
    )?;
    Ok(changed > 0)
}
