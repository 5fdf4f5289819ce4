use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::models::{Donation, RecurringReminder};
use super::DbPool;

const REMINDER_COLUMNS: &str = "id, donor_id, food_type, weight, frequency, storage, start_date, \
     next_scheduled, predicted_category, is_active, created_at, updated_at";

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<RecurringReminder> {
    Ok(RecurringReminder {
        id: row.get("id")?,
        donor_id: row.get("donor_id")?,
        food_type: row.get("food_type")?,
        weight: row.get("weight")?,
        frequency: row.get("frequency")?,
        storage: row.get("storage")?,
        start_date: row.get("start_date")?,
        next_scheduled: row.get("next_scheduled")?,
        predicted_category: row.get("predicted_category")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub async fn insert_reminder(pool: &DbPool, reminder: &RecurringReminder) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        &format!(
            "INSERT INTO recurring_reminders ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            REMINDER_COLUMNS
        ),
        params![
            reminder.id,
            reminder.donor_id,
            reminder.food_type,
            reminder.weight,
            reminder.frequency,
            reminder.storage,
            reminder.start_date,
            reminder.next_scheduled,
            reminder.predicted_category,
            reminder.is_active,
            reminder.created_at,
            reminder.updated_at,
        ],
    )?;
    Ok(())
}

pub async fn list_reminders_for_donor(pool: &DbPool, donor_id: &str) -> anyhow::Result<Vec<RecurringReminder>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM recurring_reminders WHERE donor_id = ?1 ORDER BY created_at DESC",
        REMINDER_COLUMNS
    ))?;
    let list = stmt
        .query_map(params![donor_id], reminder_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(list)
}

pub async fn get_reminder_for_donor(
    pool: &DbPool,
    donor_id: &str,
    id: &str,
) -> anyhow::Result<Option<RecurringReminder>> {
    let conn = pool.get()?;
    let reminder = conn
        .query_row(
            &format!(
                "SELECT {} FROM recurring_reminders WHERE id = ?1 AND donor_id = ?2",
                REMINDER_COLUMNS
            ),
            params![id, donor_id],
            reminder_from_row,
        )
        .optional()?;
    Ok(reminder)
}

/// Active reminders whose next run is at or before `now`.
pub async fn list_due_reminders(pool: &DbPool, now: DateTime<Utc>) -> anyhow::Result<Vec<RecurringReminder>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM recurring_reminders WHERE is_active = 1",
        REMINDER_COLUMNS
    ))?;
    let due = stmt
        .query_map([], reminder_from_row)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|r| r.next_scheduled <= now)
        .collect();
    Ok(due)
}

pub async fn save_reminder(pool: &DbPool, reminder: &RecurringReminder) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE recurring_reminders SET food_type = ?2, weight = ?3, frequency = ?4, storage = ?5, \
         start_date = ?6, next_scheduled = ?7, predicted_category = ?8, is_active = ?9, \
         updated_at = ?10 WHERE id = ?1",
        params![
            reminder.id,
            reminder.food_type,
            reminder.weight,
            reminder.frequency,
            reminder.storage,
            reminder.start_date,
            reminder.next_scheduled,
            reminder.predicted_category,
            reminder.is_active,
            reminder.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Inserts the donation produced by a due reminder and moves the reminder to
/// its next run. Either both rows change or neither does.
pub async fn record_recurring_run(
    pool: &DbPool,
    donation: &Donation,
    reminder: &RecurringReminder,
) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    super::donations::write_donation(&tx, donation)?;
    let moved = tx.execute(
        "UPDATE recurring_reminders SET next_scheduled = ?2, updated_at = ?3 WHERE id = ?1",
        params![reminder.id, reminder.next_scheduled, reminder.updated_at],
    )?;
    if moved == 0 {
        tx.rollback()?;
        anyhow::bail!("Reminder {} disappeared before it could be rescheduled", reminder.id);
    }
    tx.commit()?;
    Ok(())
}
