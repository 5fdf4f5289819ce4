use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::Distribution;
use super::{json_column, json_text, DbPool};

const DISTRIBUTION_COLUMNS: &str = "id, distributor_id, distributor_name, location, status, date, \
     end_time, people_served, estimated_people_to_serve, items_distributed, donation_ids, \
     volunteer_ids, volunteers_needed, current_volunteers, notes";

fn distribution_from_row(row: &Row<'_>) -> rusqlite::Result<Distribution> {
    Ok(Distribution {
        id: row.get("id")?,
        distributor_id: row.get("distributor_id")?,
        distributor_name: row.get("distributor_name")?,
        location: row.get("location")?,
        status: row.get("status")?,
        date: row.get("date")?,
        end_time: row.get("end_time")?,
        people_served: row.get("people_served")?,
        estimated_people_to_serve: row.get("estimated_people_to_serve")?,
        items_distributed: row.get("items_distributed")?,
        donation_ids: json_column(row, "donation_ids")?,
        volunteer_ids: json_column(row, "volunteer_ids")?,
        volunteers_needed: row.get("volunteers_needed")?,
        current_volunteers: row.get("current_volunteers")?,
        notes: row.get("notes")?,
    })
}

pub(crate) fn write_distribution(conn: &Connection, dist: &Distribution) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO distributions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            DISTRIBUTION_COLUMNS
        ),
        params![
            dist.id,
            dist.distributor_id,
            dist.distributor_name,
            dist.location,
            dist.status,
            dist.date,
            dist.end_time,
            dist.people_served,
            dist.estimated_people_to_serve,
            dist.items_distributed,
            json_text(&dist.donation_ids)?,
            json_text(&dist.volunteer_ids)?,
            dist.volunteers_needed,
            dist.current_volunteers,
            dist.notes,
        ],
    )
}

pub async fn insert_distribution(pool: &DbPool, dist: &Distribution) -> anyhow::Result<()> {
    let conn = pool.get()?;
    write_distribution(&conn, dist)?;
    Ok(())
}

pub async fn list_distributions(pool: &DbPool) -> anyhow::Result<Vec<Distribution>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM distributions ORDER BY date ASC",
        DISTRIBUTION_COLUMNS
    ))?;
    let list = stmt
        .query_map([], distribution_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(list)
}

pub async fn get_distribution(pool: &DbPool, id: &str) -> anyhow::Result<Option<Distribution>> {
    let conn = pool.get()?;
    let dist = conn
        .query_row(
            &format!("SELECT {} FROM distributions WHERE id = ?1", DISTRIBUTION_COLUMNS),
            params![id],
            distribution_from_row,
        )
        .optional()?;
    Ok(dist)
}

pub async fn save_distribution(pool: &DbPool, dist: &Distribution) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE distributions SET status = ?2, end_time = ?3, people_served = ?4, \
         items_distributed = ?5, donation_ids = ?6, volunteer_ids = ?7, current_volunteers = ?8, \
         notes = ?9 WHERE id = ?1",
        params![
            dist.id,
            dist.status,
            dist.end_time,
            dist.people_served,
            dist.items_distributed,
            json_text(&dist.donation_ids)?,
            json_text(&dist.volunteer_ids)?,
            dist.current_volunteers,
            dist.notes,
        ],
    )?;
    Ok(changed > 0)
}
