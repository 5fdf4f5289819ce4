use rusqlite::{params, OptionalExtension, Row};

use super::models::ReliefCamp;
use super::{json_column, json_text, DbPool};

const CAMP_COLUMNS: &str = "id, event_type, latitude, longitude, start_date, resources_needed, \
     created_by, demand_prediction, volunteers_alerted, ngo_alerted, created_at, updated_at";

fn camp_from_row(row: &Row<'_>) -> rusqlite::Result<ReliefCamp> {
    Ok(ReliefCamp {
        id: row.get("id")?,
        event_type: row.get("event_type")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        start_date: row.get("start_date")?,
        resources_needed: json_column(row, "resources_needed")?,
        created_by: row.get("created_by")?,
        demand_prediction: row.get("demand_prediction")?,
        volunteers_alerted: row.get("volunteers_alerted")?,
        ngo_alerted: row.get("ngo_alerted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub async fn insert_camp(pool: &DbPool, camp: &ReliefCamp) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        &format!(
            "INSERT INTO relief_camps ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            CAMP_COLUMNS
        ),
        params![
            camp.id,
            camp.event_type,
            camp.latitude,
            camp.longitude,
            camp.start_date,
            json_text(&camp.resources_needed)?,
            camp.created_by,
            camp.demand_prediction,
            camp.volunteers_alerted,
            camp.ngo_alerted,
            camp.created_at,
            camp.updated_at,
        ],
    )?;
    Ok(())
}

pub async fn list_camps(pool: &DbPool) -> anyhow::Result<Vec<ReliefCamp>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM relief_camps", CAMP_COLUMNS))?;
    let mut camps = stmt
        .query_map([], camp_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    camps.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    Ok(camps)
}

pub async fn get_camp(pool: &DbPool, id: &str) -> anyhow::Result<Option<ReliefCamp>> {
    let conn = pool.get()?;
    let camp = conn
        .query_row(
            &format!("SELECT {} FROM relief_camps WHERE id = ?1", CAMP_COLUMNS),
            params![id],
            camp_from_row,
        )
        .optional()?;
    Ok(camp)
}

pub async fn save_camp(pool: &DbPool, camp: &ReliefCamp) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE relief_camps SET event_type = ?2, start_date = ?3, resources_needed = ?4, \
         demand_prediction = ?5, volunteers_alerted = ?6, ngo_alerted = ?7, updated_at = ?8 \
         WHERE id = ?1",
        params![
            camp.id,
            camp.event_type,
            camp.start_date,
            json_text(&camp.resources_needed)?,
            camp.demand_prediction,
            camp.volunteers_alerted,
            camp.ngo_alerted,
            camp.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

pub async fn delete_camp(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let removed = conn.execute("DELETE FROM relief_camps WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}
