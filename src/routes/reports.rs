use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::audit::AuditQuery;
use crate::auth::AdminUser;
use crate::db::{self, models::{AuditLogEntry, Donation}};
use crate::error::{ApiError, ApiResult};
use crate::filters::{DonationFilter, DonationQuery};
use crate::routes::audit_logs::filtered_logs;
use crate::AppState;

fn csv_response(body: Vec<u8>, filename: &'static str) -> Response {
    let mut resp = Response::new(body.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(filename));
    resp
}

pub(crate) fn audit_csv(logs: &[AuditLogEntry]) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "id", "timestamp", "actor_id", "actor_name", "actor_email", "action",
        "resource", "resource_id", "severity", "details", "ip",
    ])?;
    for log in logs {
        let row: [&str; 11] = [
            log.id.as_str(),
            &log.timestamp.to_rfc3339(),
            &log.actor.id,
            &log.actor.name,
            &log.actor.email,
            &log.action,
            log.resource.as_str(),
            log.resource_id.as_deref().unwrap_or_default(),
            log.severity.as_str(),
            &log.details,
            log.ip.as_deref().unwrap_or_default(),
        ];
        w.write_record(row)?;
    }
    w.into_inner()
        .map_err(|e| anyhow::anyhow!("CSV flush failed: {}", e.error()))
}

pub(crate) fn donations_csv(donations: &[Donation]) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "id", "created_at", "donor_id", "donor_name", "donor_type", "status",
        "items", "value", "flag_reason", "notes",
    ])?;
    for d in donations {
        let items = d
            .items
            .iter()
            .map(|i| format!("{} x{}", i.name, i.quantity))
            .collect::<Vec<_>>()
            .join("; ");
        let row: [&str; 10] = [
            d.id.as_str(),
            &d.created_at.to_rfc3339(),
            &d.donor_id,
            &d.donor_name,
            d.donor_type.as_str(),
            d.status.as_str(),
            &items,
            &format!("{:.2}", d.value),
            d.flag_reason.as_deref().unwrap_or_default(),
            d.notes.as_deref().unwrap_or_default(),
        ];
        w.write_record(row)?;
    }
    w.into_inner()
        .map_err(|e| anyhow::anyhow!("CSV flush failed: {}", e.error()))
}

pub async fn export_audit_logs(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<impl IntoResponse> {
    let logs = filtered_logs(&state, &query).await?;
    let body = audit_csv(&logs)?;
    tracing::info!("Audit log export ({} rows) by {}", logs.len(), admin.id);
    Ok(csv_response(body, "attachment; filename=audit-logs.csv"))
}

pub async fn export_donations(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(query): Query<DonationQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = DonationFilter::try_from(&query).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let donations = filter.apply(db::list_donations(&state.db).await?, &state.config.local_now());
    let body = donations_csv(&donations)?;
    tracing::info!("Donation export ({} rows) by {}", donations.len(), admin.id);
    Ok(csv_response(body, "attachment; filename=donations.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn audit_csv_quotes_embedded_commas() {
        let mut logs = fixtures::audit_logs();
        logs[0].details = "Moved to Hall B, renamed \"Spring drive\"".to_string();
        let out = String::from_utf8(audit_csv(&logs).unwrap()).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("id,timestamp,actor_id"));
        assert_eq!(out.lines().count(), logs.len() + 1);
        assert!(out.contains("\"Moved to Hall B, renamed \"\"Spring drive\"\"\""));
    }

    #[test]
    fn donations_csv_lists_items_inline() {
        let donations = fixtures::donations();
        let out = String::from_utf8(donations_csv(&donations).unwrap()).unwrap();
        assert_eq!(out.lines().count(), donations.len() + 1);
        let first = &donations[0];
        assert!(out.contains(&format!("{} x{}", first.items[0].name, first.items[0].quantity)));
    }
}
