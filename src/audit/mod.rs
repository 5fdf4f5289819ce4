//! Audit log filtering.
//!
//! The audit view narrows a candidate list of entries by severity, actor,
//! action category and a symbolic date range, then orders the result newest
//! first. Everything here is pure: the caller supplies "now".

use chrono::{DateTime, TimeZone};
use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::db::models::{AuditLogEntry, AuditResource, Severity, UnknownVariant};

pub mod date_range;
pub mod event;

pub use date_range::{DateRange, TimeWindow, Timeframe, UnknownRange};
pub use event::AuditEvent;

/// Action selector from the dashboard. Compound categories map to an
/// (action, resource) pair; anything else matches the action verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionFilter {
    #[default]
    All,
    UserCreate,
    UserUpdate,
    DonationCreate,
    DonationUpdate,
    Verification,
    Exact(String),
}

impl FromStr for ActionFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Ok(match normalized.as_str() {
            "" | "all" => ActionFilter::All,
            "user-create" => ActionFilter::UserCreate,
            "user-update" => ActionFilter::UserUpdate,
            "donation-create" => ActionFilter::DonationCreate,
            "donation-update" => ActionFilter::DonationUpdate,
            "verification" => ActionFilter::Verification,
            _ => ActionFilter::Exact(normalized),
        })
    }
}

impl ActionFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        match self {
            ActionFilter::All => true,
            ActionFilter::UserCreate => entry.action == "create" && entry.resource == AuditResource::User,
            ActionFilter::UserUpdate => entry.action == "update" && entry.resource == AuditResource::User,
            ActionFilter::DonationCreate => {
                entry.action == "create" && entry.resource == AuditResource::Donation
            }
            ActionFilter::DonationUpdate => {
                entry.action == "update" && entry.resource == AuditResource::Donation
            }
            ActionFilter::Verification => {
                (entry.action == "create" || entry.action == "update") && mentions_verification(entry)
            }
            ActionFilter::Exact(action) => entry.action == *action,
        }
    }
}

fn mentions_verification(entry: &AuditLogEntry) -> bool {
    let in_metadata = entry
        .metadata
        .as_ref()
        .and_then(|m| m.get("field"))
        .and_then(|f| f.as_str())
        .map_or(false, |f| f.eq_ignore_ascii_case("verification"));
    in_metadata || entry.details.to_lowercase().contains("verification")
}

/// Query-string form of the filter as the dashboard sends it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub severity: Option<String>,
    pub action: Option<String>,
    pub date_range: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditFilter {
    pub severity: Option<Severity>,
    pub action: ActionFilter,
    pub date_range: DateRange,
    pub user_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    Severity(#[from] UnknownVariant),
    #[error(transparent)]
    DateRange(#[from] UnknownRange),
}

impl TryFrom<&AuditQuery> for AuditFilter {
    type Error = FilterError;

    fn try_from(query: &AuditQuery) -> Result<Self, Self::Error> {
        let severity = match query.severity.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.to_lowercase().parse()?),
        };
        let action = query
            .action
            .as_deref()
            .map(|a| a.parse().unwrap_or_default())
            .unwrap_or_default();
        let date_range = match query.date_range.as_deref() {
            Some(raw) => raw.parse()?,
            None => DateRange::All,
        };
        let user_id = query
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Ok(AuditFilter {
            severity,
            action,
            date_range,
            user_id,
        })
    }
}

impl AuditFilter {
    /// Narrows `entries` and returns them newest first. Entries sharing a
    /// timestamp are ordered by id so repeated queries agree.
    pub fn apply<Tz: TimeZone>(&self, entries: Vec<AuditLogEntry>, now: &DateTime<Tz>) -> Vec<AuditLogEntry> {
        let window = self.date_range.resolve(now);
        let mut out: Vec<AuditLogEntry> = entries
            .into_iter()
            .filter(|e| self.severity.map_or(true, |s| e.severity == s))
            .filter(|e| self.user_id.as_deref().map_or(true, |u| e.actor.id == u))
            .filter(|e| self.action.matches(e))
            .filter(|e| window.contains(e.timestamp))
            .collect();
        out.sort_by(newest_first);
        out
    }
}

pub fn newest_first(a: &AuditLogEntry, b: &AuditLogEntry) -> Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id))
}

/// Entries the dashboard highlights: warnings and criticals.
pub fn suspicious_count(entries: &[AuditLogEntry]) -> usize {
    entries
        .iter()
        .filter(|e| matches!(e.severity, Severity::Warning | Severity::Critical))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::Utc;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2025-04-19T20:00:00Z".parse().unwrap()
    }

    fn ids(entries: &[AuditLogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn query(pairs: &[(&str, &str)]) -> AuditFilter {
        let mut q = AuditQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "severity" => q.severity = v,
                "action" => q.action = v,
                "dateRange" => q.date_range = v,
                "userId" => q.user_id = v,
                _ => unreachable!(),
            }
        }
        AuditFilter::try_from(&q).unwrap()
    }

    #[test]
    fn today_keeps_only_same_day_entries() {
        let filter = query(&[("dateRange", "today")]);
        let out = filter.apply(fixtures::audit_logs(), &now());
        assert_eq!(ids(&out), vec!["log_9001", "log_9002", "log_9003", "log_9004"]);
    }

    #[test]
    fn yesterday_excludes_today_and_earlier_days() {
        let filter = query(&[("dateRange", "yesterday")]);
        let out = filter.apply(fixtures::audit_logs(), &now());
        assert_eq!(
            ids(&out),
            vec!["log_9005", "log_9006", "log_9007", "log_9008", "log_9009"]
        );
    }

    #[test]
    fn compound_action_maps_to_action_and_resource() {
        let out = query(&[("action", "donation-create")]).apply(fixtures::audit_logs(), &now());
        assert_eq!(ids(&out), vec!["log_9004", "log_9008"]);

        let out = query(&[("action", "user-update")]).apply(fixtures::audit_logs(), &now());
        assert_eq!(ids(&out), vec!["log_9006"]);
    }

    #[test]
    fn verification_matches_details_or_metadata_field() {
        let mut logs = fixtures::audit_logs();
        logs[0].action = "update".into();
        logs[0].details = "Approved".into();
        logs[0].metadata = Some(json!({ "field": "verification", "newValue": "verified" }));

        let out = query(&[("action", "verification")]).apply(logs, &now());
        assert_eq!(ids(&out), vec!["log_9001", "log_9006"]);
    }

    #[test]
    fn simple_action_and_severity_and_user_combine() {
        let out = query(&[("action", "login"), ("severity", "warning")]).apply(fixtures::audit_logs(), &now());
        assert_eq!(ids(&out), vec!["log_9007"]);

        let out = query(&[("userId", "usr_9999"), ("severity", "all")]).apply(fixtures::audit_logs(), &now());
        assert_eq!(ids(&out), vec!["log_9003", "log_9006", "log_9009"]);
    }

    #[test]
    fn filtering_is_idempotent_and_sorted() {
        let filter = query(&[("dateRange", "this-week")]);
        let once = filter.apply(fixtures::audit_logs(), &now());
        let twice = filter.apply(once.clone(), &now());
        assert_eq!(once, twice);
        assert!(once.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let mut logs = fixtures::audit_logs();
        logs[1].timestamp = logs[0].timestamp;
        logs.swap(0, 1);
        let out = AuditFilter::default().apply(logs, &now());
        assert_eq!(&ids(&out)[..2], &["log_9001", "log_9002"]);
    }

    #[test]
    fn rejects_unknown_severity_and_range() {
        let bad = AuditQuery {
            severity: Some("urgent".into()),
            ..Default::default()
        };
        assert!(AuditFilter::try_from(&bad).is_err());
        let bad = AuditQuery {
            date_range: Some("last-decade".into()),
            ..Default::default()
        };
        assert!(AuditFilter::try_from(&bad).is_err());
    }

    #[test]
    fn counts_warnings_and_criticals() {
        assert_eq!(suspicious_count(&fixtures::audit_logs()), 4);
    }
}
