//! Aggregates behind the analytics and dashboard widgets. All functions take
//! the records and a local "now"; nothing here touches the store.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::audit::Timeframe;
use crate::db::models::{
    AuditLogEntry, Distribution, DistributionStatus, Donation, DonationStatus, DonorType, Role, Severity, User,
    VerificationStatus,
};

fn percent(part: usize, whole: usize) -> i64 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as i64
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub timeframe: Timeframe,
    pub total_users: usize,
    pub new_users: usize,
    pub active_users: usize,
    pub user_growth: i64,
    pub total_donations: usize,
    pub new_donations: usize,
    pub donation_growth: i64,
    pub completed_deliveries: usize,
    pub total_value: f64,
    pub pending_verifications: usize,
    pub flagged_items: usize,
}

pub fn overview<Tz: TimeZone>(users: &[User], donations: &[Donation], timeframe: Timeframe, now: &DateTime<Tz>) -> Overview {
    let window = timeframe.window(now);
    let new_users = users.iter().filter(|u| window.contains(u.join_date)).count();
    let active_users = users
        .iter()
        .filter(|u| u.last_active.is_some_and(|t| window.contains(t)))
        .count();
    let recent: Vec<&Donation> = donations.iter().filter(|d| window.contains(d.created_at)).collect();
    let completed_deliveries = donations
        .iter()
        .filter(|d| d.status.is_finished() && d.completed_at.is_some_and(|t| window.contains(t)))
        .count();

    Overview {
        timeframe,
        total_users: users.len(),
        new_users,
        active_users,
        user_growth: percent(new_users, users.len()),
        total_donations: donations.len(),
        new_donations: recent.len(),
        donation_growth: percent(recent.len(), donations.len()),
        completed_deliveries,
        total_value: recent.iter().map(|d| d.value).sum(),
        pending_verifications: users
            .iter()
            .filter(|u| u.verification_status == VerificationStatus::Pending)
            .count(),
        flagged_items: donations
            .iter()
            .filter(|d| d.status == DonationStatus::Flagged)
            .count(),
    }
}

#[derive(Debug, Serialize, PartialEq, Default)]
pub struct ByDonorType {
    pub individual: usize,
    pub business: usize,
    pub organization: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Category {
    pub name: String,
    pub count: usize,
    pub value: f64,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
    pub value: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Contributor {
    pub id: String,
    pub name: String,
    pub donations: usize,
    pub value: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonationStats {
    pub timeframe: Timeframe,
    pub total_donations: usize,
    pub total_value: f64,
    pub by_type: ByDonorType,
    pub top_categories: Vec<Category>,
    pub activity: Vec<Bucket>,
    pub top_contributors: Vec<Contributor>,
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A donation counts once per category: its predicted category when known,
/// otherwise each distinct item name.
fn categories_of(donation: &Donation) -> BTreeSet<String> {
    match donation.predicted_category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(category) => BTreeSet::from([capitalize(category)]),
        None if donation.items.is_empty() => BTreeSet::from(["Other".to_string()]),
        None => donation.items.iter().map(|i| capitalize(&i.name)).collect(),
    }
}

pub fn donation_stats<Tz: TimeZone>(donations: &[Donation], timeframe: Timeframe, now: &DateTime<Tz>) -> DonationStats {
    let window = timeframe.window(now);
    let recent: Vec<&Donation> = donations.iter().filter(|d| window.contains(d.created_at)).collect();

    let mut by_type = ByDonorType::default();
    for d in &recent {
        match d.donor_type {
            DonorType::Individual => by_type.individual += 1,
            DonorType::Business => by_type.business += 1,
            DonorType::Organization => by_type.organization += 1,
        }
    }

    let mut categories: HashMap<String, (usize, f64)> = HashMap::new();
    for d in &recent {
        for name in categories_of(d) {
            let slot = categories.entry(name).or_default();
            slot.0 += 1;
            slot.1 += d.value;
        }
    }
    let mut top_categories: Vec<Category> = categories
        .into_iter()
        .map(|(name, (count, value))| Category { name, count, value })
        .collect();
    top_categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top_categories.truncate(5);

    let stamped: Vec<(DateTime<Utc>, f64)> = recent.iter().map(|d| (d.created_at, d.value)).collect();

    DonationStats {
        timeframe,
        total_donations: recent.len(),
        total_value: recent.iter().map(|d| d.value).sum(),
        by_type,
        top_categories,
        activity: activity_buckets(&stamped, timeframe, now),
        top_contributors: top_contributors(&recent, 5),
    }
}

fn top_contributors(donations: &[&Donation], n: usize) -> Vec<Contributor> {
    let mut totals: HashMap<&str, Contributor> = HashMap::new();
    for d in donations {
        let entry = totals.entry(d.donor_id.as_str()).or_insert_with(|| Contributor {
            id: d.donor_id.clone(),
            name: d.donor_name.clone(),
            donations: 0,
            value: 0.0,
        });
        entry.donations += 1;
        entry.value += d.value;
    }
    let mut out: Vec<Contributor> = totals.into_values().collect();
    out.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.id.cmp(&b.id)));
    out.truncate(n);
    out
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Buckets timestamped values for charting: hourly for `today`, by weekday
/// for `week`, by week of the period for `month` and `year`. Every bucket in
/// the period is present, empty ones with zero counts.
pub fn activity_buckets<Tz: TimeZone>(stamped: &[(DateTime<Utc>, f64)], timeframe: Timeframe, now: &DateTime<Tz>) -> Vec<Bucket> {
    let tz = now.timezone();
    let cutoff = timeframe.cutoff(now);
    // The weekly chart covers the six local days before today plus today.
    let first_day = now.date_naive() - Duration::days(6);
    let first_weekday = first_day.weekday().num_days_from_sunday() as usize;

    let labels: Vec<String> = match timeframe {
        Timeframe::Today => (0..24).map(|h| format!("{:02}:00", h)).collect(),
        Timeframe::Week => (0..7).map(|i| WEEKDAYS[(first_weekday + i) % 7].to_string()).collect(),
        Timeframe::Month | Timeframe::Year => {
            let span = now.with_timezone(&Utc) - cutoff;
            let weeks = span.num_days() / 7 + 1;
            (1..=weeks).map(|w| format!("Week {}", w)).collect()
        }
    };
    let mut buckets: Vec<Bucket> = labels
        .into_iter()
        .map(|label| Bucket { label, count: 0, value: 0.0 })
        .collect();

    for (at, value) in stamped {
        if *at < cutoff {
            continue;
        }
        let local = at.with_timezone(&tz);
        let i = match timeframe {
            Timeframe::Today => local.hour() as usize,
            Timeframe::Week => match (local.date_naive() - first_day).num_days() {
                day @ 0..=6 => day as usize,
                _ => continue,
            },
            Timeframe::Month | Timeframe::Year => ((*at - cutoff).num_days() / 7) as usize,
        };
        let i = i.min(buckets.len() - 1);
        buckets[i].count += 1;
        buckets[i].value += value;
    }
    buckets
}

#[derive(Debug, Serialize, PartialEq, Default)]
pub struct ByRole {
    pub donor: usize,
    pub volunteer: usize,
    pub business: usize,
    pub distributor: usize,
    pub admin: usize,
}

#[derive(Debug, Serialize, PartialEq, Default)]
pub struct VerificationCounts {
    pub verified: usize,
    pub pending: usize,
    pub flagged: usize,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub timeframe: Timeframe,
    pub new_users: usize,
    pub active_users: usize,
    pub by_role: ByRole,
    pub verification_status: VerificationCounts,
    pub activity: Vec<Bucket>,
}

pub fn user_stats<Tz: TimeZone>(users: &[User], timeframe: Timeframe, now: &DateTime<Tz>) -> UserStats {
    let window = timeframe.window(now);
    let mut by_role = ByRole::default();
    let mut verification = VerificationCounts::default();
    for u in users {
        match u.role {
            Role::Donor => by_role.donor += 1,
            Role::Volunteer => by_role.volunteer += 1,
            Role::Business => by_role.business += 1,
            Role::Distributor => by_role.distributor += 1,
            Role::Admin => by_role.admin += 1,
        }
        match u.verification_status {
            VerificationStatus::Verified => verification.verified += 1,
            VerificationStatus::Pending => verification.pending += 1,
            VerificationStatus::Flagged => verification.flagged += 1,
        }
    }
    let logins: Vec<(DateTime<Utc>, f64)> = users.iter().filter_map(|u| u.last_active).map(|t| (t, 0.0)).collect();

    UserStats {
        timeframe,
        new_users: users.iter().filter(|u| window.contains(u.join_date)).count(),
        active_users: users
            .iter()
            .filter(|u| u.last_active.is_some_and(|t| window.contains(t)))
            .count(),
        by_role,
        verification_status: verification,
        activity: activity_buckets(&logins, timeframe, now),
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_donated: f64,
    pub active_distributions: usize,
    pub coverage_areas: usize,
    /// Share of donations that reached a recipient, as a percentage.
    pub impact_score: f64,
}

pub fn dashboard_stats(users: &[User], donations: &[Donation], distributions: &[Distribution]) -> DashboardStats {
    let areas: BTreeSet<String> = users
        .iter()
        .filter_map(|u| u.location.as_deref())
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    let delivered = donations.iter().filter(|d| d.status.is_finished()).count();
    let impact_score = if donations.is_empty() {
        0.0
    } else {
        (delivered as f64 / donations.len() as f64 * 1000.0).round() / 10.0
    };

    DashboardStats {
        total_donated: donations.iter().map(|d| d.value).sum(),
        active_distributions: distributions
            .iter()
            .filter(|d| matches!(d.status, DistributionStatus::Planned | DistributionStatus::InProgress))
            .count(),
        coverage_areas: areas.len(),
        impact_score,
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Alert {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub time: String,
}

pub fn dashboard_alerts(
    audit: &[AuditLogEntry],
    users: &[User],
    donations: &[Donation],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let day_ago = now - Duration::hours(24);
    let mut alerts = Vec::new();

    let mut critical: Vec<&AuditLogEntry> = audit
        .iter()
        .filter(|e| e.severity == Severity::Critical && e.timestamp >= day_ago)
        .collect();
    critical.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for entry in critical {
        alerts.push(Alert {
            title: format!("Critical action: {} {}", entry.action, entry.resource),
            description: if entry.details.is_empty() {
                format!("Performed by {}", entry.actor.name)
            } else {
                entry.details.clone()
            },
            severity: Severity::Critical,
            time: relative_time(entry.timestamp, now),
        });
    }

    let mut joined: Vec<&User> = users.iter().filter(|u| u.join_date >= day_ago).collect();
    joined.sort_by(|a, b| b.join_date.cmp(&a.join_date));
    if let Some(newest) = joined.first() {
        alerts.push(Alert {
            title: format!("New partner: {}", newest.name),
            description: format!("{} account(s) joined in the last 24 hours.", joined.len()),
            severity: Severity::Info,
            time: relative_time(newest.join_date, now),
        });
    }

    let stale = now - Duration::hours(6);
    let delayed = donations
        .iter()
        .filter(|d| d.status == DonationStatus::InTransit && d.created_at < stale)
        .count();
    if delayed > 0 {
        alerts.push(Alert {
            title: "Delayed delivery alert".to_string(),
            description: format!("{} deliveries have been in transit for over 6 hours.", delayed),
            severity: Severity::Warning,
            time: "Today".to_string(),
        });
    }
    alerts
}

/// Humanised distance between `at` and `now`, e.g. "3 hours ago".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now - at;
    let (future, delta) = if delta < Duration::zero() { (true, -delta) } else { (false, delta) };
    let secs = delta.num_seconds();
    if secs < 45 {
        return "just now".to_string();
    }
    let (n, unit) = match secs {
        s if s < 3_600 => ((s + 30) / 60, "minute"),
        s if s < 86_400 => ((s + 1_800) / 3_600, "hour"),
        s if s < 30 * 86_400 => ((s + 43_200) / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let n = n.max(1);
    let plural = if n == 1 { "" } else { "s" };
    if future {
        format!("in {} {}{}", n, unit, plural)
    } else {
        format!("{} {}{} ago", n, unit, plural)
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentDonation {
    pub id: String,
    pub donor: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: DonationStatus,
    pub timestamp: String,
}

pub fn recent_donations(donations: &[Donation], now: DateTime<Utc>) -> Vec<RecentDonation> {
    let mut sorted: Vec<&Donation> = donations.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    sorted
        .into_iter()
        .take(5)
        .map(|d| RecentDonation {
            id: d.id.clone(),
            donor: d.donor_name.clone(),
            value: d.value,
            kind: match d.items.as_slice() {
                [only] => only.name.clone(),
                _ => d.predicted_category.clone().unwrap_or_else(|| "Mixed".to_string()),
            },
            status: d.status,
            timestamp: relative_time(d.created_at, now),
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDistribution {
    pub id: String,
    pub location: String,
    pub time: DateTime<Utc>,
    pub people_served: String,
    pub status: &'static str,
}

fn schedule_label(dist: &Distribution) -> &'static str {
    match (dist.status, dist.volunteers_needed) {
        (DistributionStatus::Planned, Some(needed)) if dist.current_volunteers < needed => "Needs volunteers",
        _ => "On schedule",
    }
}

pub fn upcoming_distributions(distributions: &[Distribution]) -> Vec<UpcomingDistribution> {
    let mut open: Vec<&Distribution> = distributions
        .iter()
        .filter(|d| matches!(d.status, DistributionStatus::Planned | DistributionStatus::InProgress))
        .collect();
    open.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    open.into_iter()
        .take(5)
        .map(|d| UpcomingDistribution {
            id: d.id.clone(),
            location: d.location.clone(),
            time: d.date,
            people_served: format!(
                "~{} people",
                d.estimated_people_to_serve.or(d.people_served).unwrap_or(0)
            ),
            status: schedule_label(d),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::FixedOffset;

    fn now() -> DateTime<Utc> {
        "2025-04-19T20:00:00Z".parse().unwrap()
    }

    #[test]
    fn overview_for_today() {
        let o = overview(&fixtures::users(), &fixtures::donations(), Timeframe::Today, &now());
        assert_eq!(o.total_users, 6);
        assert_eq!(o.new_users, 0);
        // usr_1002, usr_1004 and usr_9999 were active on the 19th
        assert_eq!(o.active_users, 3);
        assert_eq!(o.new_donations, 1);
        assert_eq!(o.donation_growth, 20);
        assert_eq!(o.total_value, 450.0);
        assert_eq!(o.pending_verifications, 1);
        assert_eq!(o.flagged_items, 1);
    }

    #[test]
    fn donation_stats_for_week() {
        let stats = donation_stats(&fixtures::donations(), Timeframe::Week, &now());
        assert_eq!(stats.total_donations, 4);
        assert_eq!(stats.total_value, 1105.0);
        assert_eq!(stats.by_type, ByDonorType { individual: 2, business: 2, organization: 0 });
        assert_eq!(stats.activity.len(), 7);
        // chart runs Sunday 13 April through today
        assert_eq!(stats.activity[0].label, "Sun");
        assert_eq!(stats.activity[6].label, "Sat");
        assert_eq!(stats.activity.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(stats.top_contributors[0].id, "usr_1003");
        assert_eq!(stats.top_contributors[0].value, 970.0);
        assert!(stats.top_categories.len() <= 5);
    }

    #[test]
    fn hourly_buckets_use_local_clock() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let local_now = now().with_timezone(&ist);
        // 19:45Z is 01:15 on the 20th in IST; 08:45Z falls on the previous local day
        let stamped = vec![
            ("2025-04-19T19:45:00Z".parse().unwrap(), 10.0),
            ("2025-04-19T08:45:10Z".parse().unwrap(), 5.0),
        ];
        let buckets = activity_buckets(&stamped, Timeframe::Today, &local_now);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[1].label, "01:00");
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 1);
    }

    #[test]
    fn week_buckets_do_not_fold_last_saturday_into_today() {
        let stamped = vec![
            ("2025-04-12T22:00:00Z".parse().unwrap(), 1.0),
            ("2025-04-19T10:00:00Z".parse().unwrap(), 2.0),
            ("2025-04-13T00:30:00Z".parse().unwrap(), 4.0),
        ];
        let buckets = activity_buckets(&stamped, Timeframe::Week, &now());
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].value, 4.0);
        assert_eq!(buckets[6].label, "Sat");
        assert_eq!(buckets[6].value, 2.0);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn month_buckets_count_weeks_from_cutoff() {
        let stamped = vec![
            ("2025-03-20T10:00:00Z".parse().unwrap(), 1.0),
            ("2025-04-19T10:00:00Z".parse().unwrap(), 2.0),
            ("2025-01-01T10:00:00Z".parse().unwrap(), 4.0),
        ];
        let buckets = activity_buckets(&stamped, Timeframe::Month, &now());
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[4].value, 2.0);
    }

    #[test]
    fn user_stats_count_roles_and_verification() {
        let stats = user_stats(&fixtures::users(), Timeframe::Year, &now());
        assert_eq!(stats.by_role.donor, 2);
        assert_eq!(stats.by_role.admin, 1);
        assert_eq!(stats.verification_status, VerificationCounts { verified: 4, pending: 1, flagged: 1 });
        assert_eq!(stats.new_users, 6);
    }

    #[test]
    fn dashboard_stats_score_finished_donations() {
        let stats = dashboard_stats(&fixtures::users(), &fixtures::donations(), &fixtures::distributions());
        assert_eq!(stats.total_donated, 1265.0);
        assert_eq!(stats.active_distributions, 2);
        assert_eq!(stats.coverage_areas, 5);
        assert_eq!(stats.impact_score, 40.0);
    }

    #[test]
    fn alerts_cover_critical_entries_and_stale_transit() {
        let alerts = dashboard_alerts(&fixtures::audit_logs(), &fixtures::users(), &fixtures::donations(), now());
        assert!(alerts.iter().any(|a| a.severity == Severity::Critical));
        assert!(alerts.iter().any(|a| a.title == "Delayed delivery alert"));
        assert!(!alerts.iter().any(|a| a.title.starts_with("New partner")));
    }

    #[test]
    fn relative_time_phrases() {
        let now = now();
        assert_eq!(relative_time(now - Duration::seconds(10), now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(relative_time(now - Duration::days(4), now), "4 days ago");
        assert_eq!(relative_time(now + Duration::hours(2), now), "in 2 hours");
    }

    #[test]
    fn recent_and_upcoming_widgets() {
        let recent = recent_donations(&fixtures::donations(), now());
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].id, "don_5002");
        assert_eq!(recent[0].kind, "Mixed");
        assert_eq!(recent[0].timestamp, "11 hours ago");

        let upcoming = upcoming_distributions(&fixtures::distributions());
        let ids: Vec<&str> = upcoming.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dist_7003", "dist_7002"]);
        assert_eq!(upcoming[0].status, "On schedule");
        assert_eq!(upcoming[1].status, "Needs volunteers");
        assert_eq!(upcoming[1].people_served, "~150 people");
    }
}
