//! Sample records matching the dashboard's development data set. Used to seed
//! an empty store (`FOODLOOP_SEED=true` or `POST /api/admin/seed`).

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use serde_json::json;

use super::models::*;
use super::DbPool;

fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn item(name: &str, quantity: i64) -> DonationItem {
    DonationItem {
        name: name.to_string(),
        quantity,
        ..Default::default()
    }
}

#[allow(clippy::too_many_arguments)]
fn user(
    id: &str,
    name: &str,
    email: &str,
    role: Role,
    status: VerificationStatus,
    location: &str,
    coords: (f64, f64),
    join_date: &str,
    last_active: &str,
    donations: (i64, f64),
) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        verification_status: status,
        flag_reason: None,
        verification_notes: None,
        verified_by: None,
        verified_at: None,
        location: Some(location.to_string()),
        latitude: Some(coords.0),
        longitude: Some(coords.1),
        join_date: ts(join_date),
        last_active: Some(ts(last_active)),
        profile_complete: true,
        donations_count: donations.0,
        total_donated: donations.1,
    }
}

pub fn users() -> Vec<User> {
    let mut list = vec![
        user("usr_1001", "Sarah Johnson", "sarah.j@example.com", Role::Donor, VerificationStatus::Verified,
            "Chicago, IL", (41.8781, -87.6298), "2024-10-12T14:22:10Z", "2025-04-18T09:12:45Z", (12, 1240.0)),
        user("usr_1002", "Michael Chen", "mchen@foodhelp.org", Role::Volunteer, VerificationStatus::Pending,
            "Seattle, WA", (47.6062, -122.3321), "2025-01-27T08:10:22Z", "2025-04-19T15:33:12Z", (0, 0.0)),
        user("usr_1003", "Community Foods Inc.", "donations@communityfoods.com", Role::Business, VerificationStatus::Verified,
            "Boston, MA", (42.3601, -71.0589), "2024-08-05T11:45:30Z", "2025-04-17T11:20:05Z", (32, 8750.0)),
        user("usr_1004", "Food Distribution Center", "contact@fooddist.org", Role::Distributor, VerificationStatus::Verified,
            "Austin, TX", (30.2672, -97.7431), "2024-07-18T09:30:45Z", "2025-04-19T08:45:30Z", (0, 0.0)),
        user("usr_1005", "John Smith", "john.smith@example.com", Role::Donor, VerificationStatus::Flagged,
            "New York, NY", (40.7128, -74.0060), "2025-02-01T16:20:00Z", "2025-04-10T14:22:35Z", (2, 75.0)),
        user("usr_9999", "Admin User", "admin@foodplatform.org", Role::Admin, VerificationStatus::Verified,
            "Austin, TX", (30.2672, -97.7431), "2024-06-01T09:00:00Z", "2025-04-19T12:10:05Z", (0, 0.0)),
    ];
    list[1].profile_complete = false;
    list[4].flag_reason = Some("Suspicious donation patterns".to_string());
    list
}

pub fn donations() -> Vec<Donation> {
    let mut rice = item("Rice", 10);
    rice.weight = Some("10kg".to_string());
    let mut produce = item("Fresh Produce", 150);
    produce.weight = Some("75kg".to_string());
    produce.expiry_date = Some("2025-04-22".to_string());
    let mut pasta = item("Pasta", 200);
    pasta.weight = Some("100kg".to_string());

    let donation = |id: &str, donor: (&str, &str, DonorType), items: Vec<DonationItem>, status: DonationStatus,
                    created: &str, pickup: &str, completed: Option<&str>, value: f64, notes: &str| Donation {
        id: id.to_string(),
        donor_id: donor.0.to_string(),
        donor_name: donor.1.to_string(),
        donor_type: donor.2,
        items,
        status,
        created_at: ts(created),
        scheduled_pickup: Some(ts(pickup)),
        completed_at: completed.map(ts),
        value,
        notes: Some(notes.to_string()),
        flag_reason: None,
        predicted_category: None,
    };

    let sarah = ("usr_1001", "Sarah Johnson", DonorType::Individual);
    let community = ("usr_1003", "Community Foods Inc.", DonorType::Business);
    let john = ("usr_1005", "John Smith", DonorType::Individual);

    let mut list = vec![
        donation("don_5001", sarah, vec![item("Canned Vegetables", 24), rice], DonationStatus::Delivered,
            "2025-04-15T10:20:30Z", "2025-04-16T13:00:00Z", Some("2025-04-16T13:12:45Z"), 120.0, "Regular monthly donation"),
        donation("don_5002", community, vec![produce, item("Bread", 50), item("Milk", 30)], DonationStatus::Pending,
            "2025-04-19T08:45:10Z", "2025-04-21T09:00:00Z", None, 450.0, "Weekend surplus"),
        donation("don_5003", john, vec![item("Canned Soup", 5)], DonationStatus::Flagged,
            "2025-04-18T14:10:20Z", "2025-04-20T11:00:00Z", None, 15.0, "First time donor"),
        donation("don_5004", community, vec![pasta, item("Canned Tomatoes", 150), item("Cooking Oil", 40)], DonationStatus::InTransit,
            "2025-04-17T09:30:45Z", "2025-04-19T15:00:00Z", None, 520.0, "Monthly donation to local shelter"),
        donation("don_5005", sarah, vec![item("Baby Food", 30), item("Diapers", 5)], DonationStatus::Completed,
            "2025-04-10T13:40:22Z", "2025-04-11T10:00:00Z", Some("2025-04-11T10:15:30Z"), 160.0, "Special donation for families with infants"),
    ];
    list[2].flag_reason = Some("Items past expiration date".to_string());
    list
}

pub fn distributions() -> Vec<Distribution> {
    let base = |id: &str, location: &str, status: DistributionStatus, date: &str| Distribution {
        id: id.to_string(),
        distributor_id: "usr_1004".to_string(),
        distributor_name: "Food Distribution Center".to_string(),
        location: location.to_string(),
        status,
        date: ts(date),
        end_time: None,
        people_served: None,
        estimated_people_to_serve: None,
        items_distributed: None,
        donation_ids: vec![],
        volunteer_ids: vec![],
        volunteers_needed: None,
        current_volunteers: 0,
        notes: None,
    };

    let mut completed = base("dist_7001", "123 Main St, Austin, TX", DistributionStatus::Completed, "2025-04-15T10:00:00Z");
    completed.end_time = Some(ts("2025-04-15T14:00:00Z"));
    completed.people_served = Some(120);
    completed.items_distributed = Some(450);
    completed.donation_ids = vec!["don_5001".into(), "don_5005".into()];
    completed.current_volunteers = 8;
    completed.notes = Some("Weekly distribution event".into());

    let mut planned = base("dist_7002", "456 Oak Ave, Austin, TX", DistributionStatus::Planned, "2025-04-22T09:00:00Z");
    planned.estimated_people_to_serve = Some(150);
    planned.donation_ids = vec!["don_5002".into(), "don_5004".into()];
    planned.volunteers_needed = Some(10);
    planned.current_volunteers = 6;
    planned.notes = Some("Monthly community outreach".into());

    let mut running = base("dist_7003", "789 Pine St, Austin, TX", DistributionStatus::InProgress, "2025-04-20T11:00:00Z");
    running.estimated_people_to_serve = Some(80);
    running.people_served = Some(45);
    running.donation_ids = vec!["don_5004".into()];
    running.current_volunteers = 5;
    running.notes = Some("Small distribution event".into());

    vec![completed, planned, running]
}

pub fn audit_logs() -> Vec<AuditLogEntry> {
    let actor = |id: &str, name: &str, email: &str| AuditActor {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
    };
    let admin = actor("usr_9999", "Admin User", "admin@foodplatform.org");
    let system = actor("sys_001", "System", "system@foodplatform.org");
    let sarah = actor("usr_1001", "Sarah Johnson", "sarah.j@example.com");
    let john = actor("usr_1005", "John Smith", "john.smith@example.com");
    let community = actor("usr_1003", "Community Foods Inc.", "donations@communityfoods.com");
    let center = actor("usr_1004", "Food Distribution Center", "contact@fooddist.org");

    let entry = |id: &str, at: &str, who: &AuditActor, action: &str, resource: AuditResource,
                 resource_id: Option<&str>, severity: Severity, details: &str| AuditLogEntry {
        id: id.to_string(),
        timestamp: ts(at),
        actor: who.clone(),
        action: action.to_string(),
        resource,
        resource_id: resource_id.map(str::to_string),
        severity,
        details: details.to_string(),
        metadata: None,
        ip: None,
        user_agent: None,
    };

    let mut logs = vec![
        entry("log_9001", "2025-04-19T15:45:10Z", &center, "create", AuditResource::Distribution, Some("dist_7002"),
            Severity::Info, "Created new distribution event scheduled for April 22"),
        entry("log_9002", "2025-04-19T14:22:30Z", &sarah, "login", AuditResource::Account, Some("usr_1001"),
            Severity::Info, "User logged in from new device"),
        entry("log_9003", "2025-04-19T12:10:05Z", &admin, "flag", AuditResource::User, Some("usr_1005"),
            Severity::Warning, "User flagged for suspicious donation patterns"),
        entry("log_9004", "2025-04-19T10:05:22Z", &community, "create", AuditResource::Donation, Some("don_5002"),
            Severity::Info, "Created new donation with pickup scheduled for April 21"),
        entry("log_9005", "2025-04-18T23:15:40Z", &system, "delete", AuditResource::Distribution, Some("dist_7004"),
            Severity::Critical, "Distribution event deleted after being scheduled"),
        entry("log_9006", "2025-04-18T18:30:15Z", &admin, "update", AuditResource::User, Some("usr_1002"),
            Severity::Info, "Updated user verification status to pending"),
        entry("log_9007", "2025-04-18T16:40:12Z", &john, "login", AuditResource::Account, Some("usr_1005"),
            Severity::Warning, "Failed login attempt (5th consecutive failure)"),
        entry("log_9008", "2025-04-18T14:10:20Z", &john, "create", AuditResource::Donation, Some("don_5003"),
            Severity::Warning, "Donation automatically flagged for expired items"),
        entry("log_9009", "2025-04-18T09:22:30Z", &admin, "export", AuditResource::Users, None,
            Severity::Info, "Exported user data for reporting purposes"),
        entry("log_9010", "2025-04-17T20:05:15Z", &system, "update", AuditResource::Donation, Some("don_5004"),
            Severity::Info, "Automatically updated donation status to in_transit based on driver app"),
    ];
    logs[2].metadata = Some(json!({
        "reason": "Multiple expired items donated",
        "actionTaken": "Account temporarily restricted"
    }));
    logs[4].metadata = Some(json!({
        "reason": "Suspicious deletion outside of business hours",
        "geolocation": "Unknown location"
    }));
    logs[4].ip = Some("203.0.113.195".to_string());
    logs[6].ip = Some("203.0.113.42".to_string());
    logs
}

/// Loads the sample set into an empty store. Returns `false` without touching
/// anything when any seeded table already has rows.
pub async fn seed(pool: &DbPool) -> anyhow::Result<bool> {
    let mut conn = pool.get()?;
    // IMMEDIATE takes the write lock up front so two seeds cannot both see
    // an empty store.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing: i64 = tx.query_row(
        "SELECT (SELECT COUNT(*) FROM users) + (SELECT COUNT(*) FROM donations) \
         + (SELECT COUNT(*) FROM distributions) + (SELECT COUNT(*) FROM audit_logs)",
        [],
        |row| row.get(0),
    )?;
    if existing > 0 {
        tx.rollback()?;
        return Ok(false);
    }
    for u in users() {
        super::users::write_user(&tx, &u)?;
    }
    for d in donations() {
        super::donations::write_donation(&tx, &d)?;
    }
    for dist in distributions() {
        super::distributions::write_distribution(&tx, &dist)?;
    }
    for entry in audit_logs() {
        super::audit::insert_audit(&tx, &entry)?;
    }
    tx.commit()?;
    tracing::info!("Seeded store with sample dashboard data");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn seed_skips_store_with_leftover_rows() {
        let pool = db::init_pool(db::MEMORY_URL).await.unwrap();
        assert!(seed(&pool).await.unwrap());
        pool.get().unwrap().execute("DELETE FROM users", []).unwrap();

        // donations and audit entries are still there
        assert!(!seed(&pool).await.unwrap());
        assert_eq!(db::count_users(&pool).await.unwrap(), 0);
        assert_eq!(db::list_donations(&pool).await.unwrap().len(), donations().len());
    }

    #[tokio::test]
    async fn failed_seed_leaves_store_empty() {
        let pool = db::init_pool(db::MEMORY_URL).await.unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_seed BEFORE INSERT ON audit_logs \
                 BEGIN SELECT RAISE(ABORT, 'disk'); END;",
            )
            .unwrap();
        assert!(seed(&pool).await.is_err());
        assert_eq!(db::count_users(&pool).await.unwrap(), 0);
        assert!(db::list_donations(&pool).await.unwrap().is_empty());

        pool.get().unwrap().execute_batch("DROP TRIGGER block_seed;").unwrap();
        assert!(seed(&pool).await.unwrap());
        assert_eq!(db::count_users(&pool).await.unwrap(), users().len() as i64);
    }
}
