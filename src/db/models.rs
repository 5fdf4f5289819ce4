use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// Enums stored as TEXT columns and exchanged as lowercase JSON strings.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(Role {
    Donor => "donor",
    Volunteer => "volunteer",
    Business => "business",
    Distributor => "distributor",
    Admin => "admin",
});

text_enum!(VerificationStatus {
    Verified => "verified",
    Pending => "pending",
    Flagged => "flagged",
});

text_enum!(DonorType {
    Individual => "individual",
    Business => "business",
    Organization => "organization",
});

text_enum!(
    /// Lifecycle of a donation: pending → in_transit → delivered/completed,
    /// or cancelled. `flagged` parks a donation for manual review.
    DonationStatus {
        Pending => "pending",
        InTransit => "in_transit",
        Delivered => "delivered",
        Completed => "completed",
        Cancelled => "cancelled",
        Flagged => "flagged",
    }
);

text_enum!(Severity {
    Info => "info",
    Warning => "warning",
    Critical => "critical",
});

text_enum!(AuditResource {
    User => "user",
    Users => "users",
    Donation => "donation",
    Distribution => "distribution",
    Account => "account",
    ReliefCamp => "relief_camp",
    Reminder => "reminder",
});

text_enum!(DistributionStatus {
    Planned => "planned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(EventType {
    Flood => "flood",
    Heatwave => "heatwave",
    Earthquake => "earthquake",
});

text_enum!(Frequency {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

text_enum!(Storage {
    Refrigerated => "refrigerated",
    RoomTemp => "room temp",
    Frozen => "frozen",
});

impl DonationStatus {
    /// Accepts the hyphenated spelling the dashboard uses (`in-transit`).
    pub fn parse_lenient(input: &str) -> Result<Self, UnknownVariant> {
        input.trim().to_lowercase().replace('-', "_").parse()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, DonationStatus::Delivered | DonationStatus::Completed)
    }
}

impl DistributionStatus {
    pub fn parse_lenient(input: &str) -> Result<Self, UnknownVariant> {
        input.trim().to_lowercase().replace('-', "_").parse()
    }
}

impl Frequency {
    pub fn interval_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verification_status: VerificationStatus,
    pub flag_reason: Option<String>,
    pub verification_notes: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub join_date: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
    pub profile_complete: bool,
    pub donations_count: i64,
    pub total_donated: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DonationItem {
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub donor_id: String,
    pub donor_name: String,
    pub donor_type: DonorType,
    pub items: Vec<DonationItem>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_pickup: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub value: f64,
    pub notes: Option<String>,
    pub flag_reason: Option<String>,
    pub predicted_category: Option<String>,
}

impl Donation {
    /// Moves the donation to `status`. Entering `flagged` records a reason,
    /// leaving it clears the reason, and finishing stamps `completed_at`.
    pub fn transition(&mut self, status: DonationStatus, notes: Option<&str>, now: DateTime<Utc>) {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        if status == DonationStatus::Flagged {
            if self.status != DonationStatus::Flagged || self.flag_reason.is_none() {
                self.flag_reason = Some(notes.unwrap_or("Flagged by admin").to_string());
            }
        } else {
            self.flag_reason = None;
        }
        if status.is_finished() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        if let Some(n) = notes {
            self.notes = Some(n.to_string());
        }
        self.status = status;
    }
}

impl Distribution {
    /// Appends ids not already allocated; returns how many were new.
    pub fn allocate_donations(&mut self, ids: &[String]) -> usize {
        append_unique(&mut self.donation_ids, ids)
    }

    pub fn assign_volunteers(&mut self, ids: &[String]) -> usize {
        let added = append_unique(&mut self.volunteer_ids, ids);
        self.current_volunteers = self.volunteer_ids.len() as i64;
        added
    }
}

fn append_unique(target: &mut Vec<String>, ids: &[String]) -> usize {
    let mut added = 0;
    for id in ids {
        let id = id.trim();
        if id.is_empty() || target.iter().any(|existing| existing == id) {
            continue;
        }
        target.push(id.to_string());
        added += 1;
    }
    added
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditActor {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "user")]
    pub actor: AuditActor,
    pub action: String,
    pub resource: AuditResource,
    pub resource_id: Option<String>,
    pub severity: Severity,
    pub details: String,
    pub metadata: Option<Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: String,
    pub distributor_id: String,
    pub distributor_name: String,
    pub location: String,
    pub status: DistributionStatus,
    pub date: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub people_served: Option<i64>,
    pub estimated_people_to_serve: Option<i64>,
    pub items_distributed: Option<i64>,
    pub donation_ids: Vec<String>,
    pub volunteer_ids: Vec<String>,
    pub volunteers_needed: Option<i64>,
    pub current_volunteers: i64,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReliefCamp {
    pub id: String,
    pub event_type: EventType,
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: DateTime<Utc>,
    pub resources_needed: Vec<String>,
    pub created_by: String,
    pub demand_prediction: f64,
    pub volunteers_alerted: bool,
    pub ngo_alerted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurringReminder {
    pub id: String,
    pub donor_id: String,
    pub food_type: String,
    pub weight: String,
    pub frequency: Frequency,
    pub storage: Storage,
    pub start_date: DateTime<Utc>,
    pub next_scheduled: DateTime<Utc>,
    pub predicted_category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_status_accepts_hyphenated_spelling() {
        assert_eq!(DonationStatus::parse_lenient("in-transit").unwrap(), DonationStatus::InTransit);
        assert_eq!(DonationStatus::parse_lenient(" Completed ").unwrap(), DonationStatus::Completed);
        assert!(DonationStatus::parse_lenient("lost").is_err());
    }

    #[test]
    fn enums_serialize_as_their_column_text() {
        assert_eq!(serde_json::to_string(&Storage::RoomTemp).unwrap(), "\"room temp\"");
        assert_eq!(serde_json::to_string(&DonationStatus::InTransit).unwrap(), "\"in_transit\"");
        for severity in Severity::ALL {
            assert_eq!(severity.as_str().parse::<Severity>().unwrap(), *severity);
        }
    }

    fn donation(status: DonationStatus) -> Donation {
        Donation {
            id: "don_1".into(),
            donor_id: "usr_1".into(),
            donor_name: "Sarah".into(),
            donor_type: DonorType::Individual,
            items: vec![],
            status,
            created_at: "2025-04-15T10:20:30Z".parse().unwrap(),
            scheduled_pickup: None,
            completed_at: None,
            value: 10.0,
            notes: None,
            flag_reason: None,
            predicted_category: None,
        }
    }

    #[test]
    fn flagging_records_reason_and_unflagging_clears_it() {
        let now: DateTime<Utc> = "2025-04-20T10:00:00Z".parse().unwrap();
        let mut d = donation(DonationStatus::Pending);
        d.transition(DonationStatus::Flagged, None, now);
        assert_eq!(d.flag_reason.as_deref(), Some("Flagged by admin"));

        d.transition(DonationStatus::InTransit, Some("cleared"), now);
        assert_eq!(d.status, DonationStatus::InTransit);
        assert!(d.flag_reason.is_none());
        assert_eq!(d.notes.as_deref(), Some("cleared"));
        assert!(d.completed_at.is_none());

        d.transition(DonationStatus::Delivered, None, now);
        assert_eq!(d.completed_at, Some(now));
    }

    #[test]
    fn volunteer_assignment_skips_duplicates() {
        let mut dist = Distribution {
            id: "dist_1".into(),
            distributor_id: "usr_4".into(),
            distributor_name: "Center".into(),
            location: "Austin".into(),
            status: DistributionStatus::Planned,
            date: "2025-04-22T09:00:00Z".parse().unwrap(),
            end_time: None,
            people_served: None,
            estimated_people_to_serve: Some(150),
            items_distributed: None,
            donation_ids: vec!["don_1".into()],
            volunteer_ids: vec!["usr_2".into()],
            volunteers_needed: Some(10),
            current_volunteers: 1,
            notes: None,
        };
        let added = dist.assign_volunteers(&["usr_2".into(), "usr_7".into(), " ".into()]);
        assert_eq!(added, 1);
        assert_eq!(dist.current_volunteers, 2);
        assert_eq!(dist.allocate_donations(&["don_1".into(), "don_2".into()]), 1);
    }

    #[test]
    fn audit_entry_exposes_actor_as_user() {
        let entry = AuditLogEntry {
            id: "log_1".into(),
            timestamp: "2025-04-19T15:45:10Z".parse().unwrap(),
            actor: AuditActor {
                id: "usr_1".into(),
                name: "Sarah".into(),
                email: "s@example.com".into(),
            },
            action: "login".into(),
            resource: AuditResource::Account,
            resource_id: None,
            severity: Severity::Info,
            details: String::new(),
            metadata: None,
            ip: None,
            user_agent: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["user"]["id"], "usr_1");
        assert_eq!(json["resourceId"], Value::Null);
    }
}
