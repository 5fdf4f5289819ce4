//! Query-string filters for the user and donation listings.

use chrono::{DateTime, TimeZone};
use serde::Deserialize;

use crate::audit::{TimeWindow, Timeframe};
use crate::db::models::{Donation, DonationStatus, DonorType, Role, UnknownVariant, User, VerificationStatus};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub role: Option<String>,
    pub verification_status: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub verification_status: Option<VerificationStatus>,
    pub search: Option<String>,
}

/// `None`, blank and `all` mean "no constraint".
fn selector(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && s != "all")
}

fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

impl TryFrom<&UserQuery> for UserFilter {
    type Error = UnknownVariant;

    fn try_from(q: &UserQuery) -> Result<Self, Self::Error> {
        Ok(UserFilter {
            role: selector(q.role.as_deref()).map(|r| r.parse()).transpose()?,
            verification_status: selector(q.verification_status.as_deref())
                .map(|s| s.parse())
                .transpose()?,
            search: search_term(q.search.as_deref()),
        })
    }
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| user.role != r) {
            return false;
        }
        if self.verification_status.is_some_and(|s| user.verification_status != s) {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                user.name.to_lowercase().contains(term)
                    || user.email.to_lowercase().contains(term)
                    || user
                        .location
                        .as_deref()
                        .is_some_and(|l| l.to_lowercase().contains(term))
            }
        }
    }

    /// Newest members first.
    pub fn apply(&self, users: Vec<User>) -> Vec<User> {
        let mut out: Vec<User> = users.into_iter().filter(|u| self.matches(u)).collect();
        out.sort_by(|a, b| b.join_date.cmp(&a.join_date).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationQuery {
    pub status: Option<String>,
    pub donor_type: Option<String>,
    pub flagged: Option<bool>,
    pub date_range: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationFilter {
    pub status: Option<DonationStatus>,
    pub donor_type: Option<DonorType>,
    pub flagged_only: bool,
    /// `None` is the whole history.
    pub timeframe: Option<Timeframe>,
    pub search: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DonationFilterError {
    #[error(transparent)]
    Variant(#[from] UnknownVariant),
    #[error("unknown date range: {0:?}")]
    DateRange(String),
}

impl TryFrom<&DonationQuery> for DonationFilter {
    type Error = DonationFilterError;

    fn try_from(q: &DonationQuery) -> Result<Self, Self::Error> {
        let timeframe = match selector(q.date_range.as_deref()).as_deref() {
            None => None,
            Some("today") => Some(Timeframe::Today),
            Some("week") => Some(Timeframe::Week),
            Some("month") => Some(Timeframe::Month),
            Some(other) => return Err(DonationFilterError::DateRange(other.to_string())),
        };
        Ok(DonationFilter {
            status: selector(q.status.as_deref())
                .map(|s| DonationStatus::parse_lenient(&s))
                .transpose()?,
            donor_type: selector(q.donor_type.as_deref()).map(|t| t.parse()).transpose()?,
            flagged_only: q.flagged.unwrap_or(false),
            timeframe,
            search: search_term(q.search.as_deref()),
        })
    }
}

impl DonationFilter {
    fn matches(&self, donation: &Donation, window: &TimeWindow) -> bool {
        if self.status.is_some_and(|s| donation.status != s) {
            return false;
        }
        if self.donor_type.is_some_and(|t| donation.donor_type != t) {
            return false;
        }
        if self.flagged_only && donation.status != DonationStatus::Flagged {
            return false;
        }
        if !window.contains(donation.created_at) {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                donation.id.to_lowercase().contains(term)
                    || donation.donor_name.to_lowercase().contains(term)
                    || donation.items.iter().any(|i| i.name.to_lowercase().contains(term))
            }
        }
    }

    /// Narrows `donations` relative to `now` and orders them newest first.
    pub fn apply<Tz: TimeZone>(&self, donations: Vec<Donation>, now: &DateTime<Tz>) -> Vec<Donation> {
        let window = self
            .timeframe
            .map_or(TimeWindow::UNBOUNDED, |tf| tf.window(now));
        let mut out: Vec<Donation> = donations
            .into_iter()
            .filter(|d| self.matches(d, &window))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::Utc;

    fn now() -> DateTime<Utc> {
        "2025-04-19T20:00:00Z".parse().unwrap()
    }

    #[test]
    fn user_search_covers_name_email_and_location() {
        let filter = UserFilter::try_from(&UserQuery {
            search: Some("  AUSTIN ".into()),
            ..Default::default()
        })
        .unwrap();
        let ids: Vec<String> = filter.apply(fixtures::users()).into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["usr_1004", "usr_9999"]);

        let filter = UserFilter::try_from(&UserQuery {
            search: Some("foodhelp".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.apply(fixtures::users())[0].id, "usr_1002");
    }

    #[test]
    fn user_role_and_status_combine() {
        let filter = UserFilter::try_from(&UserQuery {
            role: Some("donor".into()),
            verification_status: Some("flagged".into()),
            ..Default::default()
        })
        .unwrap();
        let out = filter.apply(fixtures::users());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "usr_1005");
    }

    #[test]
    fn users_sorted_by_join_date_descending() {
        let out = UserFilter::default().apply(fixtures::users());
        assert!(out.windows(2).all(|w| w[0].join_date >= w[1].join_date));
        assert_eq!(out[0].id, "usr_1005");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let q = UserQuery {
            role: Some("wizard".into()),
            ..Default::default()
        };
        assert!(UserFilter::try_from(&q).is_err());
    }

    #[test]
    fn donation_status_accepts_dashboard_spelling() {
        let filter = DonationFilter::try_from(&DonationQuery {
            status: Some("in-transit".into()),
            ..Default::default()
        })
        .unwrap();
        let out = filter.apply(fixtures::donations(), &now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "don_5004");
    }

    #[test]
    fn donation_week_window_is_rolling() {
        let filter = DonationFilter::try_from(&DonationQuery {
            date_range: Some("week".into()),
            ..Default::default()
        })
        .unwrap();
        let ids: Vec<String> = filter
            .apply(fixtures::donations(), &now())
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["don_5002", "don_5003", "don_5004", "don_5001"]);
    }

    #[test]
    fn flagged_and_search_narrow_further() {
        let filter = DonationFilter::try_from(&DonationQuery {
            flagged: Some(true),
            ..Default::default()
        })
        .unwrap();
        let out = filter.apply(fixtures::donations(), &now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "don_5003");

        let filter = DonationFilter::try_from(&DonationQuery {
            search: Some("pasta".into()),
            donor_type: Some("business".into()),
            ..Default::default()
        })
        .unwrap();
        let out = filter.apply(fixtures::donations(), &now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "don_5004");
    }

    #[test]
    fn unknown_donation_range_is_rejected() {
        let q = DonationQuery {
            date_range: Some("fortnight".into()),
            ..Default::default()
        };
        assert!(DonationFilter::try_from(&q).is_err());
    }
}
