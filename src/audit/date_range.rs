//! Calendar-aware resolution of the symbolic date ranges used by the admin
//! filters into explicit half-open time windows.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// `[start, end)`; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub const UNBOUNDED: TimeWindow = TimeWindow { start: None, end: None };

    pub fn since(start: DateTime<Utc>) -> Self {
        TimeWindow { start: Some(start), end: None }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeWindow { start: Some(start), end: Some(end) }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }
}

/// Date ranges offered by the audit log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown date range: {0:?}")]
pub struct UnknownRange(pub String);

impl FromStr for DateRange {
    type Err = UnknownRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(DateRange::All),
            "today" => Ok(DateRange::Today),
            "yesterday" => Ok(DateRange::Yesterday),
            "this-week" | "this_week" | "week" => Ok(DateRange::ThisWeek),
            "this-month" | "this_month" | "month" => Ok(DateRange::ThisMonth),
            other => Err(UnknownRange(other.to_string())),
        }
    }
}

impl DateRange {
    /// Resolves the range against `now`, using the calendar of `now`'s zone.
    /// Weeks start on Sunday.
    pub fn resolve<Tz: TimeZone>(self, now: &DateTime<Tz>) -> TimeWindow {
        let tz = now.timezone();
        let today = now.date_naive();
        match self {
            DateRange::All => TimeWindow::UNBOUNDED,
            DateRange::Today => TimeWindow::since(local_midnight(&tz, today)),
            DateRange::Yesterday => {
                let yesterday = today - Duration::days(1);
                TimeWindow::between(local_midnight(&tz, yesterday), local_midnight(&tz, today))
            }
            DateRange::ThisWeek => {
                let back = today.weekday().num_days_from_sunday() as i64;
                TimeWindow::since(local_midnight(&tz, today - Duration::days(back)))
            }
            DateRange::ThisMonth => {
                let first = today - Duration::days(today.day0() as i64);
                TimeWindow::since(local_midnight(&tz, first))
            }
        }
    }
}

/// Rolling windows used by the donation list and the analytics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Today,
    Week,
    Month,
    Year,
}

impl Timeframe {
    /// Unknown values fall back to `today`.
    pub fn parse_or_default(input: Option<&str>) -> Self {
        match input.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("week") => Timeframe::Week,
            Some("month") => Timeframe::Month,
            Some("year") => Timeframe::Year,
            _ => Timeframe::Today,
        }
    }

    /// `today` starts at local midnight; the others are rolling windows ending now.
    pub fn cutoff<Tz: TimeZone>(self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let now_utc = now.with_timezone(&Utc);
        match self {
            Timeframe::Today => local_midnight(&now.timezone(), now.date_naive()),
            Timeframe::Week => now_utc - Duration::days(7),
            Timeframe::Month => now_utc
                .checked_sub_months(Months::new(1))
                .unwrap_or(now_utc - Duration::days(30)),
            Timeframe::Year => now_utc
                .checked_sub_months(Months::new(12))
                .unwrap_or(now_utc - Duration::days(365)),
        }
    }

    pub fn window<Tz: TimeZone>(self, now: &DateTime<Tz>) -> TimeWindow {
        TimeWindow::since(self.cutoff(now))
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // midnight skipped by a DST jump
        None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[test]
    fn today_starts_at_midnight_utc() {
        let window = DateRange::Today.resolve(&utc("2025-04-19T20:00:00Z"));
        assert_eq!(window.start, Some(utc("2025-04-19T00:00:00Z")));
        assert!(window.end.is_none());
        assert!(window.contains(utc("2025-04-19T15:45:10Z")));
        assert!(!window.contains(utc("2025-04-18T09:22:30Z")));
    }

    #[test]
    fn yesterday_is_bounded_on_both_sides() {
        let window = DateRange::Yesterday.resolve(&utc("2025-04-19T20:00:00Z"));
        assert!(window.contains(utc("2025-04-18T00:00:00Z")));
        assert!(window.contains(utc("2025-04-18T23:59:59Z")));
        assert!(!window.contains(utc("2025-04-19T00:00:00Z")));
        assert!(!window.contains(utc("2025-04-17T23:59:59Z")));
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2025-04-19 is a Saturday
        let window = DateRange::ThisWeek.resolve(&utc("2025-04-19T20:00:00Z"));
        assert_eq!(window.start, Some(utc("2025-04-13T00:00:00Z")));

        let sunday = DateRange::ThisWeek.resolve(&utc("2025-04-13T08:00:00Z"));
        assert_eq!(sunday.start, Some(utc("2025-04-13T00:00:00Z")));
    }

    #[test]
    fn month_starts_on_the_first() {
        let window = DateRange::ThisMonth.resolve(&utc("2025-04-19T20:00:00Z"));
        assert_eq!(window.start, Some(utc("2025-04-01T00:00:00Z")));
    }

    #[test]
    fn calendar_day_follows_the_configured_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        // 20:00Z is already 01:30 on the 20th in +05:30
        let now = utc("2025-04-19T20:00:00Z").with_timezone(&ist);
        let window = DateRange::Today.resolve(&now);
        assert_eq!(window.start, Some(utc("2025-04-19T18:30:00Z")));
        assert!(!window.contains(utc("2025-04-19T15:45:10Z")));
    }

    #[test]
    fn parses_dashboard_spellings() {
        assert_eq!("this-week".parse::<DateRange>().unwrap(), DateRange::ThisWeek);
        assert_eq!("".parse::<DateRange>().unwrap(), DateRange::All);
        assert!("fortnight".parse::<DateRange>().is_err());
    }

    #[test]
    fn rolling_timeframes() {
        let now = utc("2025-04-19T20:00:00Z");
        assert_eq!(Timeframe::Week.cutoff(&now), utc("2025-04-12T20:00:00Z"));
        assert_eq!(Timeframe::Month.cutoff(&now), utc("2025-03-19T20:00:00Z"));
        assert_eq!(Timeframe::Year.cutoff(&now), utc("2024-04-19T20:00:00Z"));
        assert_eq!(Timeframe::parse_or_default(Some("decade")), Timeframe::Today);
    }
}
