//! Recurring donation reminders: scheduling arithmetic and the periodic job
//! that turns due reminders into pending donations.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::routes::{ANALYTICS, DASHBOARD, DONATIONS};

use crate::db::{
    self,
    models::{Donation, DonationItem, DonationStatus, DonorType, Frequency, RecurringReminder, Role},
    DbPool,
};

/// First occurrence strictly after `now`, stepping from `scheduled` by the
/// reminder's interval. A reminder that is not yet due is returned unchanged.
pub fn next_occurrence(scheduled: DateTime<Utc>, frequency: Frequency, now: DateTime<Utc>) -> DateTime<Utc> {
    if scheduled > now {
        return scheduled;
    }
    let step = Duration::days(frequency.interval_days());
    let behind = (now - scheduled).num_seconds() / step.num_seconds() + 1;
    scheduled + step * behind as i32
}

fn donation_from(reminder: &RecurringReminder, donor_name: String, donor_type: DonorType, now: DateTime<Utc>) -> Donation {
    Donation {
        id: format!("don_{}", Uuid::new_v4().simple()),
        donor_id: reminder.donor_id.clone(),
        donor_name,
        donor_type,
        items: vec![DonationItem {
            name: reminder.food_type.clone(),
            quantity: 1,
            weight: Some(reminder.weight.clone()),
            ..Default::default()
        }],
        status: DonationStatus::Pending,
        created_at: now,
        scheduled_pickup: Some(reminder.next_scheduled),
        completed_at: None,
        value: 0.0,
        notes: Some(format!("Recurring {} donation ({})", reminder.frequency, reminder.storage)),
        flag_reason: None,
        predicted_category: reminder.predicted_category.clone(),
    }
}

async fn run_one(pool: &DbPool, reminder: &mut RecurringReminder, now: DateTime<Utc>) -> anyhow::Result<Donation> {
    let (donor_name, donor_type) = match db::get_user(pool, &reminder.donor_id).await? {
        Some(user) => {
            let kind = match user.role {
                Role::Business => DonorType::Business,
                Role::Distributor => DonorType::Organization,
                _ => DonorType::Individual,
            };
            (user.name, kind)
        }
        None => (reminder.donor_id.clone(), DonorType::Individual),
    };
    let donation = donation_from(reminder, donor_name, donor_type, now);
    reminder.next_scheduled = next_occurrence(reminder.next_scheduled, reminder.frequency, now);
    reminder.updated_at = now;
    db::record_recurring_run(pool, &donation, reminder).await?;
    Ok(donation)
}

/// Creates one pending donation per due reminder and moves each reminder to
/// its next occurrence. A reminder that fails is logged and left due for the
/// next run. Returns how many donations were created.
pub async fn run_due(pool: &DbPool, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let due = db::list_due_reminders(pool, now).await?;
    let mut created = 0;
    for mut reminder in due {
        match run_one(pool, &mut reminder, now).await {
            Ok(donation) => {
                tracing::info!(
                    "Recurring reminder {} created donation {}; next run {}",
                    reminder.id,
                    donation.id,
                    reminder.next_scheduled
                );
                created += 1;
            }
            Err(e) => tracing::error!("Recurring reminder {} failed: {:#}", reminder.id, e),
        }
    }
    Ok(created)
}

/// Runs [`run_due`] every `interval` until the task is dropped.
pub async fn scheduler(pool: DbPool, cache: Arc<ResponseCache>, interval: StdDuration) {
    let mut ticker = tokio::time::interval(interval.max(StdDuration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match run_due(&pool, Utc::now()).await {
            Ok(0) => tracing::debug!("Recurring scheduler: nothing due"),
            Ok(n) => {
                cache.invalidate(&[DONATIONS, ANALYTICS, DASHBOARD]);
                tracing::info!("Recurring scheduler created {} donation(s)", n);
            }
            Err(e) => tracing::error!("Recurring scheduler failed: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Storage;

    fn at(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[test]
    fn future_schedule_is_untouched() {
        let s = at("2025-05-01T10:00:00Z");
        assert_eq!(next_occurrence(s, Frequency::Weekly, at("2025-04-19T20:00:00Z")), s);
    }

    #[test]
    fn advances_past_now_in_whole_intervals() {
        let now = at("2025-04-19T20:00:00Z");
        assert_eq!(
            next_occurrence(at("2025-04-19T10:00:00Z"), Frequency::Daily, now),
            at("2025-04-20T10:00:00Z")
        );
        // several missed weeks
        assert_eq!(
            next_occurrence(at("2025-03-29T10:00:00Z"), Frequency::Weekly, now),
            at("2025-04-26T10:00:00Z")
        );
        assert_eq!(
            next_occurrence(at("2025-04-19T20:00:00Z"), Frequency::Monthly, now),
            at("2025-05-19T20:00:00Z")
        );
    }

    fn reminder(next: &str) -> RecurringReminder {
        RecurringReminder {
            id: "rem_1".into(),
            donor_id: "usr_1003".into(),
            food_type: "dal rice".into(),
            weight: "2 kg".into(),
            frequency: Frequency::Weekly,
            storage: Storage::RoomTemp,
            start_date: at(next),
            next_scheduled: at(next),
            predicted_category: Some("lunch".into()),
            is_active: true,
            created_at: at("2025-04-01T00:00:00Z"),
            updated_at: at("2025-04-01T00:00:00Z"),
        }
    }

    #[tokio::test]
    async fn run_due_creates_donation_and_reschedules() {
        let pool = db::init_pool(db::MEMORY_URL).await.unwrap();
        db::fixtures::seed(&pool).await.unwrap();
        db::insert_reminder(&pool, &reminder("2025-04-18T09:00:00Z")).await.unwrap();
        let mut later = reminder("2025-06-01T09:00:00Z");
        later.id = "rem_2".into();
        db::insert_reminder(&pool, &later).await.unwrap();

        let now = at("2025-04-19T20:00:00Z");
        assert_eq!(run_due(&pool, now).await.unwrap(), 1);

        let pending = db::list_donations_by_status(&pool, DonationStatus::Pending).await.unwrap();
        let made = pending.iter().find(|d| d.created_at == now).unwrap();
        assert_eq!(made.donor_name, "Community Foods Inc.");
        assert_eq!(made.donor_type, DonorType::Business);
        assert_eq!(made.items[0].name, "dal rice");
        assert_eq!(made.predicted_category.as_deref(), Some("lunch"));

        let stored = db::get_reminder_for_donor(&pool, "usr_1003", "rem_1").await.unwrap().unwrap();
        assert_eq!(stored.next_scheduled, at("2025-04-25T09:00:00Z"));

        // nothing left to do at the same instant
        assert_eq!(run_due(&pool, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_reschedule_rolls_back_and_others_still_run() {
        let pool = db::init_pool(db::MEMORY_URL).await.unwrap();
        db::fixtures::seed(&pool).await.unwrap();
        let mut stuck = reminder("2025-04-18T09:00:00Z");
        stuck.id = "rem_stuck".into();
        db::insert_reminder(&pool, &stuck).await.unwrap();
        db::insert_reminder(&pool, &reminder("2025-04-18T09:00:00Z")).await.unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_stuck BEFORE UPDATE ON recurring_reminders \
                 WHEN OLD.id = 'rem_stuck' BEGIN SELECT RAISE(ABORT, 'disk'); END;",
            )
            .unwrap();

        let now = at("2025-04-19T20:00:00Z");
        let before = db::list_donations(&pool).await.unwrap().len();
        assert_eq!(run_due(&pool, now).await.unwrap(), 1);
        assert_eq!(run_due(&pool, now).await.unwrap(), 0);

        // only the healthy reminder produced a donation, once
        let after = db::list_donations(&pool).await.unwrap();
        assert_eq!(after.len(), before + 1);
        let stuck = db::get_reminder_for_donor(&pool, "usr_1003", "rem_stuck").await.unwrap().unwrap();
        assert_eq!(stuck.next_scheduled, at("2025-04-18T09:00:00Z"));
        let ok = db::get_reminder_for_donor(&pool, "usr_1003", "rem_1").await.unwrap().unwrap();
        assert_eq!(ok.next_scheduled, at("2025-04-25T09:00:00Z"));
    }
}
