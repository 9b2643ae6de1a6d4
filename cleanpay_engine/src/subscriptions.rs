//! Recurring-billing schedule rules.
//!
//! The next charge date is derived purely from the subscription's frequency and
//! preferences plus the moment the last charge landed. Weekly subscriptions hit
//! the next preferred weekday *strictly after* the charge (a Monday charge on a
//! Monday-preferred subscription schedules next Monday, not today). Monthly
//! subscriptions hit the preferred day of the following month, clamped to that
//! month's length (the 31st becomes Feb 28/29).

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::db_types::BillingFrequency;

fn days_in_month(year: i32, month: u32) -> i64 {
    let (next_y, next_m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next_first = NaiveDate::from_ymd_opt(next_y, next_m, 1);
    match (first, next_first) {
        (Some(a), Some(b)) => (b - a).num_days(),
        _ => 30,
    }
}

fn at_hour(date: NaiveDate, hour: i64) -> DateTime<Utc> {
    let hour = hour.clamp(0, 23) as u32;
    date.and_hms_opt(hour, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(Utc::now)
}

/// The next charge moment strictly after `last_charge`.
pub fn next_charge_after(
    frequency: BillingFrequency,
    preferred_day: i64,
    preferred_hour: i64,
    last_charge: DateTime<Utc>,
) -> DateTime<Utc> {
    let date = last_charge.date_naive();
    match frequency {
        BillingFrequency::Weekly => {
            let today = date.weekday().num_days_from_monday() as i64;
            let target = preferred_day.rem_euclid(7);
            let mut ahead = (target - today).rem_euclid(7);
            if ahead == 0 {
                ahead = 7;
            }
            at_hour(date + Duration::days(ahead), preferred_hour)
        },
        BillingFrequency::Monthly => {
            let (year, month) = if date.month() == 12 { (date.year() + 1, 1) } else { (date.year(), date.month() + 1) };
            let day = preferred_day.clamp(1, days_in_month(year, month)) as u32;
            let next = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date);
            at_hour(next, preferred_hour)
        },
    }
}
