//! Wall-clock cadences for the driver.
//!
//! Every trigger fires at minute 0 of an hour, Monday to Friday, evaluated in
//! India Standard Time (UTC+05:30, no DST). The same zone is used for the
//! timestamps shown in messages.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};

const IST: FixedOffset = match FixedOffset::east_opt(5 * 3600 + 30 * 60) {
    Some(offset) => offset,
    None => panic!("IST offset out of range"),
};
const ZONE_CHECK_EVERY_HOURS: u32 = 6;

pub fn ist() -> FixedOffset {
    IST
}

pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist())
}

/// `18/10/2026, 3:45:00 pm`
pub fn display_time(at: DateTime<FixedOffset>) -> String {
    at.format("%-d/%-m/%Y, %-I:%M:%S %P").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Budget counter back to zero, 00:00.
    DailyReset,
    /// Full indicator check, every hour.
    FullCheck,
    /// RSI zone scan, every 6 hours from midnight.
    ZoneCheck,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::DailyReset => "daily_reset",
            Job::FullCheck => "full_check",
            Job::ZoneCheck => "zone_check",
        }
    }
}

fn is_business_day(day: Weekday) -> bool {
    !matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Jobs due at a local instant, in execution order. Empty off the hour and at weekends.
pub fn jobs_at(local: DateTime<FixedOffset>) -> Vec<Job> {
    if local.minute() != 0 || local.second() != 0 || !is_business_day(local.weekday()) {
        return Vec::new();
    }
    let mut jobs = Vec::with_capacity(3);
    if local.hour() == 0 {
        jobs.push(Job::DailyReset);
    }
    jobs.push(Job::FullCheck);
    if local.hour() % ZONE_CHECK_EVERY_HOURS == 0 {
        jobs.push(Job::ZoneCheck);
    }
    jobs
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fire {
    pub at: DateTime<Utc>,
    pub jobs: Vec<Job>,
}

/// First instant strictly after `after` with at least one job due.
pub fn next_fire(after: DateTime<Utc>) -> Fire {
    let local = after.with_timezone(&ist());
    let hour_floor = local
        .with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(local);
    let mut candidate = hour_floor + Duration::hours(1);
    // At most a weekend plus one day of hours to skip.
    for _ in 0..(24 * 4) {
        let jobs = jobs_at(candidate);
        if !jobs.is_empty() {
            return Fire { at: candidate.with_timezone(&Utc), jobs };
        }
        candidate += Duration::hours(1);
    }
    Fire { at: candidate.with_timezone(&Utc), jobs: jobs_at(candidate) }
}

/// A fire more than one cadence period (an hour) behind `now` was missed,
/// e.g. the host was suspended. Such fires are dropped, not replayed.
pub fn is_stale(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - fire_at > Duration::hours(1)
}
