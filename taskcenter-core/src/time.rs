//! Time utilities: timezone-aware "today" and local deadline parsing.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of "now" for deadline scoring. Injected so scores stay reproducible.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Zone whose calendar decides what "today" means.
    fn timezone(&self) -> Tz;

    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone()).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Frozen clock for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self { now, tz }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self { now, tz: Tz::UTC }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Calendar days from today (in the clock's zone) to the deadline's local date.
/// Negative when overdue.
pub fn days_until(deadline: DateTime<Utc>, clock: &impl Clock) -> i64 {
    (clock.local_date(deadline) - clock.today()).num_days()
}

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Parse a deadline like "2026-02-20 23:59" or "2026-02-20" in an IANA tz like
/// "Europe/Moscow", returning UTC. A bare date means end of that day.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(tz)?;
    let local = local.trim();

    let ndt = match NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M") {
        Ok(ndt) => ndt,
        Err(_) => {
            let date = NaiveDate::parse_from_str(local, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("invalid local deadline '{local}': {e}"))?;
            let end = NaiveTime::from_hms_opt(23, 59, 0)
                .ok_or_else(|| anyhow::anyhow!("invalid end-of-day time"))?;
            date.and_time(end)
        }
    };

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}
