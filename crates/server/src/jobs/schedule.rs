//! Firing times for scheduled jobs.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every N minutes, on multiples of the period since the Unix epoch.
    Every {
        /// Minutes between runs.
        minutes: u32,
    },
    /// Once a day at a local wall-clock time.
    DailyAt {
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Every { minutes } => write!(f, "every {minutes} minutes"),
            Self::DailyAt { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
        }
    }
}

impl Schedule {
    /// Daily schedule at `time` (seconds are ignored).
    #[must_use]
    pub fn daily_at(time: NaiveTime) -> Self {
        Self::DailyAt {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    /// The first firing strictly after `now`, with daily times read in `tz`.
    ///
    /// Returns `None` for an invalid schedule (zero period, out-of-range time).
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        match *self {
            Self::Every { minutes } => {
                let period = i64::from(minutes).checked_mul(60).filter(|p| *p > 0)?;
                let next = (now.timestamp().div_euclid(period) + 1) * period;
                DateTime::from_timestamp(next, 0)
            }
            Self::DailyAt { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let today = now.with_timezone(&tz).date_naive();
                (0..=2)
                    .filter_map(|days| today.checked_add_signed(Duration::days(days)))
                    .filter_map(|date| resolve_local(tz, date.and_time(time)))
                    .find(|candidate| *candidate > now)
            }
        }
    }
}

/// Map a local wall-clock time to UTC.
///
/// An ambiguous time (clocks going back) resolves to its first occurrence; a
/// time skipped by clocks going forward is moved forward by the gap.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match tz.from_local_datetime(&(local + Duration::hours(1))) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t.with_timezone(&Utc)),
            LocalResult::None => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe::Helsinki;

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    const ROTATION: Schedule = Schedule::DailyAt { hour: 2, minute: 0 };

    #[test]
    fn test_daily_rotation_in_summer() {
        // EEST, UTC+3: 02:00 local is 23:00 UTC the previous day.
        let next = ROTATION.next_after(utc("2026-07-01T12:00:00Z"), Helsinki);
        assert_eq!(next, Some(utc("2026-07-01T23:00:00Z")));
    }

    #[test]
    fn test_daily_rotation_in_winter() {
        // EET, UTC+2: 02:00 local is 00:00 UTC.
        let next = ROTATION.next_after(utc("2026-01-15T12:00:00Z"), Helsinki);
        assert_eq!(next, Some(utc("2026-01-16T00:00:00Z")));
    }

    #[test]
    fn test_daily_later_today() {
        // 01:00 local, rotation still ahead today.
        let next = ROTATION.next_after(utc("2026-01-14T23:00:00Z"), Helsinki);
        assert_eq!(next, Some(utc("2026-01-15T00:00:00Z")));
    }

    #[test]
    fn test_daily_is_strictly_after_now() {
        let firing = utc("2026-01-16T00:00:00Z");
        let next = ROTATION.next_after(firing, Helsinki);
        assert_eq!(next, Some(utc("2026-01-17T00:00:00Z")));
    }

    #[test]
    fn test_daily_time_skipped_by_dst() {
        // 2026-03-29 03:00 EET jumps to 04:00 EEST; 03:30 does not exist.
        let schedule = Schedule::DailyAt {
            hour: 3,
            minute: 30,
        };
        let next = schedule.next_after(utc("2026-03-28T12:00:00Z"), Helsinki);
        assert_eq!(next, Some(utc("2026-03-29T01:30:00Z")));
    }

    #[test]
    fn test_daily_time_repeated_by_dst() {
        // 2026-10-25 04:00 EEST falls back to 03:00 EET; 03:30 happens twice.
        let schedule = Schedule::DailyAt {
            hour: 3,
            minute: 30,
        };
        let next = schedule.next_after(utc("2026-10-24T12:00:00Z"), Helsinki);
        assert_eq!(next, Some(utc("2026-10-25T00:30:00Z")));
    }

    #[test]
    fn test_every_fifteen_minutes_aligns_to_quarter_hour() {
        let every = Schedule::Every { minutes: 15 };
        assert_eq!(
            every.next_after(utc("2026-05-04T10:07:30Z"), Helsinki),
            Some(utc("2026-05-04T10:15:00Z"))
        );
        assert_eq!(
            every.next_after(utc("2026-05-04T10:15:00Z"), Helsinki),
            Some(utc("2026-05-04T10:30:00Z"))
        );
        assert_eq!(
            every.next_after(utc("2026-05-04T23:59:59Z"), Helsinki),
            Some(utc("2026-05-05T00:00:00Z"))
        );
    }

    #[test]
    fn test_invalid_schedules() {
        let now = utc("2026-05-04T10:00:00Z");
        assert!(Schedule::Every { minutes: 0 }.next_after(now, Helsinki).is_none());
        assert!(
            Schedule::DailyAt {
                hour: 24,
                minute: 0
            }
            .next_after(now, Helsinki)
            .is_none()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Schedule::Every { minutes: 15 }.to_string(), "every 15 minutes");
        assert_eq!(ROTATION.to_string(), "daily at 02:00");
        let from_config = Schedule::daily_at(NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert_eq!(from_config.to_string(), "daily at 03:00");
    }
}
