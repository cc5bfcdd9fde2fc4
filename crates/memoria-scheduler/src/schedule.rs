use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use memoria_core::Schedule;

use crate::error::{Result, SchedulerError};

/// Reject schedules that could never produce a valid fire time.
pub fn validate(schedule: &Schedule) -> Result<()> {
    match *schedule {
        Schedule::Interval { every_secs: 0 } => Err(SchedulerError::InvalidSchedule(
            "interval must be at least one second".to_string(),
        )),
        Schedule::Hourly { minute } if minute > 59 => Err(SchedulerError::InvalidSchedule(
            format!("minute {minute} is out of range"),
        )),
        Schedule::Daily { hour, minute } if hour > 23 || minute > 59 => Err(
            SchedulerError::InvalidSchedule(format!("{hour:02}:{minute:02} is not a time of day")),
        ),
        _ => Ok(()),
    }
}

/// Compute the next UTC fire time for `schedule` strictly *after* `from`.
///
/// Returns `None` only for schedules that [`validate`] rejects.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match *schedule {
        Schedule::Interval { every_secs } => {
            if every_secs == 0 {
                return None;
            }
            Some(from + Duration::seconds(i64::try_from(every_secs).ok()?))
        }

        Schedule::Hourly { minute } => {
            // This hour's candidate at HH:MM:00.
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    from.hour(),
                    minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::hours(1))
            }
        }

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    hour as u32,
                    minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                // Today's window has passed.
                Some(candidate + Duration::days(1))
            }
        }
    }
}

/// Next fire time after a tick, never at or before the slot that last fired.
///
/// The scheduler sleeps on a monotonic timer, which can wake a hair before
/// the wall clock reaches `last`; measuring from `now` alone would then
/// pick the same slot again.
pub fn next_fire(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let from = last.map_or(now, |last| now.max(last));
    compute_next_run(schedule, from)
}
