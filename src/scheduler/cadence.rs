//! Wall-clock cadence of the retraining job

use crate::config::Cadence;
use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use std::time::Duration;

/// Next firing strictly after `now`.
///
/// The target is a local wall-clock time in the cadence's timezone. A local
/// time skipped by a DST jump moves to the next eligible day; an ambiguous
/// one takes the earlier instant.
pub fn next_run_after(cadence: &Cadence, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz = cadence.timezone()?;
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    for offset in 0..=14 {
        let date = today + ChronoDuration::days(offset);
        if let Cadence::Weekly { weekday, .. } = cadence {
            if date.weekday() != *weekday {
                continue;
            }
        }
        let Some(candidate) = tz.from_local_datetime(&date.and_time(cadence.at())).earliest() else {
            continue;
        };
        if candidate > local_now {
            return Ok(candidate.with_timezone(&Utc));
        }
    }

    Err(AppError::Internal(format!("no upcoming run for cadence {:?}", cadence)))
}

/// Sleep length until the next firing
pub fn duration_until_next_run(cadence: &Cadence, now: DateTime<Utc>) -> Result<Duration> {
    let next = next_run_after(cadence, now)?;
    (next - now)
        .to_std()
        .map_err(|e| AppError::Internal(format!("negative wait until {}: {}", next, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn daily(h: u32, m: u32, tz: &str) -> Cadence {
        Cadence::Daily {
            at: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            timezone: tz.to_string(),
        }
    }

    #[test]
    fn test_daily_later_today_and_tomorrow() {
        let cadence = daily(3, 0, "UTC");
        assert_eq!(
            next_run_after(&cadence, utc("2024-07-10T01:00:00Z")).unwrap(),
            utc("2024-07-10T03:00:00Z")
        );
        // exactly at the target waits a full day
        assert_eq!(
            next_run_after(&cadence, utc("2024-07-10T03:00:00Z")).unwrap(),
            utc("2024-07-11T03:00:00Z")
        );
    }

    #[test]
    fn test_daily_in_kolkata() {
        // 03:00 IST is 21:30 UTC the previous day
        let cadence = daily(3, 0, "Asia/Kolkata");
        assert_eq!(
            next_run_after(&cadence, utc("2024-07-10T12:00:00Z")).unwrap(),
            utc("2024-07-10T21:30:00Z")
        );
    }

    #[test]
    fn test_weekly_picks_weekday() {
        let cadence = Cadence::Weekly {
            weekday: Weekday::Mon,
            at: NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
        };
        // 2024-07-10 is a Wednesday
        assert_eq!(
            next_run_after(&cadence, utc("2024-07-10T12:00:00Z")).unwrap(),
            utc("2024-07-15T03:00:00Z")
        );
        // Monday after the target rolls a full week
        assert_eq!(
            next_run_after(&cadence, utc("2024-07-15T04:00:00Z")).unwrap(),
            utc("2024-07-22T03:00:00Z")
        );
    }

    #[test]
    fn test_skipped_local_time_moves_to_next_day() {
        // 02:30 does not exist in New York on 2024-03-10
        let cadence = daily(2, 30, "America/New_York");
        let next = next_run_after(&cadence, utc("2024-03-10T05:00:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-11T06:30:00Z"));
    }

    #[test]
    fn test_duration_is_bounded() {
        let duration = duration_until_next_run(&Cadence::default(), Utc::now()).unwrap();
        assert!(duration.as_secs() > 0);
        assert!(duration.as_secs() <= 7 * 24 * 3600 + 3600);
    }
}
