use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{day_start, CancellationStatus};

use super::LedgerError;

const MS_PER_DAY: i64 = 86_400_000;

/// `floor((start - now) / 1 day) + 1`, with `start` taken at 00:00 UTC.
///
/// A trip starting tomorrow has lead 1 for the rest of today; once its own
/// day is under way the lead drops to 0.
pub fn lead_days(start: NaiveDate, now: DateTime<Utc>) -> i64 {
    let gap_ms = (day_start(start) - now).num_milliseconds();
    gap_ms.div_euclid(MS_PER_DAY) + 1
}

/// Status a cancellation with `lead` days to go lands in.
pub fn cancellation_status(lead: i64) -> Result<CancellationStatus, LedgerError> {
    match lead {
        l if l >= 2 => Ok(CancellationStatus::CancelledFull),
        1 => Ok(CancellationStatus::CancelledPartial),
        _ => Err(LedgerError::State(
            "the trip is either completed or in progress".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
    }

    #[test]
    fn lead_counts_calendar_days() {
        let now = at(2024, 6, 7, 10, 0);
        assert_eq!(lead_days(d("2024-06-10"), now), 3);
        assert_eq!(lead_days(d("2024-06-09"), now), 2);
        assert_eq!(lead_days(d("2024-06-08"), now), 1);
        assert_eq!(lead_days(d("2024-06-07"), now), 0);
        assert_eq!(lead_days(d("2024-06-05"), now), -2);
    }

    #[test]
    fn lead_at_midnight_boundaries() {
        assert_eq!(lead_days(d("2024-06-08"), at(2024, 6, 7, 0, 0)), 2);
        assert_eq!(lead_days(d("2024-06-08"), at(2024, 6, 7, 23, 59)), 1);
        assert_eq!(lead_days(d("2024-06-08"), at(2024, 6, 8, 0, 0)), 1);
        assert_eq!(lead_days(d("2024-06-08"), at(2024, 6, 8, 0, 1)), 0);
    }

    #[test]
    fn refund_tiers() {
        assert_eq!(cancellation_status(3).unwrap(), CancellationStatus::CancelledFull);
        assert_eq!(cancellation_status(2).unwrap(), CancellationStatus::CancelledFull);
        assert_eq!(cancellation_status(1).unwrap(), CancellationStatus::CancelledPartial);
        assert!(matches!(cancellation_status(0), Err(LedgerError::State(_))));
        assert!(matches!(cancellation_status(-4), Err(LedgerError::State(_))));
    }
}
