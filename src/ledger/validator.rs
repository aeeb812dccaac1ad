use chrono::{DateTime, NaiveDate, Utc};

use crate::limits::MAX_BOOKING_DAYS;
use crate::model::{CarId, DateRange, TripId};
use crate::store::{ConflictScope, TripStore};

use super::policy::lead_days;
use super::LedgerError;

/// Shape and lead-time checks on a proposed range. Pure.
pub fn check_range(start: NaiveDate, end: NaiveDate, now: DateTime<Utc>) -> Result<DateRange, LedgerError> {
    let range = DateRange::checked(start, end).ok_or(LedgerError::InvalidRange)?;
    if lead_days(range.start, now) <= 0 {
        return Err(LedgerError::PastDate);
    }
    if range.days() > MAX_BOOKING_DAYS {
        return Err(LedgerError::Validation(format!(
            "trips may span at most {MAX_BOOKING_DAYS} days"
        )));
    }
    Ok(range)
}

/// Read-only pre-check of a proposed booking against a car's active trips.
///
/// A clean result is advisory: the returned [`ConflictScope`] is evaluated
/// again by the store under the car's lock when the write commits.
pub struct BookingValidator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: TripStore + ?Sized> BookingValidator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate `[start, end]` on `car_id`, ignoring `exclude` (the trip
    /// being edited). Reports the first conflicting trip in start order.
    pub async fn validate(
        &self,
        car_id: CarId,
        start: NaiveDate,
        end: NaiveDate,
        now: DateTime<Utc>,
        exclude: Option<TripId>,
    ) -> Result<ConflictScope, LedgerError> {
        let range = check_range(start, end, now)?;
        let scope = ConflictScope { range, exclude };
        let clashing = self.store.query(car_id, scope.predicate()).await?;
        match clashing.first() {
            Some(existing) => Err(LedgerError::Conflict {
                trip_id: existing.id,
                range: existing.range,
            }),
            None => Ok(scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(
            check_range(d("2024-06-12"), d("2024-06-11"), now()),
            Err(LedgerError::InvalidRange)
        );
    }

    #[test]
    fn today_is_too_soon() {
        assert_eq!(
            check_range(d("2024-06-01"), d("2024-06-03"), now()),
            Err(LedgerError::PastDate)
        );
        assert_eq!(
            check_range(d("2024-05-20"), d("2024-05-21"), now()),
            Err(LedgerError::PastDate)
        );
    }

    #[test]
    fn tomorrow_is_fine() {
        let r = check_range(d("2024-06-02"), d("2024-06-02"), now()).unwrap();
        assert_eq!(r.days(), 1);
    }

    #[test]
    fn overly_long_range_rejected() {
        assert!(matches!(
            check_range(d("2024-06-02"), d("2025-06-30"), now()),
            Err(LedgerError::Validation(_))
        ));
    }
}
