use crate::model::*;

use super::{CarState, StoreError};

/// Filter applied to a car's trips by [`super::TripStore::query`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripPredicate {
    /// Skip cancelled trips.
    pub active_only: bool,
    /// Keep only trips sharing a day with this range.
    pub overlapping: Option<DateRange>,
    /// Skip this trip (the one being edited).
    pub exclude: Option<TripId>,
}

impl TripPredicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn overlapping(mut self, range: DateRange) -> Self {
        self.overlapping = Some(range);
        self
    }

    pub fn excluding(mut self, id: Option<TripId>) -> Self {
        self.exclude = id;
        self
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        if self.active_only && !trip.is_active() {
            return false;
        }
        if self.exclude == Some(trip.id) {
            return false;
        }
        self.overlapping.is_none_or(|r| r.overlaps(&trip.range))
    }
}

/// The set of trips a write must not collide with: every active trip of the
/// car overlapping `range`, except `exclude`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictScope {
    pub range: DateRange,
    pub exclude: Option<TripId>,
}

impl ConflictScope {
    pub fn new(range: DateRange) -> Self {
        Self { range, exclude: None }
    }

    pub fn excluding(range: DateRange, trip_id: TripId) -> Self {
        Self {
            range,
            exclude: Some(trip_id),
        }
    }

    pub fn predicate(&self) -> TripPredicate {
        TripPredicate::active()
            .overlapping(self.range)
            .excluding(self.exclude)
    }
}

/// First active trip colliding with `scope`, in start order.
pub fn find_conflict<'a>(rs: &'a CarState, scope: &ConflictScope) -> Option<&'a Trip> {
    let predicate = scope.predicate();
    rs.overlapping(&scope.range).find(|t| predicate.matches(t))
}

pub(crate) fn check_no_conflict(rs: &CarState, scope: &ConflictScope) -> Result<(), StoreError> {
    match find_conflict(rs, scope) {
        Some(existing) => Err(StoreError::Conflict {
            trip_id: existing.id,
            range: existing.range,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(d(a), d(b))
    }

    fn state_with(trips: &[(&str, &str, CancellationStatus)]) -> CarState {
        let mut rs = CarState::new(Car {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            model: "Nexon".into(),
            car_number: "TN09XY4321".into(),
            pricing: Pricing {
                price_per_km: Money(10),
                driver_cost: Money(50),
                extra_day_cost: Money(20),
                mileage: Money(5),
            },
            active: true,
            deleted: false,
        });
        for (start, end, status) in trips {
            let trip = Trip {
                id: Ulid::new(),
                car_id: rs.car.id,
                owner_id: rs.car.owner_id,
                booked_by: Ulid::new(),
                range: range(start, end),
                distance_km: 1,
                total_days: 1,
                customer_name: None,
                total_cost: Money(60),
                profit: Money(5),
                status: *status,
                completed: false,
            };
            rs.insert_trip(trip);
        }
        rs
    }

    #[test]
    fn boundary_day_conflicts() {
        let rs = state_with(&[("2024-06-10", "2024-06-15", CancellationStatus::Active)]);
        let err = check_no_conflict(&rs, &ConflictScope::new(range("2024-06-15", "2024-06-20")))
            .unwrap_err();
        match err {
            StoreError::Conflict { range: r, .. } => assert_eq!(r, range("2024-06-10", "2024-06-15")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_trips_free_the_range() {
        let rs = state_with(&[
            ("2024-06-10", "2024-06-15", CancellationStatus::CancelledFull),
            ("2024-06-16", "2024-06-18", CancellationStatus::CancelledPartial),
        ]);
        assert!(check_no_conflict(&rs, &ConflictScope::new(range("2024-06-12", "2024-06-17"))).is_ok());
    }

    #[test]
    fn excluded_trip_is_ignored() {
        let rs = state_with(&[("2024-06-10", "2024-06-15", CancellationStatus::Active)]);
        let own = rs.trips[0].id;
        let scope = ConflictScope::excluding(range("2024-06-12", "2024-06-18"), own);
        assert!(find_conflict(&rs, &scope).is_none());
    }

    #[test]
    fn exclusion_does_not_hide_other_trips() {
        let rs = state_with(&[
            ("2024-06-10", "2024-06-15", CancellationStatus::Active),
            ("2024-06-17", "2024-06-19", CancellationStatus::Active),
        ]);
        let own = rs.trips[0].id;
        let scope = ConflictScope::excluding(range("2024-06-12", "2024-06-18"), own);
        let hit = find_conflict(&rs, &scope).unwrap();
        assert_eq!(hit.id, rs.trips[1].id);
    }

    #[test]
    fn disjoint_range_is_free() {
        let rs = state_with(&[("2024-06-10", "2024-06-15", CancellationStatus::Active)]);
        assert!(find_conflict(&rs, &ConflictScope::new(range("2024-06-16", "2024-06-16"))).is_none());
        assert!(find_conflict(&rs, &ConflictScope::new(range("2024-06-01", "2024-06-09"))).is_none());
    }

    #[test]
    fn predicate_all_keeps_cancelled() {
        let rs = state_with(&[("2024-06-10", "2024-06-15", CancellationStatus::CancelledFull)]);
        assert!(TripPredicate::all().matches(&rs.trips[0]));
        assert!(!TripPredicate::active().matches(&rs.trips[0]));
    }
}
