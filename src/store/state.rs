use crate::model::*;

/// A car and every trip ever booked on it, cancelled ones included.
#[derive(Debug, Clone)]
pub struct CarState {
    pub car: Car,
    /// Sorted by `range.start`.
    pub trips: Vec<Trip>,
}

impl CarState {
    pub fn new(car: Car) -> Self {
        Self {
            car,
            trips: Vec::new(),
        }
    }

    /// Insert keeping the start-date order. Trips with equal starts keep
    /// insertion order.
    pub fn insert_trip(&mut self, trip: Trip) {
        let pos = self
            .trips
            .partition_point(|t| t.range.start <= trip.range.start);
        self.trips.insert(pos, trip);
    }

    pub fn trip(&self, id: &TripId) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == *id)
    }

    pub fn trip_mut(&mut self, id: &TripId) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|t| t.id == *id)
    }

    /// Remove and re-insert so the order survives a date change.
    pub fn reposition(&mut self, id: &TripId, range: DateRange) -> Option<&mut Trip> {
        let pos = self.trips.iter().position(|t| t.id == *id)?;
        let mut trip = self.trips.remove(pos);
        trip.range = range;
        self.insert_trip(trip);
        self.trip_mut(id)
    }

    /// Trips (any status) sharing at least one day with `query`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Trip> {
        // Anything from `right_bound` on starts after the query ends.
        let right_bound = self
            .trips
            .partition_point(|t| t.range.start <= query.end);
        self.trips[..right_bound]
            .iter()
            .filter(move |t| t.range.end >= query.start)
    }
}
