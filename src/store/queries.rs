use chrono::NaiveDate;

use crate::model::*;

use super::journaled::JournaledStore;
use super::{ReviewQuery, StoreError, TripPredicate};

impl JournaledStore {
    pub async fn read_car(&self, id: CarId) -> Option<Car> {
        let rs = self.get_car_state(&id)?;
        let guard = rs.read().await;
        Some(guard.car.clone())
    }

    fn owner_car_ids(&self, owner_id: &ProfileId) -> Vec<CarId> {
        self.owner_cars
            .get(owner_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub async fn list_owner_cars(&self, owner_id: ProfileId) -> Vec<Car> {
        let mut cars = Vec::new();
        for id in self.owner_car_ids(&owner_id) {
            if let Some(car) = self.read_car(id).await {
                cars.push(car);
            }
        }
        cars
    }

    pub async fn read_trip(&self, id: TripId) -> Option<Trip> {
        let car_id = self.car_for_trip(&id)?;
        let rs = self.get_car_state(&car_id)?;
        let guard = rs.read().await;
        guard.trip(&id).cloned()
    }

    pub async fn query_trips(&self, car_id: CarId, predicate: TripPredicate) -> Result<Vec<Trip>, StoreError> {
        let rs = self
            .get_car_state(&car_id)
            .ok_or(StoreError::NotFound(car_id))?;
        let guard = rs.read().await;
        let trips = match predicate.overlapping {
            Some(range) => guard
                .overlapping(&range)
                .filter(|t| predicate.matches(t))
                .cloned()
                .collect(),
            None => guard
                .trips
                .iter()
                .filter(|t| predicate.matches(t))
                .cloned()
                .collect(),
        };
        Ok(trips)
    }

    pub async fn list_owner_trips(&self, owner_id: ProfileId) -> Vec<Trip> {
        let mut trips = Vec::new();
        for car_id in self.owner_car_ids(&owner_id) {
            if let Some(rs) = self.get_car_state(&car_id) {
                let guard = rs.read().await;
                trips.extend(guard.trips.iter().cloned());
            }
        }
        trips.sort_by_key(|t| (t.range.start, t.id));
        trips
    }

    /// Active, not yet completed trips whose last day is before `today`.
    pub async fn collect_finished_trips(&self, today: NaiveDate) -> Vec<TripId> {
        let states: Vec<_> = self.cars.iter().map(|e| e.value().clone()).collect();
        let mut finished = Vec::new();
        for state in states {
            let guard = state.read().await;
            finished.extend(
                guard
                    .trips
                    .iter()
                    .filter(|t| t.is_active() && !t.completed && t.range.end < today)
                    .map(|t| t.id),
            );
        }
        finished
    }

    pub fn list_reviews(&self, query: ReviewQuery) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|r| match query {
                ReviewQuery::Car(id) => r.car_id == id,
                ReviewQuery::Trip(id) => r.trip_id == id,
                ReviewQuery::Owner(id) => r.owner_id == id,
            })
            .map(|r| r.value().clone())
            .collect();
        reviews.sort_by_key(|r| r.id);
        reviews
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }
}
