//! Booking rules on top of a [`TripStore`].
//!
//! The ledger validates requests, prices trips, applies the cancellation
//! policy and enforces who may touch what. Every write is handed to the
//! store's conflict-checked primitives on a detached task, so a caller that
//! gives up mid-request never leaves a half-applied change behind.

mod error;
mod fleet;
mod policy;
mod pricing;
mod reviews;
mod schedule;
mod validator;

pub use error::LedgerError;
pub use fleet::NewCar;
pub use policy::{cancellation_status, lead_days};
pub use pricing::{quote, Quote};
pub use reviews::NewReview;
pub use schedule::Schedule;
pub use validator::{check_range, BookingValidator};

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{TripPatch, TripPredicate, TripStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookTrip {
    pub car_id: CarId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub distance_km: u32,
    pub total_days: u32,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTrip {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub distance_km: u32,
    pub total_days: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripFilter {
    /// First day of a calendar month.
    pub month: Option<NaiveDate>,
    pub car_id: Option<CarId>,
    pub completed: Option<bool>,
}

impl TripFilter {
    /// Month filter keeps trips starting on or after the first of the month
    /// and ending before the first of the next.
    pub fn matches(&self, trip: &Trip) -> bool {
        if let Some(first) = self.month {
            if trip.range.start < first {
                return false;
            }
            if let Some(next) = first.checked_add_months(Months::new(1))
                && trip.range.end >= next
            {
                return false;
            }
        }
        self.car_id.is_none_or(|id| trip.car_id == id)
            && self.completed.is_none_or(|c| trip.completed == c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub trip: Trip,
    pub days_until_start: i64,
    /// The booking party is charged (late cancellation).
    pub charged: bool,
}

fn check_trip_figures(distance_km: u32, total_days: u32) -> Result<(), LedgerError> {
    if distance_km == 0 {
        return Err(LedgerError::Validation("total_distance must be positive".into()));
    }
    if distance_km > MAX_DISTANCE_KM {
        return Err(LedgerError::Validation(format!(
            "total_distance may be at most {MAX_DISTANCE_KM} km"
        )));
    }
    if total_days == 0 || total_days > MAX_TOTAL_DAYS {
        return Err(LedgerError::Validation(format!(
            "total_days must be between 1 and {MAX_TOTAL_DAYS}"
        )));
    }
    Ok(())
}

fn require_owner(who: &Identity, action: &'static str) -> Result<(), LedgerError> {
    if who.is_owner() {
        Ok(())
    } else {
        Err(LedgerError::Forbidden(action))
    }
}

pub struct Ledger<S> {
    store: Arc<S>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: TripStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn validator(&self) -> BookingValidator<'_, S> {
        BookingValidator::new(self.store.as_ref())
    }

    /// Run a store write on its own task. Dropping the caller's future does
    /// not cancel it: the write either commits in full or fails in full.
    async fn detached<T, E, F, Fut>(&self, op: F) -> Result<T, LedgerError>
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        LedgerError: From<E>,
    {
        tokio::spawn(op(self.store.clone()))
            .await
            .map_err(|e| LedgerError::Storage(format!("write task failed: {e}")))?
            .map_err(LedgerError::from)
    }

    /// Book `cmd.car_id` for the caller.
    pub async fn book(&self, who: &Identity, cmd: BookTrip, now: DateTime<Utc>) -> Result<Trip, LedgerError> {
        check_trip_figures(cmd.distance_km, cmd.total_days)?;
        if let Some(name) = &cmd.customer_name
            && name.len() > MAX_NAME_LEN
        {
            return Err(LedgerError::Validation("customer_name too long".into()));
        }

        let car = self.bookable_car(cmd.car_id).await?;
        let scope = self
            .validator()
            .validate(car.id, cmd.start, cmd.end, now, None)
            .await
            .inspect_err(note_conflict)?;
        let quote = quote(&car.pricing, cmd.distance_km, cmd.total_days)?;

        let trip = Trip {
            id: Ulid::new(),
            car_id: car.id,
            owner_id: car.owner_id,
            booked_by: who.id,
            range: scope.range,
            distance_km: cmd.distance_km,
            total_days: cmd.total_days,
            customer_name: cmd.customer_name,
            total_cost: quote.total_cost,
            profit: quote.profit,
            status: CancellationStatus::Active,
            completed: false,
        };
        let trip = self
            .detached(move |store| async move { store.insert_if_no_conflict(trip, scope).await })
            .await
            .inspect_err(note_conflict)?;

        metrics::counter!(observability::TRIPS_BOOKED_TOTAL).increment(1);
        info!(
            "trip {} booked on car {} for {} by {}",
            trip.id, trip.car_id, trip.range, trip.booked_by
        );
        Ok(trip)
    }

    /// A car that exists, is active, is not deleted, and whose owner holds
    /// the owner role.
    async fn bookable_car(&self, car_id: CarId) -> Result<Car, LedgerError> {
        let car = self
            .store
            .car(car_id)
            .await
            .ok_or_else(|| LedgerError::ResourceUnavailable(format!("car {car_id} does not exist")))?;
        if car.deleted {
            return Err(LedgerError::ResourceUnavailable(format!("car {car_id} has been removed")));
        }
        if !car.active {
            return Err(LedgerError::ResourceUnavailable(format!(
                "car {car_id} is under maintenance"
            )));
        }
        match self.store.profile(car.owner_id).await {
            Some(owner) if owner.role == Role::Owner => Ok(car),
            _ => Err(LedgerError::ResourceUnavailable(format!(
                "the owner of car {car_id} does not exist"
            ))),
        }
    }

    /// Reschedule one of the caller's (owner's) trips and re-price it from
    /// the car's current pricing. The trip itself never conflicts with its
    /// own old range.
    pub async fn edit(
        &self,
        who: &Identity,
        trip_id: TripId,
        cmd: EditTrip,
        now: DateTime<Utc>,
    ) -> Result<Trip, LedgerError> {
        require_owner(who, "edit trips")?;
        let trip = self
            .store
            .trip(trip_id)
            .await
            .filter(|t| t.owner_id == who.id)
            .ok_or(LedgerError::NotFound(trip_id))?;
        if !trip.is_active() {
            return Err(LedgerError::State(format!(
                "trip {trip_id} is {} and cannot be edited",
                trip.status.label()
            )));
        }
        if trip.completed {
            return Err(LedgerError::State(format!(
                "trip {trip_id} is completed and cannot be edited"
            )));
        }
        check_trip_figures(cmd.distance_km, cmd.total_days)?;

        let car = self
            .store
            .car(trip.car_id)
            .await
            .ok_or(LedgerError::NotFound(trip.car_id))?;
        let scope = self
            .validator()
            .validate(car.id, cmd.start, cmd.end, now, Some(trip_id))
            .await
            .inspect_err(note_conflict)?;
        let quote = quote(&car.pricing, cmd.distance_km, cmd.total_days)?;

        let patch = TripPatch {
            range: scope.range,
            distance_km: cmd.distance_km,
            total_days: cmd.total_days,
            total_cost: quote.total_cost,
            profit: quote.profit,
        };
        let updated = self
            .detached(move |store| async move { store.update_if_no_conflict(trip_id, patch, scope).await })
            .await
            .inspect_err(note_conflict)?;

        metrics::counter!(observability::TRIPS_EDITED_TOTAL).increment(1);
        info!("trip {trip_id} rescheduled to {}", updated.range);
        Ok(updated)
    }

    /// Cancel one of the caller's bookings according to the lead-time policy.
    pub async fn cancel(&self, who: &Identity, trip_id: TripId, now: DateTime<Utc>) -> Result<CancelOutcome, LedgerError> {
        let trip = self
            .store
            .trip(trip_id)
            .await
            .filter(|t| t.booked_by == who.id)
            .ok_or(LedgerError::NotFound(trip_id))?;
        if !trip.is_active() {
            return Err(LedgerError::State(format!("trip {trip_id} is already cancelled")));
        }
        if trip.completed {
            return Err(LedgerError::State(format!("trip {trip_id} is already completed")));
        }

        let days_until_start = lead_days(trip.range.start, now);
        let status = cancellation_status(days_until_start)?;
        let trip = self
            .detached(move |store| async move { store.transition_status(trip_id, status).await })
            .await?;

        metrics::counter!(observability::TRIPS_CANCELLED_TOTAL, "status" => status.label()).increment(1);
        info!("trip {trip_id} {} with {days_until_start} day(s) to go", status.label());
        Ok(CancelOutcome {
            trip,
            days_until_start,
            charged: status == CancellationStatus::CancelledPartial,
        })
    }

    /// Booked ranges of one of the caller's cars.
    pub async fn schedule(&self, who: &Identity, car_id: CarId) -> Result<Schedule, LedgerError> {
        require_owner(who, "view car schedules")?;
        match self.store.car(car_id).await {
            Some(car) if car.owner_id == who.id => {}
            _ => return Err(LedgerError::NotFound(car_id)),
        }
        let trips = self.store.query(car_id, TripPredicate::active()).await?;
        debug!("schedule for car {car_id}: {} trips", trips.len());
        Ok(Schedule::new(car_id, trips.into_iter().map(|t| t.range).collect()))
    }

    /// Owners see any trip on their cars; booking parties see their own
    /// trips while they are active.
    pub async fn get_trip(&self, who: &Identity, trip_id: TripId) -> Result<Trip, LedgerError> {
        let trip = self
            .store
            .trip(trip_id)
            .await
            .ok_or(LedgerError::NotFound(trip_id))?;
        let visible = (who.is_owner() && trip.owner_id == who.id)
            || (trip.booked_by == who.id && trip.is_active());
        if visible {
            Ok(trip)
        } else {
            Err(LedgerError::NotFound(trip_id))
        }
    }

    pub async fn list_trips(&self, who: &Identity, filter: TripFilter) -> Result<Vec<Trip>, LedgerError> {
        require_owner(who, "list trips")?;
        let mut trips = self.store.trips_owned_by(who.id).await;
        trips.retain(|t| filter.matches(t));
        Ok(trips)
    }
}

fn note_conflict(e: &LedgerError) {
    if let LedgerError::Conflict { trip_id, range } = e {
        metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
        debug!("conflict with trip {trip_id} on {range}");
    }
}
