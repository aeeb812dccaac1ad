//! Durable record store for cars, trips and reviews.
//!
//! [`TripStore`] is the persistence seam the ledger is written against. The
//! write primitives that matter for correctness, `insert_if_no_conflict` and
//! `update_if_no_conflict`, evaluate their [`ConflictScope`] and commit under
//! the same per-car exclusion, so two overlapping bookings on one car can
//! never both succeed.

mod conflict;
mod error;
mod journaled;
mod mutations;
mod queries;
mod state;

pub use conflict::{find_conflict, ConflictScope, TripPredicate};
pub use error::StoreError;
pub use journaled::JournaledStore;
pub use state::CarState;

use async_trait::async_trait;

use crate::model::*;

/// New schedule and derived fields for an existing trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripPatch {
    pub range: DateRange,
    pub distance_km: u32,
    pub total_days: u32,
    pub total_cost: Money,
    pub profit: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarPatch {
    Pricing(Pricing),
    ToggleActive,
    SoftDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewQuery {
    Car(CarId),
    Trip(TripId),
    Owner(ProfileId),
}

#[async_trait]
pub trait TripStore: Send + Sync + 'static {
    async fn register_profile(&self, profile: Profile) -> Result<Profile, StoreError>;

    async fn profile(&self, id: ProfileId) -> Option<Profile>;

    async fn insert_car(&self, car: Car) -> Result<Car, StoreError>;

    async fn car(&self, id: CarId) -> Option<Car>;

    /// Every car registered by `owner_id`, soft-deleted ones included.
    async fn cars_owned_by(&self, owner_id: ProfileId) -> Vec<Car>;

    async fn update_car(&self, id: CarId, patch: CarPatch) -> Result<Car, StoreError>;

    async fn trip(&self, id: TripId) -> Option<Trip>;

    /// Trips of `car_id` matching `predicate`, in start order.
    async fn query(&self, car_id: CarId, predicate: TripPredicate) -> Result<Vec<Trip>, StoreError>;

    async fn trips_owned_by(&self, owner_id: ProfileId) -> Vec<Trip>;

    /// Insert `trip` unless an active trip falls inside `scope`. The car must
    /// be active and not deleted at commit time.
    async fn insert_if_no_conflict(&self, trip: Trip, scope: ConflictScope) -> Result<Trip, StoreError>;

    /// Apply `patch` to an active trip unless another active trip falls
    /// inside `scope`.
    async fn update_if_no_conflict(
        &self,
        id: TripId,
        patch: TripPatch,
        scope: ConflictScope,
    ) -> Result<Trip, StoreError>;

    /// Move an active, uncompleted trip to a cancelled status.
    async fn transition_status(&self, id: TripId, status: CancellationStatus) -> Result<Trip, StoreError>;

    async fn mark_completed(&self, id: TripId) -> Result<Trip, StoreError>;

    /// Insert a review; at most one per trip.
    async fn insert_review(&self, review: Review) -> Result<Review, StoreError>;

    async fn comment_on_review(&self, id: ReviewId, comment: String) -> Result<Review, StoreError>;

    async fn review(&self, id: ReviewId) -> Option<Review>;

    async fn reviews(&self, query: ReviewQuery) -> Vec<Review>;
}
