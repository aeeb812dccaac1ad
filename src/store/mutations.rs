use tokio::sync::oneshot;
use tracing::debug;

use crate::limits::*;
use crate::model::*;

use super::conflict::check_no_conflict;
use super::journaled::{JournalCommand, JournaledStore};
use super::{CarPatch, ConflictScope, StoreError, TripPatch};

impl JournaledStore {
    pub async fn create_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        if profile.full_name.len() > MAX_NAME_LEN {
            return Err(StoreError::LimitExceeded("profile name too long"));
        }
        let _gate = self.commit_gate.read().await;
        let _registry = self.registry_lock.lock().await;
        if self.profiles.contains_key(&profile.id) {
            return Err(StoreError::AlreadyExists(profile.id));
        }
        let event = Event::ProfileRegistered {
            profile: profile.clone(),
        };
        self.journal_append(&event).await?;
        self.apply_registry(&event);
        Ok(profile)
    }

    pub async fn create_car(&self, car: Car) -> Result<Car, StoreError> {
        let _gate = self.commit_gate.read().await;
        let _registry = self.registry_lock.lock().await;
        if self.cars.len() >= MAX_CARS {
            return Err(StoreError::LimitExceeded("too many cars"));
        }
        if self.cars.contains_key(&car.id) {
            return Err(StoreError::AlreadyExists(car.id));
        }
        let event = Event::CarRegistered { car: car.clone() };
        self.journal_append(&event).await?;
        self.apply_registry(&event);
        self.notify.send(car.id, &event);
        debug!("registered car {} for owner {}", car.id, car.owner_id);
        Ok(car)
    }

    pub async fn patch_car(&self, id: CarId, patch: CarPatch) -> Result<Car, StoreError> {
        let mut rs = self.write_car(&id).await?;
        if rs.car.deleted {
            return Err(StoreError::Unavailable(id));
        }
        let event = match patch {
            CarPatch::Pricing(pricing) => Event::CarPricingUpdated { id, pricing },
            CarPatch::ToggleActive => Event::CarActiveSet {
                id,
                active: !rs.car.active,
            },
            CarPatch::SoftDelete => Event::CarDeleted { id },
        };
        self.persist_and_apply(&mut rs, &event).await?;
        if patch == CarPatch::SoftDelete {
            self.notify.prune(&id);
        }
        Ok(rs.car.clone())
    }

    pub async fn book_trip(&self, trip: Trip, scope: ConflictScope) -> Result<Trip, StoreError> {
        let mut rs = self.write_car(&trip.car_id).await?;
        if !rs.car.is_bookable() {
            return Err(StoreError::Unavailable(trip.car_id));
        }
        if rs.trips.len() >= MAX_TRIPS_PER_CAR {
            return Err(StoreError::LimitExceeded("too many trips on car"));
        }
        if self.trip_to_car.contains_key(&trip.id) {
            return Err(StoreError::AlreadyExists(trip.id));
        }
        if let Err(e) = check_no_conflict(&rs, &scope) {
            debug!("booking on car {} rejected: {e}", trip.car_id);
            return Err(e);
        }

        let event = Event::TripBooked { trip: trip.clone() };
        self.persist_and_apply(&mut rs, &event).await?;
        Ok(trip)
    }

    pub async fn reschedule_trip(
        &self,
        id: TripId,
        patch: TripPatch,
        scope: ConflictScope,
    ) -> Result<Trip, StoreError> {
        let mut rs = self.write_trip_car(&id).await?;
        let current = rs.trip(&id).ok_or(StoreError::NotFound(id))?;
        if !current.is_active() || current.completed {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
            });
        }
        if let Err(e) = check_no_conflict(&rs, &scope) {
            debug!("reschedule of trip {id} rejected: {e}");
            return Err(e);
        }

        let event = Event::TripRescheduled {
            id,
            car_id: rs.car.id,
            range: patch.range,
            distance_km: patch.distance_km,
            total_days: patch.total_days,
            total_cost: patch.total_cost,
            profit: patch.profit,
        };
        self.persist_and_apply(&mut rs, &event).await?;
        rs.trip(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    pub async fn set_trip_status(&self, id: TripId, status: CancellationStatus) -> Result<Trip, StoreError> {
        let mut rs = self.write_trip_car(&id).await?;
        let current = rs.trip(&id).ok_or(StoreError::NotFound(id))?;
        if current.status.is_cancelled() || current.completed || !status.is_cancelled() {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
            });
        }
        let event = Event::TripStatusChanged {
            id,
            car_id: rs.car.id,
            status,
        };
        self.persist_and_apply(&mut rs, &event).await?;
        rs.trip(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    pub async fn complete_trip(&self, id: TripId) -> Result<Trip, StoreError> {
        let mut rs = self.write_trip_car(&id).await?;
        let current = rs.trip(&id).ok_or(StoreError::NotFound(id))?;
        if current.status.is_cancelled() || current.completed {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
            });
        }
        let event = Event::TripCompleted { id, car_id: rs.car.id };
        self.persist_and_apply(&mut rs, &event).await?;
        rs.trip(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    pub async fn post_review(&self, review: Review) -> Result<Review, StoreError> {
        let mut rs = self.write_trip_car(&review.trip_id).await?;
        if rs.trip(&review.trip_id).is_none() {
            return Err(StoreError::NotFound(review.trip_id));
        }
        if let Some(existing) = self.review_by_trip.get(&review.trip_id) {
            return Err(StoreError::AlreadyExists(*existing.value()));
        }
        if self.reviews.contains_key(&review.id) {
            return Err(StoreError::AlreadyExists(review.id));
        }
        let event = Event::ReviewPosted {
            review: review.clone(),
        };
        self.persist_and_apply(&mut rs, &event).await?;
        Ok(review)
    }

    pub async fn add_review_comment(&self, id: ReviewId, comment: String) -> Result<Review, StoreError> {
        if comment.len() > MAX_COMMENT_LEN {
            return Err(StoreError::LimitExceeded("comment too long"));
        }
        let mut rs = self.write_review_car(&id).await?;
        let event = Event::ReviewCommented {
            id,
            car_id: rs.car.id,
            comment,
        };
        self.persist_and_apply(&mut rs, &event).await?;
        self.reviews
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Rewrite the journal as the minimal record set that rebuilds the
    /// current state. Writers are held off for the duration.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _exclusive = self.commit_gate.write().await;

        let mut events: Vec<Event> = self
            .profiles
            .iter()
            .map(|p| Event::ProfileRegistered {
                profile: p.value().clone(),
            })
            .collect();

        let states: Vec<_> = self.cars.iter().map(|e| e.value().clone()).collect();
        for state in states {
            let rs = state.read().await;
            events.push(Event::CarRegistered { car: rs.car.clone() });
            events.extend(rs.trips.iter().map(|t| Event::TripBooked { trip: t.clone() }));
        }

        events.extend(self.reviews.iter().map(|r| Event::ReviewPosted {
            review: r.value().clone(),
        }));

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Rewrite { events, response: tx })
            .await
            .map_err(|_| StoreError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| StoreError::JournalError(e.to_string()))?;
        debug!("journal compacted to {count} records");
        Ok(())
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
