use std::io;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};

use crate::journal::Journal;
use crate::model::*;
use crate::notify::NotifyHub;

use super::{
    CarPatch, CarState, ConflictScope, ReviewQuery, StoreError, TripPatch, TripPredicate,
    TripStore,
};

pub type SharedCarState = Arc<RwLock<CarState>>;

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Rewrite {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the journal. Appends that queue up while a flush is running are
/// drained into the next batch and share a single fsync.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut batch = match cmd {
            JournalCommand::Append { event, response } => vec![(event, response)],
            other => {
                handle_other(&mut journal, other);
                continue;
            }
        };
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let started = std::time::Instant::now();
        let result = journal.commit_batch(batch.iter().map(|(event, _)| event));
        metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("journal flush failed for {} records: {e}", batch.len());
        }
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_other(&mut journal, cmd);
        }
    }
}


fn handle_other(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Rewrite { events, response } => {
            let _ = response.send(journal.rewrite(&events));
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { event, response } => {
            let _ = response.send(journal.commit_batch([&event]));
        }
    }
}

/// Write access to one car, held together with the commit gate so a
/// compaction snapshot never misses a record.
pub(super) struct CarWrite<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    guard: OwnedRwLockWriteGuard<CarState>,
}

impl Deref for CarWrite<'_> {
    type Target = CarState;

    fn deref(&self) -> &CarState {
        &self.guard
    }
}

impl DerefMut for CarWrite<'_> {
    fn deref_mut(&mut self) -> &mut CarState {
        &mut self.guard
    }
}

/// In-memory indices rebuilt from, and kept durable by, an append-only
/// journal. Each car sits behind its own `RwLock`; every write to a car's
/// trips or reviews happens with that lock held, from the conflict check
/// through the journal fsync to the in-memory apply.
pub struct JournaledStore {
    pub(super) cars: DashMap<CarId, SharedCarState>,
    pub(super) trip_to_car: DashMap<TripId, CarId>,
    pub(super) owner_cars: DashMap<ProfileId, Vec<CarId>>,
    pub(super) profiles: DashMap<ProfileId, Profile>,
    pub(super) reviews: DashMap<ReviewId, Review>,
    pub(super) review_by_trip: DashMap<TripId, ReviewId>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Writers share it; compaction takes it exclusively. Always acquired
    /// before any car lock.
    pub(super) commit_gate: RwLock<()>,
    /// Serialises store-level inserts (profiles, cars) that have no car lock.
    pub(super) registry_lock: Mutex<()>,
}

impl JournaledStore {
    /// Replay the journal at `path` and start the background writer.
    /// Must run inside a tokio runtime.
    pub fn open(path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Journal::replay(&path)?;
        let journal = Journal::open(&path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let mut store = Self {
            cars: DashMap::new(),
            trip_to_car: DashMap::new(),
            owner_cars: DashMap::new(),
            profiles: DashMap::new(),
            reviews: DashMap::new(),
            review_by_trip: DashMap::new(),
            journal_tx,
            notify,
            commit_gate: RwLock::new(()),
            registry_lock: Mutex::new(()),
        };
        let replayed = events.len();
        for event in &events {
            store.replay_one(event)?;
        }
        tracing::info!(
            "opened journal {} ({replayed} records, {} cars)",
            path.display(),
            store.cars.len()
        );
        Ok(store)
    }

    fn replay_one(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::ProfileRegistered { .. } | Event::CarRegistered { .. } => {
                self.apply_registry(event);
                Ok(())
            }
            other => {
                let car_id = other.car_id().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "journal record without a car")
                })?;
                let Some(mut entry) = self.cars.get_mut(&car_id) else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("journal references unknown car {car_id}"),
                    ));
                };
                // Nothing else holds the Arc while the store is being built.
                let lock = Arc::get_mut(entry.value_mut()).ok_or_else(|| {
                    io::Error::other("car state shared during replay")
                })?;
                let rs = lock.get_mut();
                apply_to_car(rs, other, &self.trip_to_car, &self.reviews, &self.review_by_trip);
                Ok(())
            }
        }
    }

    /// Apply a record that creates a top-level entry.
    pub(super) fn apply_registry(&self, event: &Event) {
        match event {
            Event::ProfileRegistered { profile } => {
                self.profiles.insert(profile.id, profile.clone());
            }
            Event::CarRegistered { car } => {
                self.cars
                    .insert(car.id, Arc::new(RwLock::new(CarState::new(car.clone()))));
                self.owner_cars.entry(car.owner_id).or_default().push(car.id);
            }
            _ => {}
        }
    }

    pub(super) async fn journal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| StoreError::JournalError(e.to_string()))
    }

    /// Journal, then apply to the locked car, then publish.
    pub(super) async fn persist_and_apply(&self, rs: &mut CarState, event: &Event) -> Result<(), StoreError> {
        self.journal_append(event).await?;
        apply_to_car(rs, event, &self.trip_to_car, &self.reviews, &self.review_by_trip);
        self.notify.send(rs.car.id, event);
        Ok(())
    }

    pub fn get_car_state(&self, id: &CarId) -> Option<SharedCarState> {
        self.cars.get(id).map(|e| e.value().clone())
    }

    pub fn car_for_trip(&self, trip_id: &TripId) -> Option<CarId> {
        self.trip_to_car.get(trip_id).map(|e| *e.value())
    }

    pub(super) async fn write_car(&self, id: &CarId) -> Result<CarWrite<'_>, StoreError> {
        let gate = self.commit_gate.read().await;
        let rs = self.get_car_state(id).ok_or(StoreError::NotFound(*id))?;
        let guard = rs.write_owned().await;
        Ok(CarWrite { _gate: gate, guard })
    }

    pub(super) async fn write_trip_car(&self, trip_id: &TripId) -> Result<CarWrite<'_>, StoreError> {
        let car_id = self.car_for_trip(trip_id).ok_or(StoreError::NotFound(*trip_id))?;
        self.write_car(&car_id).await
    }

    pub(super) async fn write_review_car(&self, review_id: &ReviewId) -> Result<CarWrite<'_>, StoreError> {
        let car_id = self
            .reviews
            .get(review_id)
            .map(|r| r.car_id)
            .ok_or(StoreError::NotFound(*review_id))?;
        self.write_car(&car_id).await
    }
}

/// Apply a car-scoped record. The caller holds the car's write lock.
fn apply_to_car(
    rs: &mut CarState,
    event: &Event,
    trip_to_car: &DashMap<TripId, CarId>,
    reviews: &DashMap<ReviewId, Review>,
    review_by_trip: &DashMap<TripId, ReviewId>,
) {
    match event {
        Event::CarPricingUpdated { pricing, .. } => rs.car.pricing = *pricing,
        Event::CarActiveSet { active, .. } => rs.car.active = *active,
        Event::CarDeleted { .. } => {
            rs.car.deleted = true;
            rs.car.active = false;
        }
        Event::TripBooked { trip } => {
            trip_to_car.insert(trip.id, trip.car_id);
            rs.insert_trip(trip.clone());
        }
        Event::TripRescheduled {
            id,
            range,
            distance_km,
            total_days,
            total_cost,
            profit,
            ..
        } => {
            if let Some(trip) = rs.reposition(id, *range) {
                trip.distance_km = *distance_km;
                trip.total_days = *total_days;
                trip.total_cost = *total_cost;
                trip.profit = *profit;
            }
        }
        Event::TripStatusChanged { id, status, .. } => {
            if let Some(trip) = rs.trip_mut(id) {
                trip.status = *status;
            }
        }
        Event::TripCompleted { id, .. } => {
            if let Some(trip) = rs.trip_mut(id) {
                trip.completed = true;
            }
        }
        Event::ReviewPosted { review } => {
            review_by_trip.insert(review.trip_id, review.id);
            reviews.insert(review.id, review.clone());
        }
        Event::ReviewCommented { id, comment, .. } => {
            if let Some(mut review) = reviews.get_mut(id) {
                review.owner_comment = Some(comment.clone());
            }
        }
        // Top-level records are applied by `apply_registry`.
        Event::ProfileRegistered { .. } | Event::CarRegistered { .. } => {}
    }
}

#[async_trait]
impl TripStore for JournaledStore {
    async fn register_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        self.create_profile(profile).await
    }

    async fn profile(&self, id: ProfileId) -> Option<Profile> {
        self.profiles.get(&id).map(|p| p.value().clone())
    }

    async fn insert_car(&self, car: Car) -> Result<Car, StoreError> {
        self.create_car(car).await
    }

    async fn car(&self, id: CarId) -> Option<Car> {
        self.read_car(id).await
    }

    async fn cars_owned_by(&self, owner_id: ProfileId) -> Vec<Car> {
        self.list_owner_cars(owner_id).await
    }

    async fn update_car(&self, id: CarId, patch: CarPatch) -> Result<Car, StoreError> {
        self.patch_car(id, patch).await
    }

    async fn trip(&self, id: TripId) -> Option<Trip> {
        self.read_trip(id).await
    }

    async fn query(&self, car_id: CarId, predicate: TripPredicate) -> Result<Vec<Trip>, StoreError> {
        self.query_trips(car_id, predicate).await
    }

    async fn trips_owned_by(&self, owner_id: ProfileId) -> Vec<Trip> {
        self.list_owner_trips(owner_id).await
    }

    async fn insert_if_no_conflict(&self, trip: Trip, scope: ConflictScope) -> Result<Trip, StoreError> {
        self.book_trip(trip, scope).await
    }

    async fn update_if_no_conflict(
        &self,
        id: TripId,
        patch: TripPatch,
        scope: ConflictScope,
    ) -> Result<Trip, StoreError> {
        self.reschedule_trip(id, patch, scope).await
    }

    async fn transition_status(&self, id: TripId, status: CancellationStatus) -> Result<Trip, StoreError> {
        self.set_trip_status(id, status).await
    }

    async fn mark_completed(&self, id: TripId) -> Result<Trip, StoreError> {
        self.complete_trip(id).await
    }

    async fn insert_review(&self, review: Review) -> Result<Review, StoreError> {
        self.post_review(review).await
    }

    async fn comment_on_review(&self, id: ReviewId, comment: String) -> Result<Review, StoreError> {
        self.add_review_comment(id, comment).await
    }

    async fn review(&self, id: ReviewId) -> Option<Review> {
        self.reviews.get(&id).map(|r| r.value().clone())
    }

    async fn reviews(&self, query: ReviewQuery) -> Vec<Review> {
        self.list_reviews(query)
    }
}
