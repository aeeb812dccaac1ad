use ulid::Ulid;

use crate::model::{CancellationStatus, DateRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// An active trip already occupies part of the requested range.
    Conflict { trip_id: Ulid, range: DateRange },
    /// The car is inactive or soft-deleted.
    Unavailable(Ulid),
    /// The trip is not in a state that allows the requested change.
    InvalidTransition { id: Ulid, from: CancellationStatus },
    LimitExceeded(&'static str),
    JournalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            StoreError::Conflict { trip_id, range } => {
                write!(f, "conflict with trip {trip_id} booked for {range}")
            }
            StoreError::Unavailable(id) => write!(f, "car {id} is not accepting bookings"),
            StoreError::InvalidTransition { id, from } => {
                write!(f, "trip {id} cannot change from {}", from.label())
            }
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::JournalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
