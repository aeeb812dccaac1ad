use ulid::Ulid;

use crate::model::DateRange;
use crate::store::StoreError;

/// Everything a ledger operation can report. All variants are recoverable
/// by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or missing input.
    Validation(String),
    /// Start date after end date.
    InvalidRange,
    /// Start date not far enough in the future.
    PastDate,
    /// The car is already booked for part of the range.
    Conflict { trip_id: Ulid, range: DateRange },
    /// Car missing, inactive, soft-deleted, or without a valid owner.
    ResourceUnavailable(String),
    NotFound(Ulid),
    Forbidden(&'static str),
    /// The trip's state does not allow the operation.
    State(String),
    DuplicateReview(Ulid),
    Storage(String),
}

impl LedgerError {
    /// Short machine-readable kind, used for metrics labels and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::InvalidRange => "invalid_range",
            LedgerError::PastDate => "past_date",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::ResourceUnavailable(_) => "resource_unavailable",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::State(_) => "state",
            LedgerError::DuplicateReview(_) => "duplicate_review",
            LedgerError::Storage(_) => "storage",
        }
    }

    pub fn conflicting_range(&self) -> Option<DateRange> {
        match self {
            LedgerError::Conflict { range, .. } => Some(*range),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "invalid request: {msg}"),
            LedgerError::InvalidRange => write!(f, "trip end date must not be before trip start date"),
            LedgerError::PastDate => write!(f, "trips cannot start today or in the past"),
            LedgerError::Conflict { range, .. } => write!(
                f,
                "the car is already booked from {} to {}; choose other dates",
                range.start, range.end
            ),
            LedgerError::ResourceUnavailable(why) => write!(f, "car unavailable: {why}"),
            LedgerError::NotFound(id) => write!(f, "not found: {id}"),
            LedgerError::Forbidden(action) => write!(f, "not allowed to {action}"),
            LedgerError::State(msg) => write!(f, "{msg}"),
            LedgerError::DuplicateReview(trip) => write!(f, "trip {trip} already has a review"),
            LedgerError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => LedgerError::NotFound(id),
            StoreError::Conflict { trip_id, range } => LedgerError::Conflict { trip_id, range },
            StoreError::Unavailable(id) => {
                LedgerError::ResourceUnavailable(format!("car {id} is inactive or deleted"))
            }
            StoreError::InvalidTransition { id, from } => {
                LedgerError::State(format!("trip {id} is {} and cannot change", from.label()))
            }
            StoreError::LimitExceeded(msg) => LedgerError::Validation(msg.to_string()),
            e @ (StoreError::AlreadyExists(_) | StoreError::JournalError(_)) => {
                LedgerError::Storage(e.to_string())
            }
        }
    }
}
