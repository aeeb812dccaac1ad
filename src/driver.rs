//! JSON-lines front end: one [`Envelope`] per input line, one [`Response`]
//! per output line.
//!
//! ```text
//! {"identity":{"id":"01J…","role":"user"},"op":"book_trip","body":{"car_id":"01J…", …}}
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ledger::{Ledger, LedgerError, Schedule};
use crate::model::*;
use crate::observability;
use crate::request::*;
use crate::store::TripStore;

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub identity: Identity,
    /// Clock override, mainly for replaying scripted sessions.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", content = "body", rename_all = "snake_case")]
pub enum Request {
    RegisterProfile(RegisterProfileRequest),
    CreateCar(NewCarRequest),
    GetCar {
        car_id: CarId,
    },
    ListCars,
    UpdatePricing {
        car_id: CarId,
        #[serde(flatten)]
        pricing: PricingRequest,
    },
    ToggleActive {
        car_id: CarId,
    },
    DeleteCar {
        car_id: CarId,
    },
    BookTrip(BookTripRequest),
    EditTrip {
        trip_id: TripId,
        #[serde(flatten)]
        changes: EditTripRequest,
    },
    CancelTrip {
        trip_id: TripId,
    },
    GetTrip {
        trip_id: TripId,
    },
    ListTrips(TripFilterRequest),
    Schedule {
        car_id: CarId,
    },
    CreateReview {
        trip_id: TripId,
        #[serde(flatten)]
        review: NewReviewRequest,
    },
    CommentOnReview {
        review_id: ReviewId,
        #[serde(flatten)]
        comment: CommentRequest,
    },
    ReviewsForCar {
        car_id: CarId,
    },
    ReviewForTrip {
        trip_id: TripId,
    },
    ReviewsForOwner {
        #[serde(default)]
        owner_id: Option<ProfileId>,
    },
}

impl Request {
    /// Short label for metrics and logs.
    pub fn op(&self) -> &'static str {
        match self {
            Request::RegisterProfile(_) => "register_profile",
            Request::CreateCar(_) => "create_car",
            Request::GetCar { .. } => "get_car",
            Request::ListCars => "list_cars",
            Request::UpdatePricing { .. } => "update_pricing",
            Request::ToggleActive { .. } => "toggle_active",
            Request::DeleteCar { .. } => "delete_car",
            Request::BookTrip(_) => "book_trip",
            Request::EditTrip { .. } => "edit_trip",
            Request::CancelTrip { .. } => "cancel_trip",
            Request::GetTrip { .. } => "get_trip",
            Request::ListTrips(_) => "list_trips",
            Request::Schedule { .. } => "schedule",
            Request::CreateReview { .. } => "create_review",
            Request::CommentOnReview { .. } => "comment_on_review",
            Request::ReviewsForCar { .. } => "reviews_for_car",
            Request::ReviewForTrip { .. } => "review_for_trip",
            Request::ReviewsForOwner { .. } => "reviews_for_owner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        data: Value,
    },
    Error {
        kind: &'static str,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        conflicting_range: Option<DateRange>,
    },
}

impl From<&LedgerError> for Response {
    fn from(e: &LedgerError) -> Self {
        Response::Error {
            kind: e.kind(),
            message: e.to_string(),
            conflicting_range: e.conflicting_range(),
        }
    }
}

#[derive(Serialize)]
struct ScheduleView {
    car_id: CarId,
    trips: Vec<DateRange>,
    busy_blocks: Vec<DateRange>,
}

impl From<&Schedule> for ScheduleView {
    fn from(s: &Schedule) -> Self {
        ScheduleView {
            car_id: s.car_id,
            trips: s.iter().collect(),
            busy_blocks: s.busy_blocks(),
        }
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Storage(format!("encode response: {e}")))
}

/// Decode one input line and run it.
pub async fn handle_line<S: TripStore>(ledger: &Ledger<S>, line: &str) -> Response {
    match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => dispatch(ledger, envelope).await,
        Err(e) => {
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => "unknown", "outcome" => "bad_request")
                .increment(1);
            debug!("undecodable request: {e}");
            Response::Error {
                kind: "bad_request",
                message: e.to_string(),
                conflicting_range: None,
            }
        }
    }
}

pub async fn dispatch<S: TripStore>(ledger: &Ledger<S>, envelope: Envelope) -> Response {
    let op = envelope.request.op();
    let started = Instant::now();
    let now = envelope.now.unwrap_or_else(Utc::now);
    let result = execute(ledger, &envelope.identity, now, envelope.request).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(data) => Response::Ok { data },
        Err(e) => {
            if matches!(e, LedgerError::Storage(_)) {
                warn!("{op} failed: {e}");
            } else {
                debug!("{op} refused: {e}");
            }
            Response::from(&e)
        }
    }
}

async fn execute<S: TripStore>(
    ledger: &Ledger<S>,
    who: &Identity,
    now: DateTime<Utc>,
    request: Request,
) -> Result<Value, LedgerError> {
    match request {
        Request::RegisterProfile(req) => {
            let (full_name, role) = req.validate()?;
            encode(ledger.register_profile(who.id, full_name, role).await?)
        }
        Request::CreateCar(req) => encode(ledger.create_car(who, req.validate()?).await?),
        Request::GetCar { car_id } => encode(ledger.get_car(who, car_id).await?),
        Request::ListCars => encode(ledger.list_cars(who).await?),
        Request::UpdatePricing { car_id, pricing } => {
            encode(ledger.update_pricing(who, car_id, pricing.validate()?).await?)
        }
        Request::ToggleActive { car_id } => encode(ledger.toggle_active(who, car_id).await?),
        Request::DeleteCar { car_id } => encode(ledger.delete_car(who, car_id).await?),
        Request::BookTrip(req) => encode(ledger.book(who, req.validate()?, now).await?),
        Request::EditTrip { trip_id, changes } => {
            encode(ledger.edit(who, trip_id, changes.validate()?, now).await?)
        }
        Request::CancelTrip { trip_id } => encode(ledger.cancel(who, trip_id, now).await?),
        Request::GetTrip { trip_id } => encode(ledger.get_trip(who, trip_id).await?),
        Request::ListTrips(req) => encode(ledger.list_trips(who, req.validate()?).await?),
        Request::Schedule { car_id } => {
            let schedule = ledger.schedule(who, car_id).await?;
            encode(ScheduleView::from(&schedule))
        }
        Request::CreateReview { trip_id, review } => {
            encode(ledger.create_review(who, trip_id, review.validate()?).await?)
        }
        Request::CommentOnReview { review_id, comment } => {
            encode(ledger.comment_on_review(who, review_id, comment.validate()?).await?)
        }
        Request::ReviewsForCar { car_id } => encode(ledger.reviews_for_car(car_id).await),
        Request::ReviewForTrip { trip_id } => encode(ledger.review_for_trip(trip_id).await),
        Request::ReviewsForOwner { owner_id } => encode(ledger.reviews_for_owner(who, owner_id).await),
    }
}
