use tracing::info;
use ulid::Ulid;

use crate::limits::{MAX_COMMENT_LEN, MAX_RATING, MAX_REVIEW_LEN};
use crate::model::*;
use crate::store::{ReviewQuery, StoreError, TripStore};

use super::{require_owner, Ledger, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub rating: u8,
    pub car_rating: u8,
    pub review: Option<String>,
}

impl<S: TripStore> Ledger<S> {
    /// Review a completed trip. Only the booking party may review, once.
    pub async fn create_review(&self, who: &Identity, trip_id: TripId, cmd: NewReview) -> Result<Review, LedgerError> {
        let trip = self
            .store
            .trip(trip_id)
            .await
            .filter(|t| t.booked_by == who.id)
            .ok_or(LedgerError::NotFound(trip_id))?;
        if !trip.is_active() {
            return Err(LedgerError::State(format!("trip {trip_id} was cancelled")));
        }
        if !trip.completed {
            return Err(LedgerError::State(format!("trip {trip_id} is not completed yet")));
        }
        if cmd.rating > MAX_RATING || cmd.car_rating > MAX_RATING {
            return Err(LedgerError::Validation(format!(
                "ratings must be between 0 and {MAX_RATING}"
            )));
        }
        let text = cmd.review.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if text.as_ref().is_some_and(|r| r.len() > MAX_REVIEW_LEN) {
            return Err(LedgerError::Validation("review too long".into()));
        }

        let review = Review {
            id: Ulid::new(),
            trip_id,
            car_id: trip.car_id,
            owner_id: trip.owner_id,
            author_id: who.id,
            rating: cmd.rating,
            car_rating: cmd.car_rating,
            review: text,
            owner_comment: None,
        };
        let review = self
            .detached(move |store| async move {
                store.insert_review(review).await.map_err(|e| match e {
                    StoreError::AlreadyExists(_) => LedgerError::DuplicateReview(trip_id),
                    e => e.into(),
                })
            })
            .await?;
        info!("review {} posted on trip {trip_id}", review.id);
        Ok(review)
    }

    /// Reply to a review of one of the caller's cars. A later reply
    /// replaces the earlier one.
    pub async fn comment_on_review(
        &self,
        who: &Identity,
        review_id: ReviewId,
        comment: String,
    ) -> Result<Review, LedgerError> {
        require_owner(who, "comment on reviews")?;
        self.store
            .review(review_id)
            .await
            .filter(|r| r.owner_id == who.id)
            .ok_or(LedgerError::NotFound(review_id))?;
        let comment = comment.trim().to_string();
        if comment.is_empty() {
            return Err(LedgerError::Validation("comment must not be empty".into()));
        }
        if comment.len() > MAX_COMMENT_LEN {
            return Err(LedgerError::Validation("comment too long".into()));
        }
        self.detached(move |store| async move { store.comment_on_review(review_id, comment).await })
            .await
    }

    pub async fn reviews_for_car(&self, car_id: CarId) -> Vec<Review> {
        self.store.reviews(ReviewQuery::Car(car_id)).await
    }

    pub async fn review_for_trip(&self, trip_id: TripId) -> Option<Review> {
        self.store.reviews(ReviewQuery::Trip(trip_id)).await.into_iter().next()
    }

    /// Reviews of every car owned by `owner_id`, defaulting to the caller.
    pub async fn reviews_for_owner(&self, who: &Identity, owner_id: Option<ProfileId>) -> Vec<Review> {
        self.store
            .reviews(ReviewQuery::Owner(owner_id.unwrap_or(who.id)))
            .await
    }
}
