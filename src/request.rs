//! Request bodies as they arrive from the outside world. Every field is
//! optional on the wire; `validate` turns a body into a typed command or
//! names the first field that is missing or malformed.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::ledger::{BookTrip, EditTrip, LedgerError, NewCar, NewReview, TripFilter};
use crate::model::{CarId, Money, Pricing, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::Validation(e.to_string())
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError {
        field,
        reason: "is required",
    })
}

fn require_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(ValidationError {
            field,
            reason: "must not be blank",
        }),
        None => Err(ValidationError {
            field,
            reason: "is required",
        }),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookTripRequest {
    pub car_id: Option<CarId>,
    pub trip_start_date: Option<NaiveDate>,
    pub trip_end_date: Option<NaiveDate>,
    pub total_distance: Option<u32>,
    pub total_days: Option<u32>,
    pub customer_name: Option<String>,
}

impl BookTripRequest {
    pub fn validate(self) -> Result<BookTrip, ValidationError> {
        Ok(BookTrip {
            car_id: require(self.car_id, "car_id")?,
            start: require(self.trip_start_date, "trip_start_date")?,
            end: require(self.trip_end_date, "trip_end_date")?,
            distance_km: require(self.total_distance, "total_distance")?,
            total_days: require(self.total_days, "total_days")?,
            customer_name: self.customer_name.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditTripRequest {
    pub trip_start_date: Option<NaiveDate>,
    pub trip_end_date: Option<NaiveDate>,
    pub total_distance: Option<u32>,
    pub total_days: Option<u32>,
}

impl EditTripRequest {
    pub fn validate(self) -> Result<EditTrip, ValidationError> {
        Ok(EditTrip {
            start: require(self.trip_start_date, "trip_start_date")?,
            end: require(self.trip_end_date, "trip_end_date")?,
            distance_km: require(self.total_distance, "total_distance")?,
            total_days: require(self.total_days, "total_days")?,
        })
    }
}

/// Amounts are integers in minor currency units.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingRequest {
    pub price_per_km: Option<i64>,
    pub driver_cost: Option<i64>,
    pub extra_day_cost: Option<i64>,
    pub mileage: Option<i64>,
}

impl PricingRequest {
    pub fn validate(self) -> Result<Pricing, ValidationError> {
        Ok(Pricing {
            price_per_km: Money(require(self.price_per_km, "price_per_km")?),
            driver_cost: Money(self.driver_cost.unwrap_or(0)),
            extra_day_cost: Money(self.extra_day_cost.unwrap_or(0)),
            mileage: Money(require(self.mileage, "mileage")?),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCarRequest {
    pub model: Option<String>,
    pub car_number: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingRequest,
}

impl NewCarRequest {
    pub fn validate(self) -> Result<NewCar, ValidationError> {
        Ok(NewCar {
            model: require_text(self.model, "model")?,
            car_number: require_text(self.car_number, "car_number")?,
            pricing: self.pricing.validate()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReviewRequest {
    pub rating: Option<u8>,
    pub car_rating: Option<u8>,
    pub review: Option<String>,
}

impl NewReviewRequest {
    pub fn validate(self) -> Result<NewReview, ValidationError> {
        Ok(NewReview {
            rating: require(self.rating, "rating")?,
            car_rating: require(self.car_rating, "car_rating")?,
            review: self.review,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
}

impl CommentRequest {
    pub fn validate(self) -> Result<String, ValidationError> {
        require_text(self.comment, "comment")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilterRequest {
    /// `YYYY-MM`
    pub month: Option<String>,
    pub car_id: Option<CarId>,
    pub completed: Option<bool>,
}

impl TripFilterRequest {
    pub fn validate(self) -> Result<TripFilter, ValidationError> {
        let month = match self.month.as_deref() {
            None | Some("") => None,
            Some(m) => Some(parse_month(m).ok_or(ValidationError {
                field: "month",
                reason: "must look like YYYY-MM",
            })?),
        };
        Ok(TripFilter {
            month,
            car_id: self.car_id,
            completed: self.completed,
        })
    }
}

fn parse_month(raw: &str) -> Option<NaiveDate> {
    let (year, month) = raw.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterProfileRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
}

impl RegisterProfileRequest {
    pub fn validate(self) -> Result<(String, Role), ValidationError> {
        Ok((
            require_text(self.full_name, "full_name")?,
            self.role.unwrap_or(Role::User),
        ))
    }
}
