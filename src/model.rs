use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type CarId = Ulid;
pub type TripId = Ulid;
pub type ProfileId = Ulid;
pub type ReviewId = Ulid;

/// Amount in minor currency units. All ledger arithmetic is integral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive calendar-day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// `None` when `start > end`.
    pub fn checked(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of calendar days covered, bounds included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Two inclusive ranges overlap iff they share at least one day.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Owner,
}

/// An already-authenticated caller. Every ledger operation takes one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: ProfileId,
    pub role: Role,
}

impl Identity {
    pub fn owner(id: ProfileId) -> Self {
        Self { id, role: Role::Owner }
    }

    pub fn user(id: ProfileId) -> Self {
        Self { id, role: Role::User }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub full_name: String,
    pub role: Role,
}

/// Cost parameters of a car, all per the car's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub price_per_km: Money,
    pub driver_cost: Money,
    pub extra_day_cost: Money,
    /// Running (fuel) cost per km, subtracted when computing profit.
    pub mileage: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub owner_id: ProfileId,
    pub model: String,
    pub car_number: String,
    pub pricing: Pricing,
    pub active: bool,
    pub deleted: bool,
}

impl Car {
    pub fn is_bookable(&self) -> bool {
        self.active && !self.deleted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    Active,
    /// Cancelled with at least two days of lead time.
    CancelledFull,
    /// Cancelled the day before the start; the booking party is charged.
    CancelledPartial,
}

impl CancellationStatus {
    pub fn is_cancelled(self) -> bool {
        !matches!(self, CancellationStatus::Active)
    }

    pub fn label(self) -> &'static str {
        match self {
            CancellationStatus::Active => "active",
            CancellationStatus::CancelledFull => "cancelled_full",
            CancellationStatus::CancelledPartial => "cancelled_partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub car_id: CarId,
    pub owner_id: ProfileId,
    pub booked_by: ProfileId,
    pub range: DateRange,
    pub distance_km: u32,
    pub total_days: u32,
    pub customer_name: Option<String>,
    pub total_cost: Money,
    pub profit: Money,
    pub status: CancellationStatus,
    pub completed: bool,
}

impl Trip {
    pub fn is_active(&self) -> bool {
        !self.status.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub trip_id: TripId,
    pub car_id: CarId,
    pub owner_id: ProfileId,
    pub author_id: ProfileId,
    pub rating: u8,
    pub car_rating: u8,
    pub review: Option<String>,
    pub owner_comment: Option<String>,
}

/// Journal record. Replaying these in order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProfileRegistered {
        profile: Profile,
    },
    CarRegistered {
        car: Car,
    },
    CarPricingUpdated {
        id: CarId,
        pricing: Pricing,
    },
    CarActiveSet {
        id: CarId,
        active: bool,
    },
    CarDeleted {
        id: CarId,
    },
    TripBooked {
        trip: Trip,
    },
    TripRescheduled {
        id: TripId,
        car_id: CarId,
        range: DateRange,
        distance_km: u32,
        total_days: u32,
        total_cost: Money,
        profit: Money,
    },
    TripStatusChanged {
        id: TripId,
        car_id: CarId,
        status: CancellationStatus,
    },
    TripCompleted {
        id: TripId,
        car_id: CarId,
    },
    ReviewPosted {
        review: Review,
    },
    ReviewCommented {
        id: ReviewId,
        car_id: CarId,
        comment: String,
    },
}

impl Event {
    /// The car whose lock guards this record, if any.
    pub fn car_id(&self) -> Option<CarId> {
        match self {
            Event::ProfileRegistered { .. } => None,
            Event::CarRegistered { car } => Some(car.id),
            Event::CarPricingUpdated { id, .. }
            | Event::CarActiveSet { id, .. }
            | Event::CarDeleted { id } => Some(*id),
            Event::TripBooked { trip } => Some(trip.car_id),
            Event::TripRescheduled { car_id, .. }
            | Event::TripStatusChanged { car_id, .. }
            | Event::TripCompleted { car_id, .. }
            | Event::ReviewCommented { car_id, .. } => Some(*car_id),
            Event::ReviewPosted { review } => Some(review.car_id),
        }
    }
}

/// Start of `day` as a UTC instant.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn range_days_inclusive() {
        let r = DateRange::new(d("2024-06-10"), d("2024-06-15"));
        assert_eq!(r.days(), 6);
        assert_eq!(DateRange::new(d("2024-06-10"), d("2024-06-10")).days(), 1);
    }

    #[test]
    fn shared_boundary_day_overlaps() {
        let a = DateRange::new(d("2024-06-10"), d("2024-06-15"));
        let b = DateRange::new(d("2024-06-15"), d("2024-06-20"));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn adjacent_days_do_not_overlap() {
        let a = DateRange::new(d("2024-06-10"), d("2024-06-14"));
        let b = DateRange::new(d("2024-06-15"), d("2024-06-20"));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn containment_overlaps() {
        let outer = DateRange::new(d("2024-06-01"), d("2024-06-30"));
        let inner = DateRange::new(d("2024-06-10"), d("2024-06-12"));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(outer.contains_day(d("2024-06-30")));
        assert!(!inner.contains_day(d("2024-06-13")));
    }

    #[test]
    fn checked_rejects_inverted() {
        assert!(DateRange::checked(d("2024-06-11"), d("2024-06-10")).is_none());
        assert!(DateRange::checked(d("2024-06-10"), d("2024-06-10")).is_some());
    }

    #[test]
    fn status_helpers() {
        assert!(!CancellationStatus::Active.is_cancelled());
        assert!(CancellationStatus::CancelledFull.is_cancelled());
        assert!(CancellationStatus::CancelledPartial.is_cancelled());
        assert_eq!(CancellationStatus::CancelledPartial.label(), "cancelled_partial");
    }

    #[test]
    fn car_bookable_flags() {
        let mut car = Car {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            model: "Swift".into(),
            car_number: "KA01AB1234".into(),
            pricing: Pricing {
                price_per_km: Money(10),
                driver_cost: Money(50),
                extra_day_cost: Money(20),
                mileage: Money(5),
            },
            active: true,
            deleted: false,
        };
        assert!(car.is_bookable());
        car.active = false;
        assert!(!car.is_bookable());
        car.active = true;
        car.deleted = true;
        assert!(!car.is_bookable());
    }

    #[test]
    fn event_bincode_roundtrip() {
        let event = Event::TripStatusChanged {
            id: Ulid::new(),
            car_id: Ulid::new(),
            status: CancellationStatus::CancelledFull,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn day_start_is_midnight_utc() {
        let t = day_start(d("2024-06-10"));
        assert_eq!(t.to_rfc3339(), "2024-06-10T00:00:00+00:00");
    }
}
