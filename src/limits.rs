/// Cars kept in one store.
pub const MAX_CARS: usize = 100_000;

/// Trips (any status) kept per car.
pub const MAX_TRIPS_PER_CAR: usize = 50_000;

/// Longest bookable range in days.
pub const MAX_BOOKING_DAYS: i64 = 366;

/// Largest `total_days` accepted on a booking.
pub const MAX_TOTAL_DAYS: u32 = 366;

/// Largest trip distance in km.
pub const MAX_DISTANCE_KM: u32 = 1_000_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_CAR_NUMBER_LEN: usize = 32;
pub const MAX_REVIEW_LEN: usize = 4_096;
pub const MAX_COMMENT_LEN: usize = 2_048;

/// Highest rating value for both trip and car ratings.
pub const MAX_RATING: u8 = 5;
