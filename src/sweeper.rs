use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::observability;
use crate::store::{JournaledStore, TripStore};

/// Mark every active trip that ended before `today` as completed. Returns
/// how many trips were marked.
pub async fn sweep_once(store: &JournaledStore, today: NaiveDate) -> usize {
    let mut marked = 0;
    for trip_id in store.collect_finished_trips(today).await {
        match store.mark_completed(trip_id).await {
            Ok(_) => marked += 1,
            // Cancelled or completed since it was collected.
            Err(e) => debug!("sweeper skip {trip_id}: {e}"),
        }
    }
    if marked > 0 {
        metrics::counter!(observability::TRIPS_COMPLETED_TOTAL).increment(marked as u64);
        info!("marked {marked} trip(s) completed");
    }
    marked
}

/// Background task that completes finished trips every `period`.
pub async fn run_completion_sweeper(store: Arc<JournaledStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        sweep_once(&store, Utc::now().date_naive()).await;
    }
}

/// Background task that rewrites the journal once `threshold` records have
/// been appended since the last rewrite.
pub async fn run_compactor(store: Arc<JournaledStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        metrics::gauge!(observability::CARS_LOADED).set(store.car_count() as f64);
        let appended = store.journal_appends_since_compact().await;
        if appended < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => {
                metrics::counter!(observability::JOURNAL_COMPACTIONS_TOTAL).increment(1);
                info!("compacted journal after {appended} appends");
            }
            Err(e) => warn!("journal compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::store::ConflictScope;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tripledger_test_sweeper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn book(store: &JournaledStore, car: &Car, start: &str, end: &str) -> Trip {
        let range = DateRange::new(d(start), d(end));
        let trip = Trip {
            id: Ulid::new(),
            car_id: car.id,
            owner_id: car.owner_id,
            booked_by: Ulid::new(),
            range,
            distance_km: 10,
            total_days: 1,
            customer_name: None,
            total_cost: Money(150),
            profit: Money(50),
            status: CancellationStatus::Active,
            completed: false,
        };
        store
            .insert_if_no_conflict(trip, ConflictScope::new(range))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sweep_completes_only_finished_active_trips() {
        let path = test_journal_path("sweep.journal");
        let store = JournaledStore::open(path, Arc::new(NotifyHub::new())).unwrap();
        let car = store
            .insert_car(Car {
                id: Ulid::new(),
                owner_id: Ulid::new(),
                model: "Ertiga".into(),
                car_number: "TN09CD4321".into(),
                pricing: Pricing {
                    price_per_km: Money(10),
                    driver_cost: Money(50),
                    extra_day_cost: Money(0),
                    mileage: Money(5),
                },
                active: true,
                deleted: false,
            })
            .await
            .unwrap();

        let done = book(&store, &car, "2024-06-01", "2024-06-03").await;
        let cancelled = book(&store, &car, "2024-06-04", "2024-06-05").await;
        store
            .transition_status(cancelled.id, CancellationStatus::CancelledFull)
            .await
            .unwrap();
        let ends_today = book(&store, &car, "2024-06-08", "2024-06-10").await;

        assert_eq!(sweep_once(&store, d("2024-06-10")).await, 1);
        assert!(store.trip(done.id).await.unwrap().completed);
        assert!(!store.trip(cancelled.id).await.unwrap().completed);
        assert!(!store.trip(ends_today.id).await.unwrap().completed);

        // Idempotent.
        assert_eq!(sweep_once(&store, d("2024-06-10")).await, 0);
    }
}
