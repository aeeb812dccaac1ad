use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use tripledger::ledger::{BookTrip, Ledger, LedgerError, NewCar};
use tripledger::model::*;
use tripledger::notify::NotifyHub;
use tripledger::store::JournaledStore;

// ── Test infrastructure ──────────────────────────────────────

fn journal_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tripledger_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("trips.journal")
}

fn open(path: &PathBuf) -> (Ledger<JournaledStore>, Arc<NotifyHub>) {
    let notify = Arc::new(NotifyHub::new());
    let store = JournaledStore::open(path.clone(), notify.clone()).unwrap();
    (Ledger::new(Arc::new(store)), notify)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 7, 10, 0, 0).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap() + Days::new(offset)
}

async fn setup_fleet(ledger: &Ledger<JournaledStore>, cars: usize) -> (Identity, Vec<Car>) {
    let owner = Identity::owner(Ulid::new());
    assert_ok!(
        ledger
            .register_profile(owner.id, "Fleet Owner".into(), Role::Owner)
            .await
    );
    let mut fleet = Vec::new();
    for i in 0..cars {
        let car = ledger
            .create_car(
                &owner,
                NewCar {
                    model: "Ertiga".into(),
                    car_number: format!("KA01 F {i:04}"),
                    pricing: Pricing {
                        price_per_km: Money(12),
                        driver_cost: Money(400),
                        extra_day_cost: Money(300),
                        mileage: Money(6),
                    },
                },
            )
            .await
            .unwrap();
        fleet.push(car);
    }
    (owner, fleet)
}

fn assert_disjoint(ranges: &[DateRange]) {
    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

/// Many callers racing for staggered, mostly overlapping windows on a few
/// cars. Whatever wins, no car ends up double-booked, and every loser
/// hears about the conflict.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_bookings_never_double_book() {
    let path = journal_path();
    let (ledger, _notify) = open(&path);
    let (owner, fleet) = setup_fleet(&ledger, 3).await;

    let attempts = fleet.iter().flat_map(|car| {
        (0..40u64).map(move |i| BookTrip {
            car_id: car.id,
            start: day(i % 10),
            end: day(i % 10 + 2),
            distance_km: 250,
            total_days: 3,
            customer_name: None,
        })
    });
    let tasks = attempts.map(|cmd| {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            let who = Identity::user(Ulid::new());
            ledger.book(&who, cmd, now()).await
        })
    });
    let results = join_all(tasks).await;

    let mut booked = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => booked += 1,
            Err(LedgerError::Conflict { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(booked >= fleet.len());

    let mut total = 0;
    for car in &fleet {
        let schedule = ledger.schedule(&owner, car.id).await.unwrap();
        let ranges: Vec<_> = schedule.iter().collect();
        assert_disjoint(&ranges);
        total += ranges.len();
    }
    assert_eq!(total, booked);
}

#[tokio::test]
async fn bookings_survive_restart() {
    let path = journal_path();
    let (owner, car, trip) = {
        let (ledger, _notify) = open(&path);
        let (owner, fleet) = setup_fleet(&ledger, 1).await;
        let trip = ledger
            .book(
                &Identity::user(Ulid::new()),
                BookTrip {
                    car_id: fleet[0].id,
                    start: day(0),
                    end: day(5),
                    distance_km: 100,
                    total_days: 6,
                    customer_name: Some("Asha".into()),
                },
                now(),
            )
            .await
            .unwrap();
        (owner, fleet[0].clone(), trip)
    };

    let (ledger, _notify) = open(&path);
    let stored = ledger.get_trip(&owner, trip.id).await.unwrap();
    assert_eq!(stored, trip);

    // The restored trip still blocks its range.
    let clash = ledger
        .book(
            &Identity::user(Ulid::new()),
            BookTrip {
                car_id: car.id,
                start: day(5),
                end: day(7),
                distance_km: 50,
                total_days: 3,
                customer_name: None,
            },
            now(),
        )
        .await;
    assert_err!(&clash);
    assert_eq!(clash.unwrap_err().conflicting_range(), Some(trip.range));
}

#[tokio::test]
async fn calendar_subscribers_see_commits() {
    let path = journal_path();
    let (ledger, notify) = open(&path);
    let (_owner, fleet) = setup_fleet(&ledger, 1).await;
    let mut rx = notify.subscribe(fleet[0].id);

    let trip = ledger
        .book(
            &Identity::user(Ulid::new()),
            BookTrip {
                car_id: fleet[0].id,
                start: day(1),
                end: day(2),
                distance_km: 80,
                total_days: 2,
                customer_name: None,
            },
            now(),
        )
        .await
        .unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, Event::TripBooked { trip });
}
