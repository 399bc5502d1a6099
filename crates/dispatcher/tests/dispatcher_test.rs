//! End-to-end dispatcher lifecycle tests with compressed timing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use ridehail_core::config::{DispatcherConfig, PoolConfig};
use ridehail_core::providers::InMemoryHistorySink;
use ridehail_core::traits::RideHistorySink;
use ridehail_dispatcher::{Dispatcher, DriverPool, NearestDriverStrategy, RideEvent};
use ridehail_domain::{CancelReason, Coordinate, Location, RideStatus};

const PICKUP: (f64, f64) = (37.7749, -122.4194);
const DESTINATION: (f64, f64) = (37.8049, -122.3994);

fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        match_delay_min_ms: 10,
        match_delay_max_ms: 30,
        average_speed_kmh: 30.0,
        tick_interval_ms: 10,
        arrival_threshold_km: 0.05,
        // a multi-kilometer leg finishes in well under a second
        time_scale: 600.0,
    }
}

fn pool_config(driver_count: usize) -> PoolConfig {
    PoolConfig {
        driver_count,
        center_lat: PICKUP.0,
        center_lng: PICKUP.1,
        spawn_radius_km: 5.0,
    }
}

fn build(
    config: DispatcherConfig,
    driver_count: usize,
) -> (Arc<Dispatcher>, Arc<DriverPool>, Arc<InMemoryHistorySink>) {
    let pool = Arc::new(DriverPool::seed(&pool_config(driver_count)));
    let history = Arc::new(InMemoryHistorySink::new());
    let strategy = Arc::new(NearestDriverStrategy::new(config.average_speed_kmh));
    let dispatcher = Dispatcher::new(
        config,
        Arc::clone(&pool),
        strategy,
        Arc::clone(&history) as Arc<dyn RideHistorySink>,
    );
    (dispatcher, pool, history)
}

fn pickup() -> Location {
    Location::new(PICKUP.0, PICKUP.1)
}

fn destination() -> Location {
    Location::new(DESTINATION.0, DESTINATION.1)
}

#[tokio::test]
async fn ride_cascades_through_the_full_status_sequence() {
    let (dispatcher, _pool, history) = build(fast_config(), 3);
    let mut events = dispatcher.subscribe();

    // nearest driver by straight-line distance, from the pre-request pool
    let pickup_point = Coordinate::new(PICKUP.0, PICKUP.1);
    let expected_driver = dispatcher
        .drivers()
        .await
        .into_iter()
        .min_by(|a, b| {
            pickup_point
                .haversine_km(&a.location)
                .total_cmp(&pickup_point.haversine_km(&b.location))
        })
        .unwrap()
        .id;

    let ride = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();
    assert_eq!(ride.status, RideStatus::Searching);

    let mut statuses = Vec::new();
    let deadline = Duration::from_secs(10);
    loop {
        let event = timeout(deadline, events.recv())
            .await
            .expect("ride should complete within the deadline")
            .unwrap();
        let RideEvent::RideUpdate(update) = event else {
            continue;
        };
        if update.ride_id != ride.ride_id {
            continue;
        }
        if statuses.last() != Some(&update.status) {
            statuses.push(update.status);
        }
        if update.status == RideStatus::Completed {
            assert_eq!(update.driver.as_ref().unwrap().id, expected_driver);
            break;
        }
    }

    assert_eq!(
        statuses,
        vec![
            RideStatus::Searching,
            RideStatus::Assigned,
            RideStatus::EnRoute,
            RideStatus::Arriving,
            RideStatus::InProgress,
            RideStatus::ApproachingDestination,
            RideStatus::Completed,
        ]
    );

    // history records exactly the completed trip
    sleep(Duration::from_millis(50)).await;
    let entries = history.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ride_id, ride.ride_id);
    assert!(entries[0].distance_km > 3.0);

    let stats = dispatcher.stats().await;
    assert_eq!(stats.completed_rides, 1);
    assert_eq!(stats.active_rides, 0);
    assert_eq!(stats.available_drivers, 3);
}

#[tokio::test]
async fn position_events_progress_monotonically() {
    let (dispatcher, _pool, _history) = build(fast_config(), 1);
    let mut events = dispatcher.subscribe();
    let ride = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();

    let mut last_progress = -1.0;
    let mut last_status = RideStatus::Searching;
    loop {
        let event = timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("ride should complete")
            .unwrap();
        match event {
            RideEvent::RideUpdate(update) if update.ride_id == ride.ride_id => {
                if update.status == RideStatus::Completed {
                    break;
                }
            }
            RideEvent::DriverPosition(update) if update.ride_id == ride.ride_id => {
                if update.status == last_status {
                    assert!(update.progress >= last_progress);
                } else {
                    // a new leg restarts progress from zero
                    last_status = update.status;
                }
                last_progress = update.progress;
                assert!(update.distance_remaining >= 0.0);
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn single_driver_is_never_double_booked() {
    let (dispatcher, _pool, _history) = build(fast_config(), 1);

    let first = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();
    let second = dispatcher
        .request_ride(Location::new(37.7649, -122.4294), destination())
        .await
        .unwrap();

    // both match delays have elapsed well before the winner's trip ends
    sleep(Duration::from_millis(300)).await;
    let first = dispatcher.ride(&first.ride_id).await.unwrap();
    let second = dispatcher.ride(&second.ride_id).await.unwrap();

    let (winner, loser) = if first.driver.is_some() {
        (first, second)
    } else {
        (second, first)
    };
    assert!(winner.driver.is_some());
    assert_eq!(loser.status, RideStatus::Cancelled);
    assert_eq!(
        loser.cancel_reason,
        Some(CancelReason::NoDriversAvailable)
    );
    assert!(loser.driver.is_none());
}

#[tokio::test]
async fn cancel_during_search_stops_the_lifecycle() {
    let config = DispatcherConfig {
        match_delay_min_ms: 5_000,
        match_delay_max_ms: 6_000,
        ..fast_config()
    };
    let (dispatcher, pool, _history) = build(config, 2);
    let mut events = dispatcher.subscribe();

    let ride = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    let cancelled = dispatcher.cancel_ride(&ride.ride_id).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::RiderRequested));
    assert!(cancelled.driver.is_none());

    // cancelling again is a no-op returning the same terminal ride
    let again = dispatcher.cancel_ride(&ride.ride_id).await.unwrap();
    assert_eq!(again.status, RideStatus::Cancelled);
    assert_eq!(again.updated_at, cancelled.updated_at);

    // nothing further is published for this ride after the cancel update
    let mut saw_cancelled = false;
    loop {
        match timeout(Duration::from_millis(200), events.recv()).await {
            Ok(Ok(event)) => {
                if event.ride_id() == ride.ride_id {
                    assert!(!saw_cancelled, "event published after cancellation");
                    if let RideEvent::RideUpdate(update) = event {
                        if update.status == RideStatus::Cancelled {
                            saw_cancelled = true;
                        }
                    }
                }
            }
            _ => break,
        }
    }
    assert!(saw_cancelled);
    assert_eq!(pool.available_count().await, 2);
}

#[tokio::test]
async fn cancel_mid_trip_releases_the_driver() {
    let config = DispatcherConfig {
        // slow legs so the ride is reliably mid-leg when we cancel
        time_scale: 2.0,
        ..fast_config()
    };
    let (dispatcher, pool, history) = build(config, 1);

    let ride = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();

    // wait for the approach leg to start
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = dispatcher.ride(&ride.ride_id).await.unwrap();
        if current.status == RideStatus::EnRoute || current.status == RideStatus::Arriving {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "ride never left searching: {:?}",
            current.status
        );
        sleep(Duration::from_millis(10)).await;
    }

    let cancelled = dispatcher.cancel_ride(&ride.ride_id).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);

    // the lifecycle winds down and the driver returns to the pool
    sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.available_count().await, 1);
    let after = dispatcher.ride(&ride.ride_id).await.unwrap();
    assert_eq!(after.status, RideStatus::Cancelled);
    assert!(history.entries().await.is_empty());
}

#[tokio::test]
async fn released_driver_keeps_their_fresh_spawn_point() {
    let config = DispatcherConfig {
        // slow legs so ticks are still flowing when the cancel lands
        time_scale: 2.0,
        ..fast_config()
    };
    let (dispatcher, pool, _history) = build(config, 1);

    let ride = dispatcher
        .request_ride(pickup(), destination())
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = dispatcher.ride(&ride.ride_id).await.unwrap();
        if current.status == RideStatus::EnRoute || current.status == RideStatus::Arriving {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "ride never left searching: {:?}",
            current.status
        );
        sleep(Duration::from_millis(10)).await;
    }

    dispatcher.cancel_ride(&ride.ride_id).await.unwrap();

    // wait for the release, then make sure no stale leg tick moves the
    // driver off the spawn point the release picked
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while pool.available_count().await == 0 {
        assert!(tokio::time::Instant::now() < deadline, "driver never released");
        sleep(Duration::from_millis(10)).await;
    }
    let spawn = dispatcher.drivers().await[0].location;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(dispatcher.drivers().await[0].location, spawn);
}

#[tokio::test]
async fn out_of_range_coordinates_are_rejected() {
    let (dispatcher, _pool, _history) = build(fast_config(), 1);

    let err = dispatcher
        .request_ride(Location::new(95.0, -122.4194), destination())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ridehail_domain::RideHailError::InvalidPickup(_)
    ));

    let err = dispatcher
        .request_ride(pickup(), Location::new(37.0, -190.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ridehail_domain::RideHailError::InvalidDestination(_)
    ));

    assert_eq!(dispatcher.stats().await.active_rides, 0);
}

#[tokio::test]
async fn unknown_ride_lookups_fail_cleanly() {
    let (dispatcher, _pool, _history) = build(fast_config(), 1);
    assert!(dispatcher.ride("nope").await.is_err());
    assert!(dispatcher.cancel_ride("nope").await.is_err());
}
