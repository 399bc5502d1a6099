//! Full-stack tests: a `RideFlowController` driving a live dispatch server
//! over real HTTP on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use ridehail_api::{create_routes, AppState};
use ridehail_core::config::{DispatcherConfig, FlowConfig, PoolConfig, TransportConfig};
use ridehail_core::providers::{FixedCityGeocoder, InMemoryHistorySink, StraightLineRouteProvider};
use ridehail_dispatcher::{Dispatcher, DriverPool, NearestDriverStrategy};
use ridehail_domain::{Coordinate, RideState, RideStatus};
use ridehail_flow::{RideFlowController, TransportClient};

const CENTER: Coordinate = Coordinate {
    lat: 37.7749,
    lng: -122.4194,
};

async fn start_server(config: DispatcherConfig) -> (String, Arc<Dispatcher>) {
    let pool = Arc::new(DriverPool::seed(&PoolConfig {
        driver_count: 3,
        center_lat: CENTER.lat,
        center_lng: CENTER.lng,
        spawn_radius_km: 2.0,
    }));
    let strategy = Arc::new(NearestDriverStrategy::new(config.average_speed_kmh));
    let history = Arc::new(InMemoryHistorySink::new());
    let dispatcher = Dispatcher::new(config, pool, strategy, history);

    let router = create_routes(AppState {
        dispatcher: Arc::clone(&dispatcher),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), dispatcher)
}

fn fast_dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        match_delay_min_ms: 10,
        match_delay_max_ms: 30,
        average_speed_kmh: 30.0,
        tick_interval_ms: 10,
        arrival_threshold_km: 0.05,
        time_scale: 600.0,
    }
}

fn controller_for(base_url: &str) -> Arc<RideFlowController> {
    let transport = Arc::new(
        TransportClient::from_config(&TransportConfig {
            base_url: base_url.to_string(),
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter_factor: 0.0,
            request_timeout_ms: 2000,
        })
        .unwrap(),
    );
    let geocoder = Arc::new(FixedCityGeocoder::new(CENTER));
    let routes = Arc::new(StraightLineRouteProvider::new(30.0));
    RideFlowController::new(
        FlowConfig {
            search_poll_interval_ms: 20,
            active_poll_interval_ms: 20,
            debounce_ms: 10,
            min_movement_km: 0.05,
        },
        geocoder,
        routes,
        transport,
    )
}

async fn submit_ride(flow: &Arc<RideFlowController>) {
    flow.begin_selection().await;
    flow.set_pickup("500 Market St").await;
    flow.set_destination("1 Ferry Plaza").await;
    let state = flow.compute_route().await;
    assert_eq!(state.phase(), "routeReady");
    let state = flow.request_ride().await;
    assert_ne!(state.phase(), "error", "ride submission failed: {state:?}");
}

async fn wait_for_phase(flow: &Arc<RideFlowController>, phase: &str) -> RideState {
    let mut rx = flow.subscribe();
    timeout(Duration::from_secs(10), async {
        loop {
            {
                let state = rx.borrow_and_update().clone();
                if state.phase() == phase {
                    return state;
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {phase}"))
}

#[tokio::test]
async fn rider_completes_a_trip_against_a_live_server() {
    let (base_url, dispatcher) = start_server(fast_dispatcher_config()).await;
    let flow = controller_for(&base_url);

    submit_ride(&flow).await;
    let completed = wait_for_phase(&flow, "rideCompleted").await;
    match completed {
        RideState::RideCompleted {
            ride_id, driver, ..
        } => {
            assert!(!driver.name.is_empty());
            let ride = dispatcher.ride(&ride_id).await.unwrap();
            assert_eq!(ride.status, RideStatus::Completed);
        }
        other => panic!("unexpected state: {other:?}"),
    }

    let stats = dispatcher.stats().await;
    assert_eq!(stats.completed_rides, 1);
    assert_eq!(stats.available_drivers, 3);

    let state = flow.reset().await;
    assert_eq!(state.phase(), "idle");
}

#[tokio::test]
async fn cancelling_mid_search_cancels_on_the_server_too() {
    let mut config = fast_dispatcher_config();
    config.match_delay_min_ms = 2000;
    config.match_delay_max_ms = 3000;
    let (base_url, dispatcher) = start_server(config).await;
    let flow = controller_for(&base_url);

    submit_ride(&flow).await;
    let searching = wait_for_phase(&flow, "searchingForDriver").await;
    let ride_id = match searching {
        RideState::SearchingForDriver { ride_id, .. } => ride_id,
        other => panic!("unexpected state: {other:?}"),
    };

    let state = flow.cancel_ride().await;
    assert_eq!(state.phase(), "idle");

    // the server-side cancel is fired after local teardown
    sleep(Duration::from_millis(300)).await;
    let ride = dispatcher.ride(&ride_id).await.unwrap();
    assert_eq!(ride.status, RideStatus::Cancelled);
    assert_eq!(dispatcher.stats().await.available_drivers, 3);
}

#[tokio::test]
async fn concurrent_riders_are_served_from_the_same_pool() {
    let (base_url, dispatcher) = start_server(fast_dispatcher_config()).await;

    let first = controller_for(&base_url);
    let second = controller_for(&base_url);
    submit_ride(&first).await;
    submit_ride(&second).await;

    wait_for_phase(&first, "rideCompleted").await;
    wait_for_phase(&second, "rideCompleted").await;

    let stats = dispatcher.stats().await;
    assert_eq!(stats.completed_rides, 2);
    assert_eq!(stats.active_rides, 0);
    assert_eq!(stats.available_drivers, 3);
}
