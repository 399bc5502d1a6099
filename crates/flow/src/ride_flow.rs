//! Rider-side flow controller.
//!
//! Owns one [`RideState`] machine and serializes every mutation through the
//! state mutex. External input (location edits, route requests, ride
//! submission) and the status-poll loop both funnel into the machine;
//! whatever the machine refuses is either soft-failed into an `error` state
//! (user-initiated) or dropped (stale poll results).
//!
//! Cancellation discipline: `cancel_ride` and `reset` first bump the
//! generation counter and signal the poll-loop watch channel, then move the
//! machine to `idle`. Every async continuation re-checks its captured
//! generation (or the cancel flag) before committing, so nothing observable
//! mutates after a cancel returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use ridehail_core::config::FlowConfig;
use ridehail_core::traits::{Geocoder, RouteProvider};
use ridehail_domain::{
    ride_machine, CancelReason, Location, Ride, RideHailError, RideState, RideStatus,
    RouteSummary,
};

use crate::transport::TransportClient;

/// Which end of the trip a geocoding edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationSlot {
    Pickup,
    Destination,
}

pub struct RideFlowController {
    config: FlowConfig,
    geocoder: Arc<dyn Geocoder>,
    routes: Arc<dyn RouteProvider>,
    transport: Arc<TransportClient>,
    state: Mutex<RideState>,
    state_tx: watch::Sender<RideState>,
    /// Bumped by every user-initiated operation; async continuations
    /// compare against their captured value and discard stale results.
    generation: AtomicU64,
    poll_cancel: Mutex<Option<watch::Sender<bool>>>,
    last_driver_position: Mutex<Option<ridehail_domain::Coordinate>>,
    /// Latest recomputed route for the current leg, display-only.
    live_route: Mutex<Option<RouteSummary>>,
    route_epoch: AtomicU64,
}

impl RideFlowController {
    pub fn new(
        config: FlowConfig,
        geocoder: Arc<dyn Geocoder>,
        routes: Arc<dyn RouteProvider>,
        transport: Arc<TransportClient>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(RideState::Idle);
        Arc::new(Self {
            config,
            geocoder,
            routes,
            transport,
            state: Mutex::new(RideState::Idle),
            state_tx,
            generation: AtomicU64::new(0),
            poll_cancel: Mutex::new(None),
            last_driver_position: Mutex::new(None),
            live_route: Mutex::new(None),
            route_epoch: AtomicU64::new(0),
        })
    }

    /// Observe every state the machine passes through.
    pub fn subscribe(&self) -> watch::Receiver<RideState> {
        self.state_tx.subscribe()
    }

    pub async fn state(&self) -> RideState {
        self.state.lock().await.clone()
    }

    /// The most recent recomputed route for the active leg, if any.
    pub async fn live_route(&self) -> Option<RouteSummary> {
        self.live_route.lock().await.clone()
    }

    pub async fn begin_selection(&self) -> RideState {
        self.apply(RideState::SelectingLocations {
            pickup: None,
            destination: None,
        })
        .await
    }

    /// Geocode a pickup query after the debounce window. A newer edit
    /// supersedes this one; superseded edits change nothing.
    pub async fn set_pickup(&self, query: &str) -> RideState {
        self.set_location(LocationSlot::Pickup, query).await
    }

    pub async fn set_destination(&self, query: &str) -> RideState {
        self.set_location(LocationSlot::Destination, query).await
    }

    async fn set_location(&self, slot: LocationSlot, query: &str) -> RideState {
        let token = self.bump_generation();
        sleep(Duration::from_millis(self.config.debounce_ms)).await;
        if self.generation.load(Ordering::SeqCst) != token {
            debug!(?slot, query, "edit superseded during debounce");
            return self.state().await;
        }

        let geocoded = self.geocoder.geocode(query).await;

        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) != token {
            return state.clone();
        }
        let next = match geocoded {
            Err(kind) => RideState::Error {
                kind,
                previous: Some(Box::new(state.clone())),
            },
            Ok((coordinate, formatted)) => {
                let (mut pickup, mut destination) = selected_locations(&state);
                let location = Location::with_address(coordinate.lat, coordinate.lng, formatted);
                match slot {
                    LocationSlot::Pickup => pickup = Some(location),
                    LocationSlot::Destination => destination = Some(location),
                }
                ride_machine::transition(
                    &state,
                    RideState::SelectingLocations {
                        pickup,
                        destination,
                    },
                )
            }
        };
        *state = next.clone();
        let _ = self.state_tx.send(next.clone());
        next
    }

    /// Compute the route between the selected endpoints, moving to
    /// `routeReady` on success.
    pub async fn compute_route(&self) -> RideState {
        let token = self.bump_generation();
        let (pickup, destination) = {
            let state = self.state.lock().await;
            let (pickup, destination) = selected_locations(&state);
            match (pickup, destination) {
                (Some(p), Some(d)) => (p, d),
                (None, _) => {
                    return self
                        .fail(RideHailError::invalid_pickup("no pickup selected"))
                        .await
                }
                (_, None) => {
                    return self
                        .fail(RideHailError::invalid_destination("no destination selected"))
                        .await
                }
            }
        };

        let routed = self
            .routes
            .route(pickup.coordinate(), destination.coordinate())
            .await;

        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) != token {
            return state.clone();
        }
        let next = match routed {
            Err(kind) => RideState::Error {
                kind,
                previous: Some(Box::new(state.clone())),
            },
            Ok(route) => ride_machine::transition(
                &state,
                RideState::RouteReady {
                    pickup,
                    destination,
                    route,
                },
            ),
        };
        *state = next.clone();
        let _ = self.state_tx.send(next.clone());
        next
    }

    /// Submit the ride request and start the status-poll loop.
    pub async fn request_ride(self: &Arc<Self>) -> RideState {
        let token = self.bump_generation();
        let (pickup, destination) = match self.state().await {
            RideState::RouteReady {
                pickup,
                destination,
                ..
            } => (pickup, destination),
            other => {
                return self
                    .fail(RideHailError::illegal_transition(
                        other.phase(),
                        "submittingRequest",
                    ))
                    .await;
            }
        };

        let submitting = self
            .apply(RideState::SubmittingRequest {
                pickup: pickup.clone(),
                destination: destination.clone(),
            })
            .await;
        if matches!(submitting, RideState::Error { .. }) {
            return submitting;
        }

        let submitted = self.transport.submit_ride(&pickup, &destination).await;

        let next = {
            let mut state = self.state.lock().await;
            if self.generation.load(Ordering::SeqCst) != token {
                return state.clone();
            }
            let next = match submitted {
                Err(kind) => RideState::Error {
                    kind,
                    previous: Some(Box::new(state.clone())),
                },
                Ok(ride) => ride_machine::transition(
                    &state,
                    RideState::SearchingForDriver {
                        ride_id: ride.ride_id,
                        pickup,
                        destination,
                    },
                ),
            };
            *state = next.clone();
            let _ = self.state_tx.send(next.clone());
            next
        };

        if let RideState::SearchingForDriver { ride_id, .. } = &next {
            info!(ride_id, "ride submitted, polling for status");
            self.start_poll_loop(ride_id.clone(), token).await;
        }
        next
    }

    /// Cancel the active ride: stop the poll loop, tell the server, and
    /// return the machine to `idle`. No-op from a terminal state.
    pub async fn cancel_ride(&self) -> RideState {
        let current = self.state().await;
        if current.is_terminal() {
            return current;
        }

        let ride_id = current.ride_id().map(str::to_string);
        let active = current.is_active_ride();
        self.tear_down().await;

        if let (Some(id), true) = (ride_id, active) {
            // best effort; the server reaps abandoned rides either way
            if let Err(e) = self.transport.cancel_ride(&id).await {
                warn!(ride_id = %id, error = %e, "server-side cancel failed");
            }
        }
        RideState::Idle
    }

    /// Discard all per-ride state and return to `idle`. Safe from any
    /// state, including `error`.
    pub async fn reset(&self) -> RideState {
        self.tear_down().await;
        RideState::Idle
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidate continuations, stop polling, clear leg state, go idle.
    async fn tear_down(&self) {
        self.bump_generation();
        self.route_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = self.poll_cancel.lock().await.take() {
            let _ = cancel.send(true);
        }
        *self.live_route.lock().await = None;
        *self.last_driver_position.lock().await = None;
        let mut state = self.state.lock().await;
        *state = RideState::Idle;
        let _ = self.state_tx.send(RideState::Idle);
    }

    /// Apply a transition through the machine, soft-failing if illegal.
    async fn apply(&self, to: RideState) -> RideState {
        let mut state = self.state.lock().await;
        let next = ride_machine::transition(&state, to);
        *state = next.clone();
        let _ = self.state_tx.send(next.clone());
        next
    }

    /// Degrade to an `error` state wrapping the current one.
    async fn fail(&self, kind: RideHailError) -> RideState {
        let mut state = self.state.lock().await;
        let next = RideState::Error {
            kind,
            previous: Some(Box::new(state.clone())),
        };
        *state = next.clone();
        let _ = self.state_tx.send(next.clone());
        next
    }

    async fn start_poll_loop(self: &Arc<Self>, ride_id: String, token: u64) {
        let mut slot = self.poll_cancel.lock().await;
        // a cancel or reset that landed after the searching commit has
        // already bumped the generation; starting the loop now would give
        // it a cancel channel nobody signalled
        if self.generation.load(Ordering::SeqCst) != token {
            debug!(ride_id, "poll loop superseded before start");
            return;
        }
        let (cancel_tx, cancel_rx) = watch::channel(false);
        if let Some(old) = slot.replace(cancel_tx) {
            let _ = old.send(true);
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_poll_loop(ride_id, cancel_rx).await;
        });
    }

    async fn run_poll_loop(self: Arc<Self>, ride_id: String, mut cancel: watch::Receiver<bool>) {
        loop {
            let interval = if matches!(
                *self.state.lock().await,
                RideState::SearchingForDriver { .. }
            ) {
                Duration::from_millis(self.config.search_poll_interval_ms)
            } else {
                Duration::from_millis(self.config.active_poll_interval_ms)
            };

            tokio::select! {
                _ = wait_cancelled(&mut cancel) => return,
                _ = sleep(interval) => {}
            }

            // dropping the fetch future also drops any pending retry sleep
            let fetched = tokio::select! {
                _ = wait_cancelled(&mut cancel) => return,
                result = self.transport.fetch_ride(&ride_id) => result,
            };

            match fetched {
                Err(kind @ RideHailError::RideNotFound { .. }) => {
                    self.fail_poll(&cancel, kind).await;
                    return;
                }
                Err(kind) => {
                    // transient even after transport retries; the next poll
                    // is the retry of last resort
                    warn!(ride_id, error = %kind, "status poll failed");
                }
                Ok(ride) => {
                    if !self.handle_poll(&ride, &cancel).await {
                        return;
                    }
                }
            }
        }
    }

    /// Feed one poll result through the machine. Returns `false` when the
    /// loop should stop (terminal status reached or ride failed).
    async fn handle_poll(self: &Arc<Self>, ride: &Ride, cancel: &watch::Receiver<bool>) -> bool {
        match ride.status {
            RideStatus::Cancelled => {
                // rider-requested cancels stop the loop before this point,
                // so a server-side cancel means the ride fell through
                let kind = match ride.cancel_reason {
                    Some(CancelReason::NoDriversAvailable) => RideHailError::NoDriverAvailable,
                    _ => RideHailError::ride_request_failed("ride cancelled by server"),
                };
                self.fail_poll(cancel, kind).await;
                false
            }
            RideStatus::Completed => {
                if ride.driver.is_some() {
                    self.apply_poll(cancel, ride).await;
                } else {
                    self.fail_poll(
                        cancel,
                        RideHailError::internal("completed ride without driver"),
                    )
                    .await;
                }
                false
            }
            _ => {
                self.apply_poll(cancel, ride).await;
                self.maybe_recompute_route(ride).await;
                true
            }
        }
    }

    /// Apply a polled snapshot through the machine. Polling samples the
    /// server's cascade, so a snapshot may be several statuses ahead; the
    /// machine is stepped through the implied intermediate states to catch
    /// up. Late-arriving older or duplicate snapshots map to illegal
    /// transitions at every step and are dropped whole.
    async fn apply_poll(&self, cancel: &watch::Receiver<bool>, ride: &Ride) -> bool {
        let mut state = self.state.lock().await;
        if *cancel.borrow() {
            return false;
        }
        let mut applied = false;
        for step in catch_up_chain(ride) {
            if ride_machine::can_transition(&state, &step) {
                *state = step.clone();
                let _ = self.state_tx.send(step);
                applied = true;
            }
        }
        if !applied {
            debug!(
                from = state.phase(),
                status = %ride.status,
                "dropping out-of-order status update"
            );
        }
        applied
    }

    async fn fail_poll(&self, cancel: &watch::Receiver<bool>, kind: RideHailError) {
        let mut state = self.state.lock().await;
        if *cancel.borrow() {
            return;
        }
        let next = RideState::Error {
            kind,
            previous: Some(Box::new(state.clone())),
        };
        *state = next.clone();
        let _ = self.state_tx.send(next);
    }

    /// Recompute the active leg's route when the driver has moved far
    /// enough. An in-flight recomputation is superseded by bumping the
    /// epoch; superseded results never commit.
    async fn maybe_recompute_route(self: &Arc<Self>, ride: &Ride) {
        let Some(driver) = &ride.driver else { return };
        let target = match ride.status {
            RideStatus::Assigned | RideStatus::EnRoute | RideStatus::Arriving => &ride.pickup,
            RideStatus::InProgress | RideStatus::ApproachingDestination => &ride.destination,
            _ => return,
        };

        {
            let mut last = self.last_driver_position.lock().await;
            if let Some(previous) = *last {
                if previous.haversine_km(&driver.location) < self.config.min_movement_km {
                    return;
                }
            }
            *last = Some(driver.location);
        }

        let epoch = self.route_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let controller = Arc::clone(self);
        let from = driver.location;
        let to = target.coordinate();
        tokio::spawn(async move {
            match controller.routes.route(from, to).await {
                Ok(route) => {
                    let mut live = controller.live_route.lock().await;
                    // a newer recomputation (or a cancel) wins
                    if controller.route_epoch.load(Ordering::SeqCst) == epoch {
                        *live = Some(route);
                    }
                }
                Err(e) => debug!(error = %e, "route recomputation failed"),
            }
        });
    }
}

/// Pickup/destination as currently selected, regardless of which
/// pre-submit phase the machine is in. Error states look through to the
/// phase they wrapped.
fn selected_locations(state: &RideState) -> (Option<Location>, Option<Location>) {
    match state {
        RideState::SelectingLocations {
            pickup,
            destination,
        } => (pickup.clone(), destination.clone()),
        RideState::RouteReady {
            pickup,
            destination,
            ..
        } => (Some(pickup.clone()), Some(destination.clone())),
        RideState::Error {
            previous: Some(previous),
            ..
        } => selected_locations(previous),
        _ => (None, None),
    }
}

/// The dispatcher's post-match status cascade, in order. Used to
/// synthesize the intermediate steps a poll may have sampled over.
const CASCADE: &[RideStatus] = &[
    RideStatus::Assigned,
    RideStatus::EnRoute,
    RideStatus::Arriving,
    RideStatus::InProgress,
    RideStatus::ApproachingDestination,
    RideStatus::Completed,
];

/// The rider states implied by a snapshot, ending at the snapshot's own
/// status: the cascade prefix for post-match statuses, a single state
/// otherwise.
fn catch_up_chain(ride: &Ride) -> Vec<RideState> {
    let Some(position) = CASCADE.iter().position(|s| *s == ride.status) else {
        return target_state(ride).into_iter().collect();
    };
    CASCADE[..=position]
        .iter()
        .filter_map(|status| {
            let mut step = ride.clone();
            step.status = *status;
            target_state(&step)
        })
        .collect()
}

/// Map a server ride snapshot onto the rider state it implies. `None` for
/// statuses that need a driver the snapshot does not carry.
fn target_state(ride: &Ride) -> Option<RideState> {
    let ride_id = ride.ride_id.clone();
    let pickup = ride.pickup.clone();
    let destination = ride.destination.clone();
    match ride.status {
        RideStatus::Searching => Some(RideState::SearchingForDriver {
            ride_id,
            pickup,
            destination,
        }),
        RideStatus::Assigned => ride.driver.clone().map(|driver| RideState::DriverAssigned {
            ride_id,
            driver,
            pickup,
            destination,
        }),
        RideStatus::EnRoute => ride.driver.clone().map(|driver| RideState::DriverEnRoute {
            ride_id,
            driver,
            eta_secs: ride.estimated_arrival.unwrap_or(0),
            pickup,
            destination,
        }),
        RideStatus::Arriving => ride.driver.clone().map(|driver| RideState::DriverArriving {
            ride_id,
            driver,
            pickup,
            destination,
        }),
        RideStatus::InProgress => ride.driver.clone().map(|driver| RideState::RideInProgress {
            ride_id,
            driver,
            eta_secs: ride.estimated_arrival.unwrap_or(0),
            pickup,
            destination,
        }),
        RideStatus::ApproachingDestination => {
            ride.driver
                .clone()
                .map(|driver| RideState::ApproachingDestination {
                    ride_id,
                    driver,
                    pickup,
                    destination,
                })
        }
        RideStatus::Completed => ride.driver.clone().map(|driver| RideState::RideCompleted {
            ride_id,
            driver,
            pickup,
            destination,
        }),
        RideStatus::Cancelled => None,
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
