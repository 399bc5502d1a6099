//! Driver-side flow controller.
//!
//! Mirrors the rider controller's single-owner discipline, but with the
//! driver machine's hard-fail semantics: an operation that maps to an
//! illegal transition returns an error and leaves the state untouched.
//! There is no decorative `error` state for bad calls; `fail` exists only
//! for genuine runtime faults (lost GPS, auth expiry).

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use ridehail_domain::{
    driver_machine, ActiveRide, DriverState, DriverStats, RideHailError, RideHailResult,
    RideOffer, RideSummary,
};

const BASE_FARE: f64 = 2.5;
const PER_KM_RATE: f64 = 1.75;

pub struct DriverFlowController {
    state: Mutex<DriverState>,
    state_tx: watch::Sender<DriverState>,
    /// Carried across shifts; the per-state copy is a snapshot of this.
    persisted_stats: Mutex<DriverStats>,
    ride_started_at: Mutex<Option<Instant>>,
}

impl Default for DriverFlowController {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverFlowController {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(DriverState::Offline);
        Self {
            state: Mutex::new(DriverState::Offline),
            state_tx,
            persisted_stats: Mutex::new(DriverStats::default()),
            ride_started_at: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.state_tx.subscribe()
    }

    pub async fn state(&self) -> DriverState {
        self.state.lock().await.clone()
    }

    /// Log in and go on duty. Stats carry over from previous shifts.
    pub async fn go_online(&self) -> RideHailResult<DriverState> {
        let stats = self.persisted_stats.lock().await.clone();
        let mut state = self.state.lock().await;
        commit(&mut state, &self.state_tx, DriverState::LoggingIn)?;
        let next = commit(&mut state, &self.state_tx, DriverState::Online { stats })?;
        info!("driver online");
        Ok(next)
    }

    /// End the shift. Illegal while a ride is active.
    pub async fn go_offline(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        commit(&mut state, &self.state_tx, DriverState::Offline)
    }

    pub async fn receive_offer(&self, offer: RideOffer) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let stats = current_stats(&state);
        commit(
            &mut state,
            &self.state_tx,
            DriverState::RideOffered { offer, stats },
        )
    }

    pub async fn accept_offer(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let (offer, stats) = match &*state {
            DriverState::RideOffered { offer, stats } => (offer.clone(), stats.clone()),
            other => {
                return Err(RideHailError::illegal_transition(
                    other.phase(),
                    "headingToPickup",
                ))
            }
        };
        commit(
            &mut state,
            &self.state_tx,
            DriverState::HeadingToPickup {
                ride: ActiveRide {
                    ride_id: offer.ride_id,
                    pickup: offer.pickup,
                    destination: offer.destination,
                },
                stats,
            },
        )
    }

    pub async fn decline_offer(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let stats = current_stats(&state);
        debug!("offer declined");
        commit(&mut state, &self.state_tx, DriverState::Online { stats })
    }

    pub async fn arrive_at_pickup(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let (ride, stats) = active_ride(&state, "arrivedAtPickup")?;
        commit(
            &mut state,
            &self.state_tx,
            DriverState::ArrivedAtPickup { ride, stats },
        )
    }

    pub async fn start_ride(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let (ride, stats) = active_ride(&state, "rideInProgress")?;
        let next = commit(
            &mut state,
            &self.state_tx,
            DriverState::RideInProgress { ride, stats },
        )?;
        *self.ride_started_at.lock().await = Some(Instant::now());
        Ok(next)
    }

    pub async fn approach_destination(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let (ride, stats) = active_ride(&state, "approachingDestination")?;
        commit(
            &mut state,
            &self.state_tx,
            DriverState::ApproachingDestination { ride, stats },
        )
    }

    /// Finish the active ride, folding the fare into the running stats.
    pub async fn complete_ride(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let (ride, mut stats) = active_ride(&state, "rideCompleted")?;

        let distance_km = ride
            .pickup
            .coordinate()
            .haversine_km(&ride.destination.coordinate());
        let duration_secs = self
            .ride_started_at
            .lock()
            .await
            .take()
            .map(|started| started.elapsed().as_secs())
            .unwrap_or(0);

        stats.rides_completed += 1;
        stats.earnings += BASE_FARE + PER_KM_RATE * distance_km;

        let summary = RideSummary {
            ride_id: ride.ride_id,
            pickup: ride.pickup,
            destination: ride.destination,
            distance_km,
            duration_secs,
            completed_at: Utc::now(),
        };

        let next = commit(
            &mut state,
            &self.state_tx,
            DriverState::RideCompleted {
                summary,
                stats: stats.clone(),
            },
        )?;
        *self.persisted_stats.lock().await = stats;
        info!(distance_km, "ride completed");
        Ok(next)
    }

    /// Rider cancelled mid-approach; return to duty.
    pub async fn ride_cancelled(&self) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let stats = current_stats(&state);
        commit(&mut state, &self.state_tx, DriverState::Online { stats })
    }

    /// Go back on duty after a completed ride or a recovered fault.
    pub async fn resume_online(&self) -> RideHailResult<DriverState> {
        let stats = self.persisted_stats.lock().await.clone();
        let mut state = self.state.lock().await;
        commit(&mut state, &self.state_tx, DriverState::Online { stats })
    }

    /// Record a runtime fault. The previous state is retained so the
    /// caller can decide between `resume_online` and `go_offline`.
    pub async fn fail<S: Into<String>>(&self, message: S) -> RideHailResult<DriverState> {
        let mut state = self.state.lock().await;
        let previous = Box::new(state.clone());
        commit(
            &mut state,
            &self.state_tx,
            DriverState::Error {
                message: message.into(),
                previous,
            },
        )
    }
}

fn commit(
    state: &mut DriverState,
    state_tx: &watch::Sender<DriverState>,
    to: DriverState,
) -> RideHailResult<DriverState> {
    let to_phase = to.phase();
    match driver_machine::transition(state, to) {
        Some(next) => {
            *state = next.clone();
            let _ = state_tx.send(next.clone());
            Ok(next)
        }
        None => Err(RideHailError::illegal_transition(state.phase(), to_phase)),
    }
}

fn current_stats(state: &DriverState) -> DriverStats {
    state.stats().cloned().unwrap_or_default()
}

fn active_ride(state: &DriverState, attempted: &str) -> RideHailResult<(ActiveRide, DriverStats)> {
    match state {
        DriverState::HeadingToPickup { ride, stats }
        | DriverState::ArrivedAtPickup { ride, stats }
        | DriverState::RideInProgress { ride, stats }
        | DriverState::ApproachingDestination { ride, stats } => {
            Ok((ride.clone(), stats.clone()))
        }
        other => Err(RideHailError::illegal_transition(other.phase(), attempted)),
    }
}
