//! The dispatcher: owns the ride table and the driver pool, matches new
//! requests after a simulated search delay, and drives assigned rides
//! through both legs of the trip.
//!
//! Each ride gets one lifecycle task, and that task is the only writer for
//! the ride's status cascade. Cancellation flows through a per-ride watch
//! channel; once a ride is terminal no further update or event for it can
//! be published (`update_ride` refuses terminal rides).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use ridehail_core::config::DispatcherConfig;
use ridehail_core::traits::RideHistorySink;
use ridehail_domain::{
    CancelReason, Coordinate, DriverInfo, Location, Ride, RideHailError, RideHailResult,
    RideStatus, RideSummary,
};

use crate::events::{DriverPositionInfo, DriverPositionUpdate, RideEvent};
use crate::matching::MatchingStrategy;
use crate::movement::MovementSimulator;
use crate::pool::{DriverListing, DriverPool};

/// "Arriving"/"approaching" is announced within this many arrival radii of
/// the leg target.
const NEAR_RADIUS_FACTOR: f64 = 10.0;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub active_rides: usize,
    pub completed_rides: usize,
    pub cancelled_rides: usize,
    pub available_drivers: usize,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    pool: Arc<DriverPool>,
    strategy: Arc<dyn MatchingStrategy>,
    history: Arc<dyn RideHistorySink>,
    rides: Mutex<HashMap<String, Ride>>,
    cancels: Mutex<HashMap<String, watch::Sender<bool>>>,
    events: broadcast::Sender<RideEvent>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        pool: Arc<DriverPool>,
        strategy: Arc<dyn MatchingStrategy>,
        history: Arc<dyn RideHistorySink>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            pool,
            strategy,
            history,
            rides: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Subscribe to ride updates and driver position ticks, in publish
    /// order.
    pub fn subscribe(&self) -> broadcast::Receiver<RideEvent> {
        self.events.subscribe()
    }

    /// Accept a new ride request and start its lifecycle task.
    pub async fn request_ride(
        self: &Arc<Self>,
        pickup: Location,
        destination: Location,
    ) -> RideHailResult<Ride> {
        if !pickup.coordinate().is_valid() {
            return Err(RideHailError::invalid_pickup(format!(
                "({}, {}) is out of range",
                pickup.lat, pickup.lng
            )));
        }
        if !destination.coordinate().is_valid() {
            return Err(RideHailError::invalid_destination(format!(
                "({}, {}) is out of range",
                destination.lat, destination.lng
            )));
        }

        let ride = Ride::new(pickup, destination);
        let ride_id = ride.ride_id.clone();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        self.rides.lock().await.insert(ride_id.clone(), ride.clone());
        self.cancels.lock().await.insert(ride_id.clone(), cancel_tx);
        let _ = self.events.send(RideEvent::RideUpdate(ride.clone()));

        info!(ride_id, "ride requested, searching for driver");
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.run_lifecycle(ride_id, cancel_rx).await;
        });

        Ok(ride)
    }

    pub async fn ride(&self, ride_id: &str) -> RideHailResult<Ride> {
        self.rides
            .lock()
            .await
            .get(ride_id)
            .cloned()
            .ok_or_else(|| RideHailError::ride_not_found(ride_id))
    }

    /// Cancel a ride. Idempotent: a ride already in a terminal status is
    /// returned unchanged, without touching the pool or publishing events.
    pub async fn cancel_ride(&self, ride_id: &str) -> RideHailResult<Ride> {
        let (snapshot, driver_to_release) = {
            let mut rides = self.rides.lock().await;
            let ride = rides
                .get_mut(ride_id)
                .ok_or_else(|| RideHailError::ride_not_found(ride_id))?;
            if ride.status.is_terminal() {
                return Ok(ride.clone());
            }
            ride.status = RideStatus::Cancelled;
            ride.cancel_reason = Some(CancelReason::RiderRequested);
            ride.estimated_arrival = None;
            ride.updated_at = Utc::now();
            // publish under the lock so nothing for this ride can be
            // observed after the cancelled update
            let _ = self.events.send(RideEvent::RideUpdate(ride.clone()));
            (ride.clone(), ride.driver.as_ref().map(|d| d.id.clone()))
        };

        if let Some(cancel) = self.cancels.lock().await.get(ride_id) {
            let _ = cancel.send(true);
        }
        if let Some(driver_id) = driver_to_release {
            self.pool.release(&driver_id, ride_id, None).await;
        }
        info!(ride_id, "ride cancelled by rider");
        Ok(snapshot)
    }

    pub async fn drivers(&self) -> Vec<DriverListing> {
        self.pool.listings().await
    }

    pub async fn stats(&self) -> DispatcherStats {
        let rides = self.rides.lock().await;
        let mut stats = DispatcherStats {
            available_drivers: 0,
            ..Default::default()
        };
        for ride in rides.values() {
            match ride.status {
                RideStatus::Completed => stats.completed_rides += 1,
                RideStatus::Cancelled => stats.cancelled_rides += 1,
                _ => stats.active_rides += 1,
            }
        }
        drop(rides);
        stats.available_drivers = self.pool.available_count().await;
        stats
    }

    /// Cancel every live ride, e.g. on process shutdown.
    pub async fn shutdown(&self) {
        let cancels = self.cancels.lock().await;
        for cancel in cancels.values() {
            let _ = cancel.send(true);
        }
    }

    /// Apply a mutation to a live ride and publish the updated snapshot.
    /// Returns `None` (and publishes nothing) once the ride is terminal.
    async fn update_ride<F>(&self, ride_id: &str, mutate: F) -> Option<Ride>
    where
        F: FnOnce(&mut Ride),
    {
        let mut rides = self.rides.lock().await;
        let ride = rides.get_mut(ride_id)?;
        if ride.status.is_terminal() {
            return None;
        }
        mutate(ride);
        ride.updated_at = Utc::now();
        let _ = self.events.send(RideEvent::RideUpdate(ride.clone()));
        Some(ride.clone())
    }

    /// Publish an event for a ride only while it is still live, holding
    /// the ride table lock so the publish cannot land after a cancel.
    async fn publish_if_live(&self, ride_id: &str, event: RideEvent) -> bool {
        let rides = self.rides.lock().await;
        match rides.get(ride_id) {
            Some(ride) if !ride.status.is_terminal() => {
                let _ = self.events.send(event);
                true
            }
            _ => false,
        }
    }

    async fn run_lifecycle(self: Arc<Self>, ride_id: String, mut cancel: watch::Receiver<bool>) {
        let (pickup, destination) = match self.ride(&ride_id).await {
            Ok(ride) => (ride.pickup.coordinate(), ride.destination.coordinate()),
            Err(_) => return,
        };

        // simulated search latency before matching even starts
        let delay_ms = rand::rng()
            .random_range(self.config.match_delay_min_ms..=self.config.match_delay_max_ms);
        tokio::select! {
            _ = wait_cancelled(&mut cancel) => {
                self.cancels.lock().await.remove(&ride_id);
                return;
            }
            _ = sleep(Duration::from_millis(delay_ms)) => {}
        }

        // select-and-claim loop: losing a claim race means another request
        // took that driver, so select again from a fresh snapshot
        let driver = loop {
            let available = self.pool.available_snapshot().await;
            let Some(outcome) = self
                .strategy
                .select_driver(pickup, &available)
            else {
                warn!(ride_id, "no driver available, failing the request");
                self.update_ride(&ride_id, |ride| {
                    ride.status = RideStatus::Cancelled;
                    ride.cancel_reason = Some(CancelReason::NoDriversAvailable);
                })
                .await;
                self.cancels.lock().await.remove(&ride_id);
                return;
            };
            if let Some(info) = self.pool.try_assign(&outcome.driver_id, &ride_id).await {
                break AssignedDriver {
                    info,
                    eta_secs: outcome.eta_secs,
                };
            }
            debug!(ride_id, driver_id = %outcome.driver_id, "lost claim race, rematching");
        };

        let assigned = self
            .update_ride(&ride_id, |ride| {
                ride.status = RideStatus::Assigned;
                ride.driver = Some(driver.info.clone());
                ride.estimated_arrival = Some(driver.eta_secs);
            })
            .await;
        if assigned.is_none() {
            // cancelled while matching: hand the driver straight back
            self.pool.release(&driver.info.id, &ride_id, None).await;
            self.cancels.lock().await.remove(&ride_id);
            return;
        }
        info!(ride_id, driver_id = %driver.info.id, "driver assigned");

        // approach leg, then transport leg
        let picked_up = self
            .run_leg(
                &ride_id,
                &driver.info.id,
                driver.info.location,
                pickup,
                RideStatus::EnRoute,
                RideStatus::Arriving,
                &cancel,
            )
            .await;
        if picked_up {
            let completed = self
                .run_leg(
                    &ride_id,
                    &driver.info.id,
                    pickup,
                    destination,
                    RideStatus::InProgress,
                    RideStatus::ApproachingDestination,
                    &cancel,
                )
                .await;
            if completed {
                self.finish_ride(&ride_id, &driver.info, pickup, destination)
                    .await;
            }
        }

        self.cancels.lock().await.remove(&ride_id);
    }

    /// Drive one leg of the trip. Returns `true` if the leg arrived,
    /// `false` if the ride was cancelled underneath it.
    #[allow(clippy::too_many_arguments)]
    async fn run_leg(
        &self,
        ride_id: &str,
        driver_id: &str,
        from: Coordinate,
        to: Coordinate,
        travel_status: RideStatus,
        near_status: RideStatus,
        cancel: &watch::Receiver<bool>,
    ) -> bool {
        let distance_km = from.haversine_km(&to);
        let eta_secs = (distance_km / self.config.average_speed_kmh * 3600.0).round() as u64;
        if self
            .update_ride(ride_id, |ride| {
                ride.status = travel_status;
                ride.estimated_arrival = Some(eta_secs);
            })
            .await
            .is_none()
        {
            return false;
        }

        let duration =
            Duration::from_secs_f64(eta_secs as f64 / self.config.time_scale);
        let simulator = MovementSimulator::new(
            from,
            to,
            duration,
            Duration::from_millis(self.config.tick_interval_ms),
            self.config.arrival_threshold_km,
        );
        let near_radius_km = self.config.arrival_threshold_km * NEAR_RADIUS_FACTOR;

        let (tick_tx, mut tick_rx) = mpsc::channel(32);
        let leg = tokio::spawn(simulator.run(cancel.clone(), tick_tx));

        let mut near_announced = false;
        while let Some(tick) = tick_rx.recv().await {
            let remaining_eta =
                (tick.remaining_km / self.config.average_speed_kmh * 3600.0).round() as u64;
            let snapshot = self
                .update_ride(ride_id, |ride| {
                    if let Some(driver) = ride.driver.as_mut() {
                        driver.location = tick.position;
                    }
                    ride.estimated_arrival = Some(remaining_eta);
                    if !near_announced && tick.remaining_km < near_radius_km {
                        ride.status = near_status;
                    }
                })
                .await;
            let Some(snapshot) = snapshot else {
                // ride went terminal; a released driver already has a fresh
                // spawn point, a stale tick must not overwrite it
                break;
            };
            self.pool.update_location(driver_id, tick.position).await;
            near_announced = near_announced || snapshot.status == near_status;

            let position = RideEvent::DriverPosition(DriverPositionUpdate {
                ride_id: ride_id.to_string(),
                driver: DriverPositionInfo {
                    id: driver_id.to_string(),
                    location: tick.position,
                },
                status: snapshot.status,
                distance_remaining: tick.remaining_km,
                progress: tick.progress,
            });
            if !self.publish_if_live(ride_id, position).await {
                break;
            }
        }

        leg.await.unwrap_or(false)
    }

    async fn finish_ride(
        &self,
        ride_id: &str,
        driver: &DriverInfo,
        pickup: Coordinate,
        destination: Coordinate,
    ) {
        let completed = self
            .update_ride(ride_id, |ride| {
                ride.status = RideStatus::Completed;
                ride.estimated_arrival = None;
                if let Some(driver) = ride.driver.as_mut() {
                    driver.location = destination;
                }
            })
            .await;
        let Some(ride) = completed else { return };

        self.pool.release(&driver.id, ride_id, Some(destination)).await;
        info!(ride_id, driver_id = %driver.id, "ride completed");

        let summary = RideSummary {
            ride_id: ride.ride_id.clone(),
            pickup: ride.pickup.clone(),
            destination: ride.destination.clone(),
            distance_km: pickup.haversine_km(&destination),
            duration_secs: (ride.updated_at - ride.created_at).num_seconds().max(0) as u64,
            completed_at: ride.updated_at,
        };
        if let Err(e) = self.history.append(summary).await {
            // history is display-only; never fail the ride over it
            warn!(ride_id, "failed to record ride history: {e}");
        }
    }
}

struct AssignedDriver {
    info: DriverInfo,
    eta_secs: u64,
}

/// Resolves when the watch channel reads `true` (or its sender is gone).
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
