//! Time-parameterized movement along one leg of a trip.
//!
//! The simulator interpolates linearly between two points on a fixed tick
//! interval, pushing each sample into a channel. It finishes when progress
//! reaches 1.0 or the remaining distance drops under the arrival threshold,
//! whichever comes first. Cancellation stops the ticking without reporting
//! completion.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use ridehail_domain::Coordinate;

/// One tick's worth of position data.
#[derive(Debug, Clone, PartialEq)]
pub struct LegProgress {
    pub position: Coordinate,
    /// Fraction of the leg covered, clamped to [0, 1].
    pub progress: f64,
    pub remaining_km: f64,
}

pub struct MovementSimulator {
    start: Coordinate,
    end: Coordinate,
    duration: Duration,
    tick_interval: Duration,
    arrival_threshold_km: f64,
}

impl MovementSimulator {
    pub fn new(
        start: Coordinate,
        end: Coordinate,
        duration: Duration,
        tick_interval: Duration,
        arrival_threshold_km: f64,
    ) -> Self {
        Self {
            start,
            end,
            duration,
            tick_interval,
            arrival_threshold_km,
        }
    }

    fn sample(&self, elapsed: Duration) -> LegProgress {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        let position = self.start.interpolate(&self.end, progress);
        LegProgress {
            position,
            progress,
            remaining_km: position.haversine_km(&self.end),
        }
    }

    fn arrived(&self, sample: &LegProgress) -> bool {
        sample.progress >= 1.0 || sample.remaining_km < self.arrival_threshold_km
    }

    /// Drive the leg to completion or cancellation.
    ///
    /// Returns `true` if the leg arrived, `false` if it was cancelled.
    /// Closing `ticks` on the consumer side does not stop the simulation;
    /// only the cancel channel does.
    pub async fn run(
        self,
        mut cancel: watch::Receiver<bool>,
        ticks: mpsc::Sender<LegProgress>,
    ) -> bool {
        if *cancel.borrow() {
            return false;
        }

        let started = Instant::now();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        debug!("movement leg cancelled");
                        return false;
                    }
                }
                _ = ticker.tick() => {
                    let sample = self.sample(started.elapsed());
                    let arrived = self.arrived(&sample);
                    let _ = ticks.send(sample).await;
                    if arrived {
                        debug!("movement leg arrived");
                        return true;
                    }
                }
            }
        }
    }
}
