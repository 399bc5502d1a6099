//! The shared driver pool. Every mutation goes through the pool mutex so
//! two concurrent match attempts can never assign the same driver twice.

use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use ridehail_core::config::PoolConfig;
use ridehail_domain::{Coordinate, DriverInfo};

use crate::matching::DriverSnapshot;

const DRIVER_NAMES: &[&str] = &[
    "Sam", "Priya", "Diego", "Mei", "Kofi", "Lena", "Tariq", "Ana", "Yuki", "Omar", "Ida", "Ravi",
];

const VEHICLES: &[&str] = &[
    "Toyota Prius",
    "Honda Civic",
    "Tesla Model 3",
    "Hyundai Ioniq",
    "Ford Fusion",
    "Kia Niro",
];

#[derive(Debug, Clone)]
struct PoolDriver {
    info: DriverInfo,
    available: bool,
    current_ride: Option<String>,
}

/// Debug listing of one pool entry, as exposed by `GET /drivers`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverListing {
    pub id: String,
    pub name: String,
    pub vehicle: String,
    pub rating: f64,
    pub location: Coordinate,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ride: Option<String>,
}

pub struct DriverPool {
    drivers: Mutex<Vec<PoolDriver>>,
    center: Coordinate,
    spawn_radius_km: f64,
}

/// Uniform random point inside `radius_km` around `center`.
fn random_point_near(center: Coordinate, radius_km: f64) -> Coordinate {
    let mut rng = rand::rng();
    let angle = rng.random_range(0.0..std::f64::consts::TAU);
    let distance = radius_km * rng.random_range(0.0f64..1.0).sqrt();
    let d_lat = distance * angle.sin() / 110.574;
    let d_lng = distance * angle.cos() / (111.320 * center.lat.to_radians().cos());
    Coordinate::new(center.lat + d_lat, center.lng + d_lng)
}

impl DriverPool {
    /// Seed the pool with randomized driver positions. Drivers live for the
    /// whole process; availability flips per ride.
    pub fn seed(config: &PoolConfig) -> Self {
        let center = Coordinate::new(config.center_lat, config.center_lng);
        let mut rng = rand::rng();
        let drivers = (0..config.driver_count)
            .map(|i| PoolDriver {
                info: DriverInfo {
                    id: format!("driver-{}", i + 1),
                    name: DRIVER_NAMES[i % DRIVER_NAMES.len()].to_string(),
                    vehicle: VEHICLES[i % VEHICLES.len()].to_string(),
                    rating: (rng.random_range(40..=50) as f64) / 10.0,
                    location: random_point_near(center, config.spawn_radius_km),
                },
                available: true,
                current_ride: None,
            })
            .collect();

        Self {
            drivers: Mutex::new(drivers),
            center,
            spawn_radius_km: config.spawn_radius_km,
        }
    }

    pub async fn available_snapshot(&self) -> Vec<DriverSnapshot> {
        self.drivers
            .lock()
            .await
            .iter()
            .filter(|d| d.available)
            .map(|d| DriverSnapshot {
                id: d.info.id.clone(),
                location: d.info.location,
                rating: d.info.rating,
            })
            .collect()
    }

    /// Atomically claim a driver for a ride. Returns `None` when the
    /// driver is gone or already taken, in which case the caller must
    /// re-run its selection.
    pub async fn try_assign(&self, driver_id: &str, ride_id: &str) -> Option<DriverInfo> {
        let mut drivers = self.drivers.lock().await;
        match drivers
            .iter_mut()
            .find(|d| d.info.id == driver_id && d.available)
        {
            Some(driver) => {
                driver.available = false;
                driver.current_ride = Some(ride_id.to_string());
                debug!(driver_id, ride_id, "driver assigned");
                Some(driver.info.clone())
            }
            None => None,
        }
    }

    /// Free a driver after their ride ends. Only the ride that holds the
    /// driver may release them; the location is re-randomized near the
    /// drop-off for the next cycle.
    pub async fn release(&self, driver_id: &str, ride_id: &str, drop_location: Option<Coordinate>) {
        let mut drivers = self.drivers.lock().await;
        if let Some(driver) = drivers
            .iter_mut()
            .find(|d| d.info.id == driver_id && d.current_ride.as_deref() == Some(ride_id))
        {
            driver.available = true;
            driver.current_ride = None;
            let anchor = drop_location.unwrap_or(self.center);
            driver.info.location = random_point_near(anchor, self.spawn_radius_km / 4.0);
            debug!(driver_id, ride_id, "driver released");
        }
    }

    /// Live position update from the movement simulator.
    pub async fn update_location(&self, driver_id: &str, location: Coordinate) {
        let mut drivers = self.drivers.lock().await;
        if let Some(driver) = drivers.iter_mut().find(|d| d.info.id == driver_id) {
            driver.info.location = location;
        }
    }

    pub async fn available_count(&self) -> usize {
        self.drivers.lock().await.iter().filter(|d| d.available).count()
    }

    pub async fn listings(&self) -> Vec<DriverListing> {
        self.drivers
            .lock()
            .await
            .iter()
            .map(|d| DriverListing {
                id: d.info.id.clone(),
                name: d.info.name.clone(),
                vehicle: d.info.vehicle.clone(),
                rating: d.info.rating,
                location: d.info.location,
                available: d.available,
                current_ride: d.current_ride.clone(),
            })
            .collect()
    }
}
