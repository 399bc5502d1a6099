use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("bind address must not be empty"));
        }
        Ok(())
    }
}

/// Seed parameters for the simulated driver pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub driver_count: usize,
    pub center_lat: f64,
    pub center_lng: f64,
    /// Drivers spawn uniformly inside this radius around the center.
    pub spawn_radius_km: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            driver_count: 8,
            center_lat: 37.7749,
            center_lng: -122.4194,
            spawn_radius_km: 5.0,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.driver_count == 0 {
            return Err(anyhow::anyhow!("driver count must be greater than 0"));
        }
        if !(-90.0..=90.0).contains(&self.center_lat)
            || !(-180.0..=180.0).contains(&self.center_lng)
        {
            return Err(anyhow::anyhow!(
                "pool center is not a valid coordinate: ({}, {})",
                self.center_lat,
                self.center_lng
            ));
        }
        if self.spawn_radius_km <= 0.0 {
            return Err(anyhow::anyhow!("spawn radius must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Randomized matching delay window, uniform in [min, max].
    pub match_delay_min_ms: u64,
    pub match_delay_max_ms: u64,
    /// Assumed average driving speed used for ETAs and leg durations.
    pub average_speed_kmh: f64,
    /// Movement simulator tick interval.
    pub tick_interval_ms: u64,
    /// Remaining distance below which a leg counts as arrived.
    pub arrival_threshold_km: f64,
    /// Compresses simulated travel time (2.0 = legs run twice as fast).
    pub time_scale: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            match_delay_min_ms: 2000,
            match_delay_max_ms: 4000,
            average_speed_kmh: 30.0,
            tick_interval_ms: 500,
            arrival_threshold_km: 0.05,
            time_scale: 1.0,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.match_delay_max_ms < self.match_delay_min_ms {
            return Err(anyhow::anyhow!(
                "match delay window is inverted: {}..{}",
                self.match_delay_min_ms,
                self.match_delay_max_ms
            ));
        }
        if self.average_speed_kmh <= 0.0 {
            return Err(anyhow::anyhow!("average speed must be greater than 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("tick interval must be greater than 0"));
        }
        if self.arrival_threshold_km <= 0.0 {
            return Err(anyhow::anyhow!("arrival threshold must be greater than 0"));
        }
        if self.time_scale <= 0.0 {
            return Err(anyhow::anyhow!("time scale must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub base_url: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random jitter applied to each backoff sleep (0.0-1.0).
    pub jitter_factor: f64,
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            request_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            return Err(anyhow::anyhow!("transport base URL must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max attempts must be greater than 0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(anyhow::anyhow!(
                "max delay {}ms is below base delay {}ms",
                self.max_delay_ms,
                self.base_delay_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("jitter factor must be within 0.0-1.0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Poll interval while still searching for a driver.
    pub search_poll_interval_ms: u64,
    /// Poll interval once a driver is assigned.
    pub active_poll_interval_ms: u64,
    /// Quiet window before a geocoding lookup fires.
    pub debounce_ms: u64,
    /// Counterpart movement below this distance does not trigger a route
    /// recomputation.
    pub min_movement_km: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            search_poll_interval_ms: 1000,
            active_poll_interval_ms: 2000,
            debounce_ms: 400,
            min_movement_km: 0.05,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search_poll_interval_ms == 0 || self.active_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("poll intervals must be greater than 0"));
        }
        if self.min_movement_km < 0.0 {
            return Err(anyhow::anyhow!("minimum movement must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub dispatcher: DispatcherConfig,
    pub transport: TransportConfig,
    pub flow: FlowConfig,
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate()?;
        self.pool.validate()?;
        self.dispatcher.validate()?;
        self.transport.validate()?;
        self.flow.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = AppConfig::default();
        config.dispatcher.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_match_delay_window() {
        let mut config = AppConfig::default();
        config.dispatcher.match_delay_min_ms = 5000;
        config.dispatcher.match_delay_max_ms = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_pool() {
        let mut config = AppConfig::default();
        config.pool.driver_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_jitter() {
        let mut config = AppConfig::default();
        config.transport.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }
}
