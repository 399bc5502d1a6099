//! HTTP transport to the dispatch server, with retry.
//!
//! Every call goes through [`TransportClient::with_retry`]: connectivity
//! failures, timeouts and 5xx responses are retried with a doubling backoff
//! (plus jitter), while 4xx responses and decode failures surface
//! immediately. The retry sleep lives inside the returned future, so a flow
//! controller that drops the call also drops any pending backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use ridehail_core::config::TransportConfig;
use ridehail_domain::{Location, Ride, RideHailError, RideHailResult, RideStatus};

/// Transport-level failure, classified for the retry loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Decode(_) => false,
        }
    }
}

/// Response body of `POST /rides/{id}/cancel`.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOutcome {
    pub success: bool,
    pub ride: Ride,
}

/// The raw HTTP surface the flow controllers talk to. Implemented over
/// reqwest in production; tests substitute scripted backends.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn submit_ride(
        &self,
        pickup: &Location,
        destination: &Location,
    ) -> Result<Ride, TransportError>;

    async fn fetch_ride(&self, ride_id: &str) -> Result<Ride, TransportError>;

    async fn cancel_ride(&self, ride_id: &str) -> Result<CancelOutcome, TransportError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_factor: config.jitter_factor,
        }
    }

    /// Backoff before the attempt after `attempt` (1-based): base delay
    /// doubling per attempt, capped, with multiplicative jitter.
    fn delay(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = doubled.min(self.max_delay);
        if self.jitter_factor <= 0.0 {
            return capped;
        }
        let factor = 1.0 + rand::rng().random_range(-self.jitter_factor..self.jitter_factor);
        Duration::from_secs_f64(capped.as_secs_f64() * factor.max(0.0))
    }
}

/// Retry-wrapped client over an [`HttpBackend`], mapping transport errors
/// into the domain taxonomy.
pub struct TransportClient {
    backend: Arc<dyn HttpBackend>,
    policy: RetryPolicy,
}

impl TransportClient {
    pub fn new(backend: Arc<dyn HttpBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Production client speaking to `config.base_url` over reqwest.
    pub fn from_config(config: &TransportConfig) -> RideHailResult<Self> {
        let backend = ReqwestBackend::new(config)?;
        Ok(Self::new(Arc::new(backend), RetryPolicy::from_config(config)))
    }

    pub async fn submit_ride(
        &self,
        pickup: &Location,
        destination: &Location,
    ) -> RideHailResult<Ride> {
        let backend = Arc::clone(&self.backend);
        let pickup = pickup.clone();
        let destination = destination.clone();
        self.with_retry("submit_ride", move || {
            let backend = Arc::clone(&backend);
            let pickup = pickup.clone();
            let destination = destination.clone();
            Box::pin(async move { backend.submit_ride(&pickup, &destination).await })
        })
        .await
        .map_err(|e| map_error(e, None))
    }

    pub async fn fetch_ride(&self, ride_id: &str) -> RideHailResult<Ride> {
        let backend = Arc::clone(&self.backend);
        let id = ride_id.to_string();
        self.with_retry("fetch_ride", move || {
            let backend = Arc::clone(&backend);
            let id = id.clone();
            Box::pin(async move { backend.fetch_ride(&id).await })
        })
        .await
        .map_err(|e| map_error(e, Some(ride_id)))
    }

    pub async fn cancel_ride(&self, ride_id: &str) -> RideHailResult<CancelOutcome> {
        let backend = Arc::clone(&self.backend);
        let id = ride_id.to_string();
        self.with_retry("cancel_ride", move || {
            let backend = Arc::clone(&backend);
            let id = id.clone();
            Box::pin(async move { backend.cancel_ride(&id).await })
        })
        .await
        .map_err(|e| map_error(e, Some(ride_id)))
    }

    async fn with_retry<T>(
        &self,
        op: &str,
        mut call: impl FnMut() -> BoxFuture<'static, Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op, attempt, "transport call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.policy.max_attempts {
                        return Err(e);
                    }
                    let delay = self.policy.delay(attempt);
                    warn!(
                        op,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transport call failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

fn map_error(err: TransportError, ride_id: Option<&str>) -> RideHailError {
    match err {
        TransportError::Timeout(m) => RideHailError::Timeout(m),
        TransportError::Connect(m) => RideHailError::network_unavailable(m),
        TransportError::Status { status, body } if status >= 500 => {
            RideHailError::network_unavailable(format!("server error {status}: {body}"))
        }
        TransportError::Status { status: 404, .. } => match ride_id {
            Some(id) => RideHailError::ride_not_found(id),
            None => RideHailError::ride_request_failed("not found"),
        },
        TransportError::Status { status, body } => {
            RideHailError::ride_request_failed(format!("{status}: {body}"))
        }
        TransportError::Decode(m) => RideHailError::Serialization(m),
    }
}

/// Decode a ride body, downgrading a status string this client does not
/// recognize to `searching` instead of failing the whole poll.
fn decode_ride(body: &str) -> Result<Ride, TransportError> {
    let mut value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    normalize_status(&mut value);
    serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
}

fn normalize_status(ride: &mut serde_json::Value) {
    let unknown = ride
        .get("status")
        .and_then(|s| s.as_str())
        .is_some_and(|s| s.parse::<RideStatus>().is_err());
    if unknown {
        ride["status"] = serde_json::Value::from("searching");
    }
}

/// Reqwest-backed production transport.
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestBackend {
    pub fn new(config: &TransportConfig) -> RideHailResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RideHailError::internal(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn submit_ride(
        &self,
        pickup: &Location,
        destination: &Location,
    ) -> Result<Ride, TransportError> {
        let response = self
            .client
            .post(format!("{}/rides/request", self.base_url))
            .json(&serde_json::json!({ "pickup": pickup, "destination": destination }))
            .send()
            .await
            .map_err(request_error)?;
        decode_ride(&read_body(response).await?)
    }

    async fn fetch_ride(&self, ride_id: &str) -> Result<Ride, TransportError> {
        let response = self
            .client
            .get(format!("{}/rides/{}", self.base_url, ride_id))
            .send()
            .await
            .map_err(request_error)?;
        decode_ride(&read_body(response).await?)
    }

    async fn cancel_ride(&self, ride_id: &str) -> Result<CancelOutcome, TransportError> {
        let response = self
            .client
            .post(format!("{}/rides/{}/cancel", self.base_url, ride_id))
            .send()
            .await
            .map_err(request_error)?;
        let body = read_body(response).await?;
        let mut value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        if let Some(ride) = value.get_mut("ride") {
            normalize_status(ride);
        }
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
