//! # Per-Location Data Fetching
//!
//! One [`LocationFetcher`] exists per monitored location. Each tick it
//! consults the shared health monitor, optionally issues the full marine
//! request, and replaces its observation wholesale on success.
//!
//! ## Failure Policy
//!
//! - `unhealthy` API: the request is skipped entirely and the previous
//!   observation is retained; stale-but-present data beats no data.
//! - Transport errors, HTTP error statuses, timeouts and responses missing
//!   the `current` block retain the previous observation; the fetch failed,
//!   not the data.
//! - An undecodable body clears the observation to all-null, since the last
//!   data is no longer trustworthy once the parser itself fails.
//! - Every failed request triggers a fire-and-forget probe on the shared
//!   monitor; its result never blocks the fetch outcome.

use crate::config::PollingConfig;
use crate::health::{HealthMonitor, HealthStatus};
use crate::marine_data::{self, MarineError};
use crate::{Location, MarineObservation};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Polls the marine API for a single location.
pub struct LocationFetcher {
    location: Location,
    client: reqwest::Client,
    monitor: Arc<HealthMonitor>,
    timezone: String,
    timeout: Duration,
    observation: RwLock<MarineObservation>,
}

impl LocationFetcher {
    pub fn new(
        location: Location,
        client: reqwest::Client,
        monitor: Arc<HealthMonitor>,
        polling: &PollingConfig,
    ) -> Self {
        LocationFetcher {
            location,
            client,
            monitor,
            timezone: polling.timezone.clone(),
            timeout: polling.request_timeout(),
            observation: RwLock::new(MarineObservation::empty()),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Consistent snapshot of the latest observation.
    pub fn observation(&self) -> MarineObservation {
        self.observation.read().clone()
    }

    /// Run one polling tick: health gate, fetch, shape, publish.
    pub async fn poll(&self) {
        match self.monitor.status() {
            HealthStatus::Unhealthy => {
                warn!(
                    location = %self.location.name,
                    "skipping update, API is unhealthy"
                );
                return;
            }
            HealthStatus::Degraded => {
                debug!(
                    location = %self.location.name,
                    "API status is degraded, proceeding with caution"
                );
            }
            HealthStatus::Healthy | HealthStatus::Unknown => {}
        }

        let result = marine_data::fetch_current(
            &self.client,
            &self.location,
            &self.timezone,
            self.timeout,
        )
        .await
        .and_then(|body| marine_data::shape(&body));

        match result {
            Ok(observation) => {
                debug!(
                    location = %self.location.name,
                    swell_wave_height = ?observation.swell_wave_height,
                    "observation updated"
                );
                // Wholesale replacement; readers never see a partial update
                *self.observation.write() = observation;
            }
            Err(err) => {
                self.apply_failure(&err);
                self.trigger_health_check();
            }
        }
    }

    /// Apply the retain-vs-clear policy for a failed poll.
    fn apply_failure(&self, err: &MarineError) {
        if err.retains_observation() {
            warn!(
                location = %self.location.name,
                error = %err,
                "fetch failed, retaining previous observation"
            );
        } else {
            warn!(
                location = %self.location.name,
                error = %err,
                "undecodable response, clearing observation"
            );
            *self.observation.write() = MarineObservation::empty();
        }
    }

    /// Ask the shared monitor for an out-of-band probe without waiting for
    /// its result.
    fn trigger_health_check(&self) {
        let monitor = Arc::clone(&self.monitor);
        tokio::spawn(async move {
            monitor.check_now().await;
        });
    }

    #[cfg(test)]
    fn seed_observation(&self, observation: MarineObservation) {
        *self.observation.write() = observation;
    }
}
