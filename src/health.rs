//! # API Health Monitoring
//!
//! This module tracks the health of the upstream marine API independently of
//! the per-location data fetchers. A single shared monitor probes the API
//! with a minimal query on its own cadence, classifies every outcome, and
//! keeps rolling statistics that fetchers consult before issuing real
//! requests.
//!
//! ## Status Classification
//!
//! Four statuses: `unknown` (initial), `healthy`, `degraded`, `unhealthy`.
//! The status is recomputed after every probe, never partially:
//!
//! - A failed probe (transport error, non-200 status, undecodable body or a
//!   body without `current`) increments the failure streak. Three
//!   consecutive failures mean `unhealthy`; fewer mean `degraded`.
//! - A successful probe increments the success streak and resets the
//!   failure streak. A slow success (latency above the cutoff) is
//!   `degraded` regardless of streak; a lone fast success after failures is
//!   also `degraded`. Only two consecutive fast successes restore
//!   `healthy`.
//!
//! The streak lengths, the slow cutoff and the probe cadence are carried in
//! [`HealthConfig`] rather than hardcoded.
//!
//! ## Metrics
//!
//! Every probe updates the last-check timestamp, the success/failure
//! timestamps, cumulative counters and a FIFO window of the last 10
//! response-time samples. Success rate and average response time are
//! derived, never stored.
//!
//! ## Notifications
//!
//! On any status change the monitor emits a [`HealthTransition`] carrying
//! the old status, the new status and a metrics snapshot. That event and
//! the metrics themselves are the monitor's only externally observable
//! side effects; nothing outside this module can set the status directly.

use crate::marine_data;
use crate::Location;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Maximum number of response-time samples retained.
pub const RESPONSE_WINDOW: usize = 10;

/// Classification of the upstream API's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health-monitor thresholds and probe cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before the API is considered unhealthy
    pub failure_threshold: u32,
    /// Consecutive fast successes required to restore healthy
    pub recovery_threshold: u32,
    /// Latency in seconds above which a success still counts as degraded
    pub slow_response_secs: f64,
    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Minutes between scheduled probes
    pub probe_interval_minutes: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            failure_threshold: 3,
            recovery_threshold: 2,
            slow_response_secs: 5.0,
            probe_timeout_secs: 10,
            probe_interval_minutes: 5,
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_minutes * 60)
    }
}

/// Rolling statistics attached to the health status.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HealthMetrics {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_check: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    /// FIFO window of the last [`RESPONSE_WINDOW`] latency samples, seconds
    pub response_times: VecDeque<f64>,
    pub error_count: u64,
    pub total_checks: u64,
}

impl HealthMetrics {
    /// Percentage of checks that succeeded, in [0, 100].
    pub fn success_rate(&self) -> f64 {
        let successes = self.total_checks - self.error_count;
        successes as f64 / self.total_checks.max(1) as f64 * 100.0
    }

    /// Mean of the retained response-time samples, 0.0 when none exist.
    pub fn average_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
    }
}

/// Notification emitted whenever the status changes.
#[derive(Clone, Debug)]
pub struct HealthTransition {
    pub old_status: HealthStatus,
    pub new_status: HealthStatus,
    pub metrics: HealthMetrics,
}

struct HealthState {
    status: HealthStatus,
    metrics: HealthMetrics,
}

/// Shared monitor of the upstream API's health.
///
/// One instance serves every fetcher. Status and metrics are read through
/// consistent snapshots; only the monitor's own recording methods mutate
/// them.
pub struct HealthMonitor {
    config: HealthConfig,
    client: reqwest::Client,
    probe_location: Location,
    state: RwLock<HealthState>,
    events: broadcast::Sender<HealthTransition>,
}

impl HealthMonitor {
    /// Create a monitor probing the API at the given location's
    /// coordinates.
    pub fn new(config: HealthConfig, client: reqwest::Client, probe_location: Location) -> Self {
        let (events, _) = broadcast::channel(16);
        HealthMonitor {
            config,
            client,
            probe_location,
            state: RwLock::new(HealthState {
                status: HealthStatus::Unknown,
                metrics: HealthMetrics::default(),
            }),
            events,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Current status.
    pub fn status(&self) -> HealthStatus {
        self.state.read().status
    }

    /// Consistent snapshot of the current metrics.
    pub fn metrics(&self) -> HealthMetrics {
        self.state.read().metrics.clone()
    }

    /// Subscribe to status-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthTransition> {
        self.events.subscribe()
    }

    /// Run one probe cycle: issue the minimal request, time it and record
    /// the classified outcome.
    pub async fn check_now(&self) {
        let started = Instant::now();
        let result = marine_data::probe(
            &self.client,
            &self.probe_location,
            self.config.probe_timeout(),
        )
        .await;
        let latency = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                debug!(latency_secs = latency, "health probe succeeded");
                self.record_success(latency);
            }
            Err(err) => {
                warn!(reason = %err, latency_secs = latency, "health probe failed");
                self.record_failure(latency);
            }
        }
    }

    /// Record a successful probe with its latency in seconds.
    ///
    /// Split out from the network I/O so the classification is a plain
    /// synchronous state transition.
    pub fn record_success(&self, latency_secs: f64) {
        let transition = {
            let mut state = self.state.write();
            let now = Utc::now();

            state.metrics.consecutive_successes += 1;
            state.metrics.consecutive_failures = 0;
            state.metrics.total_checks += 1;
            state.metrics.last_check = Some(now);
            state.metrics.last_success = Some(now);
            push_latency(&mut state.metrics.response_times, latency_secs);

            let new_status = if latency_secs > self.config.slow_response_secs {
                // A slow success does not count as full health
                HealthStatus::Degraded
            } else if state.metrics.consecutive_successes >= self.config.recovery_threshold {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            };

            self.apply_status(&mut state, new_status)
        };

        self.notify(transition);
    }

    /// Record a failed probe with its latency in seconds.
    pub fn record_failure(&self, latency_secs: f64) {
        let transition = {
            let mut state = self.state.write();
            let now = Utc::now();

            state.metrics.consecutive_failures += 1;
            state.metrics.consecutive_successes = 0;
            state.metrics.error_count += 1;
            state.metrics.total_checks += 1;
            state.metrics.last_check = Some(now);
            state.metrics.last_failure = Some(now);
            push_latency(&mut state.metrics.response_times, latency_secs);

            let new_status = if state.metrics.consecutive_failures >= self.config.failure_threshold
            {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            };

            self.apply_status(&mut state, new_status)
        };

        self.notify(transition);
    }

    fn apply_status(
        &self,
        state: &mut HealthState,
        new_status: HealthStatus,
    ) -> Option<HealthTransition> {
        let old_status = state.status;
        state.status = new_status;
        (old_status != new_status).then(|| HealthTransition {
            old_status,
            new_status,
            metrics: state.metrics.clone(),
        })
    }

    fn notify(&self, transition: Option<HealthTransition>) {
        if let Some(transition) = transition {
            info!(
                old = %transition.old_status,
                new = %transition.new_status,
                success_rate = transition.metrics.success_rate(),
                "API health status changed"
            );
            // Nobody listening is fine
            let _ = self.events.send(transition);
        }
    }
}

fn push_latency(window: &mut VecDeque<f64>, latency_secs: f64) {
    window.push_back(latency_secs);
    while window.len() > RESPONSE_WINDOW {
        window.pop_front();
    }
}
