//! # Service Runtime
//!
//! The running instance: it owns the HTTP client, the shared health
//! monitor, one fetcher per configured location, and the timer tasks that
//! drive them. Host lifecycle callbacks map onto [`MarineService::initialize`],
//! [`MarineService::start`] and [`MarineService::shutdown`].
//!
//! ## Scheduling
//!
//! Two independent cadences: the health probe (5 minutes) and the
//! per-location fetch (30 minutes). Each spawned task ticks on its own
//! `tokio::time::interval` with missed ticks skipped, and owns its own
//! cancellation token, so cancelling one never affects another. The first
//! tick of each interval fires immediately, which gives every entity an
//! initial value right after startup.
//!
//! ## Teardown
//!
//! Every spawned task is recorded in a registry. `shutdown` drains the
//! registry exactly once (it is idempotent), cancels every task, waits a
//! bounded grace period per task and aborts stragglers, so a stuck network
//! call can never block teardown indefinitely.

use crate::config::{Config, ConfigError};
use crate::entity::{self, EntitySnapshot};
use crate::fetcher::LocationFetcher;
use crate::health::HealthMonitor;
use crate::marine_data;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur while bringing the service up.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// User-supplied configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A live background task tracked for teardown.
struct RegisteredTask {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A running marine-tracker instance.
pub struct MarineService {
    config: Config,
    client: reqwest::Client,
    monitor: Arc<HealthMonitor>,
    fetchers: Vec<Arc<LocationFetcher>>,
    tasks: Mutex<Vec<RegisteredTask>>,
    snapshots: broadcast::Sender<EntitySnapshot>,
}

impl std::fmt::Debug for MarineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarineService")
            .field("config", &self.config)
            .field("fetchers", &self.fetchers.len())
            .finish_non_exhaustive()
    }
}

impl MarineService {
    /// Validate the configuration and construct the service.
    ///
    /// Validation errors surface here, synchronously, before any polling
    /// logic runs. No background tasks exist until [`start`] is called.
    ///
    /// [`start`]: MarineService::start
    pub fn initialize(config: Config) -> Result<Self, ServiceError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("marine-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // The probe hits the same endpoint as the fetchers; the first
        // configured location supplies its coordinates.
        let probe_location = config.locations[0].clone();
        let monitor = Arc::new(HealthMonitor::new(
            config.health.clone(),
            client.clone(),
            probe_location,
        ));

        let fetchers = config
            .locations
            .iter()
            .map(|location| {
                Arc::new(LocationFetcher::new(
                    location.clone(),
                    client.clone(),
                    Arc::clone(&monitor),
                    &config.polling,
                ))
            })
            .collect();

        let (snapshots, _) = broadcast::channel(64);

        info!(
            locations = config.locations.len(),
            "initialized \"{}\"", config.service.name
        );

        Ok(MarineService {
            config,
            client,
            monitor,
            fetchers,
            tasks: Mutex::new(Vec::new()),
            snapshots,
        })
    }

    /// Shared health monitor.
    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Subscribe to the entity snapshot stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EntitySnapshot> {
        self.snapshots.subscribe()
    }

    /// One minimal probe against the first configured location, logged but
    /// never fatal. Hosts call this at configuration time to give the user
    /// early feedback.
    pub async fn test_connectivity(&self) -> bool {
        let location = self.fetchers[0].location();
        match marine_data::probe(
            &self.client,
            location,
            self.config.health.probe_timeout(),
        )
        .await
        {
            Ok(()) => {
                info!(location = %location.name, "API connectivity test succeeded");
                true
            }
            Err(err) => {
                warn!(error = %err, "could not test API connection");
                false
            }
        }
    }

    /// Spawn the health-probe task and one fetch task per location.
    ///
    /// Calling `start` on an already started service is a logged no-op.
    pub fn start(&self) {
        {
            let tasks = self.tasks.lock();
            if !tasks.is_empty() {
                warn!("start called twice, background tasks already running");
                return;
            }
        }

        self.spawn_probe_loop();
        for fetcher in &self.fetchers {
            self.spawn_fetch_loop(Arc::clone(fetcher));
        }

        info!(
            probe_interval_secs = self.config.health.probe_interval().as_secs(),
            fetch_interval_secs = self.config.polling.fetch_interval().as_secs(),
            "background tasks started"
        );
    }

    /// Run one probe plus one fetch per location right now and return the
    /// resulting snapshots. Used by the one-shot mode and by hosts that
    /// drive their own scheduler.
    pub async fn poll_all(&self) -> Vec<EntitySnapshot> {
        self.monitor.check_now().await;
        for fetcher in &self.fetchers {
            fetcher.poll().await;
        }

        let mut out = Vec::with_capacity(self.fetchers.len() + 1);
        out.push(entity::health_snapshot(
            self.monitor.status(),
            &self.monitor.metrics(),
        ));
        out.extend(self.marine_snapshots());

        for snapshot in &out {
            let _ = self.snapshots.send(snapshot.clone());
        }
        out
    }

    /// Current marine snapshots for every location.
    pub fn marine_snapshots(&self) -> Vec<EntitySnapshot> {
        let status = self.monitor.status();
        let metrics = self.monitor.metrics();
        self.fetchers
            .iter()
            .map(|fetcher| {
                entity::marine_snapshot(
                    fetcher.location(),
                    &fetcher.observation(),
                    Some((status, &metrics)),
                )
            })
            .collect()
    }

    /// Current health snapshot.
    pub fn health_snapshot(&self) -> EntitySnapshot {
        entity::health_snapshot(self.monitor.status(), &self.monitor.metrics())
    }

    /// Number of live background tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Diagnostics report: config summary, health metrics, sensor states
    /// and live resource counts.
    pub fn diagnostics(&self) -> Value {
        let sensors: Vec<Value> = self
            .marine_snapshots()
            .iter()
            .chain(std::iter::once(&self.health_snapshot()))
            .map(|snapshot| {
                json!({
                    "name": snapshot.name,
                    "unique_id": snapshot.unique_id,
                    "value": snapshot.value,
                    "available": snapshot.available,
                })
            })
            .collect();
        let active_sensors = sensors
            .iter()
            .filter(|s| s["available"] == json!(true))
            .count();

        json!({
            "service": {
                "name": self.config.service.name,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "config": {
                "locations": self.config.locations.len(),
                "fetch_interval_minutes": self.config.polling.fetch_interval_minutes,
                "probe_interval_minutes": self.config.health.probe_interval_minutes,
            },
            "api_health": {
                "status": self.monitor.status().as_str(),
                "metrics": serde_json::to_value(self.monitor.metrics())
                    .unwrap_or(Value::Null),
            },
            "sensors": sensors,
            "statistics": {
                "total_sensors": self.fetchers.len() + 1,
                "active_sensors": active_sensors,
            },
            "resources": {
                "tasks": self.task_count(),
            },
        })
    }

    /// Cancel every background task and wait out a bounded grace period per
    /// task. Idempotent: the second call finds an empty registry.
    pub async fn shutdown(&self, grace: Duration) {
        let tasks: Vec<RegisteredTask> = {
            let mut registry = self.tasks.lock();
            registry.drain(..).collect()
        };

        if tasks.is_empty() {
            debug!("shutdown: no live background tasks");
            return;
        }

        info!(tasks = tasks.len(), "shutting down background tasks");
        for task in &tasks {
            task.cancel.cancel();
        }

        for task in tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout(grace, task.handle).await {
                Ok(_) => debug!(task = %task.name, "task stopped"),
                Err(_) => {
                    warn!(
                        task = %task.name,
                        grace_secs = grace.as_secs(),
                        "task did not stop within grace period, aborting"
                    );
                    abort.abort();
                }
            }
        }
    }

    // -- Private Implementation --

    fn spawn_probe_loop(&self) {
        let cancel = CancellationToken::new();
        let monitor = Arc::clone(&self.monitor);
        let snapshots = self.snapshots.clone();
        let period = self.config.health.probe_interval();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("health probe task shutting down");
                            break;
                        }
                        _ = ticker.tick() => {
                            monitor.check_now().await;
                            let snapshot = entity::health_snapshot(
                                monitor.status(),
                                &monitor.metrics(),
                            );
                            let _ = snapshots.send(snapshot);
                        }
                    }
                }
            }
        });

        self.register_task("health-probe", cancel, handle);
    }

    fn spawn_fetch_loop(&self, fetcher: Arc<LocationFetcher>) {
        let cancel = CancellationToken::new();
        let monitor = Arc::clone(&self.monitor);
        let snapshots = self.snapshots.clone();
        let period = self.config.polling.fetch_interval();
        let name = format!("fetch:{}", fetcher.location().name);

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(location = %fetcher.location().name, "fetch task shutting down");
                            break;
                        }
                        _ = ticker.tick() => {
                            fetcher.poll().await;
                            let metrics = monitor.metrics();
                            let snapshot = entity::marine_snapshot(
                                fetcher.location(),
                                &fetcher.observation(),
                                Some((monitor.status(), &metrics)),
                            );
                            let _ = snapshots.send(snapshot);
                        }
                    }
                }
            }
        });

        self.register_task(name, cancel, handle);
    }

    fn register_task(
        &self,
        name: impl Into<String>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    ) {
        self.tasks.lock().push(RegisteredTask {
            name: name.into(),
            cancel,
            handle,
        });
    }
}
