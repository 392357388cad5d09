//! # Marine Tracker Application Entry Point
//!
//! This binary wires the library into a long-running daemon: it loads the
//! configuration, brings up the service, and runs until Ctrl-C, logging
//! entity snapshots as they are published. A `--once` flag runs a single
//! probe-and-fetch cycle and prints the resulting snapshots as JSON, which
//! is handy for checking a configuration without leaving the daemon up.

use std::env;
use std::time::Duration;

use marine_tracker_lib::{config::Config, service::MarineService};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for an in-flight request before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let once_mode = env::args().any(|arg| arg == "--once");

    let config = Config::load();
    let service = MarineService::initialize(config)?;

    if once_mode {
        let snapshots = service.poll_all().await;
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    // Early feedback on the API; a failure here is logged, not fatal
    service.test_connectivity().await;

    service.start();
    let mut snapshots = service.subscribe();
    info!("marine tracker running, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            received = snapshots.recv() => match received {
                Ok(snapshot) => {
                    info!(
                        entity = %snapshot.unique_id,
                        value = %snapshot.value,
                        available = snapshot.available,
                        "snapshot published"
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "snapshot stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    service.shutdown(SHUTDOWN_GRACE).await;
    info!("marine tracker stopped");
    Ok(())
}
