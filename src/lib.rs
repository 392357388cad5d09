//! # Marine Tracker Core Library
//!
//! This library polls the Open-Meteo marine-weather API for a configured set
//! of coastal locations and exposes the results, together with a synthetic
//! API-health signal, as observable entity snapshots that a host integration
//! layer can consume.
//!
//! ## Architecture
//!
//! Two cooperating components, both driven by timer tasks owned by the
//! [`service::MarineService`]:
//!
//! - A [`fetcher::LocationFetcher`] per location calls the marine API on a
//!   30-minute cadence, shapes the JSON response into a [`MarineObservation`]
//!   and replaces the previous observation wholesale.
//! - A single shared [`health::HealthMonitor`] probes the same API with a
//!   minimal query on a 5-minute cadence, classifies every outcome into one
//!   of four statuses and tracks rolling statistics. Fetchers consult it
//!   before issuing a real request and ping it after any failed one.
//!
//! The two cadences are deliberately decoupled so a degraded API is detected
//! faster than any single location would notice from its own slower polling.
//!
//! ## Data Flow
//!
//! 1. **Probe**: minimal `current=wave_height` request → status classifier →
//!    health metrics and change notifications
//! 2. **Fetch**: full `current=...` request → [`marine_data::shape`] →
//!    [`MarineObservation`] → entity snapshot published to subscribers
//! 3. **Failure**: transport errors retain the last observation, decode
//!    errors clear it, and either kind triggers an out-of-band health probe
//!
//! ## Core Types
//!
//! - [`Location`]: an immutable named coordinate pair, also the identity key
//!   for the observable entity derived from it
//! - [`MarineObservation`]: one polled snapshot of marine field values,
//!   where `None` means "not reported by upstream for this tick"

use serde::{Deserialize, Serialize};

// Module declarations
pub mod compass;
pub mod config;
pub mod entity;
pub mod fetcher;
pub mod health;
pub mod marine_data;
pub mod service;

/// A monitored coastal location.
///
/// Immutable once constructed. The name plus coordinates form a stable
/// identity, so two configs describing the same spot map to the same
/// observable entity.
///
/// # Example
/// ```
/// use marine_tracker_lib::Location;
///
/// let loc = Location::new("Kings Beach", -26.8017, 153.1426);
/// assert_eq!(loc.unique_id(), "-26.8017_153.1426_Kings_Beach_current");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable location name
    pub name: String,
    /// Latitude in decimal degrees, in [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, in [-180, 180]
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Location {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Stable unique id for the observable entity backed by this location.
    pub fn unique_id(&self) -> String {
        format!(
            "{}_{}_{}_current",
            self.latitude,
            self.longitude,
            self.name.replace(' ', "_")
        )
    }
}

/// One polled snapshot of marine conditions for a single location.
///
/// Every field mirrors an Open-Meteo `current` key. `None` means the
/// upstream did not report the field for this tick and must never collapse
/// to zero. Directional fields carry degrees in [0, 360), heights are
/// meters, periods are seconds.
///
/// An observation is replaced wholesale on every successful poll; it is a
/// pure function of the latest API response and is never merged with
/// history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarineObservation {
    pub wave_height: Option<f64>,
    pub wave_direction: Option<f64>,
    pub wave_period: Option<f64>,
    pub wind_wave_height: Option<f64>,
    pub wind_wave_direction: Option<f64>,
    pub wind_wave_period: Option<f64>,
    pub wind_wave_peak_period: Option<f64>,
    pub swell_wave_height: Option<f64>,
    pub swell_wave_direction: Option<f64>,
    pub swell_wave_period: Option<f64>,
    pub swell_wave_peak_period: Option<f64>,
    /// Upstream timezone label, verbatim
    pub timezone: Option<String>,
    /// Upstream model identifier, verbatim
    pub model: Option<String>,
}

impl MarineObservation {
    /// The all-null observation, used both as the initial state and as the
    /// "cleared" state after an undecodable response.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field carries data. Drives the availability flag of the
    /// entity backed by this observation.
    pub fn is_empty(&self) -> bool {
        self.wave_height.is_none()
            && self.wave_direction.is_none()
            && self.wave_period.is_none()
            && self.wind_wave_height.is_none()
            && self.wind_wave_direction.is_none()
            && self.wind_wave_period.is_none()
            && self.wind_wave_peak_period.is_none()
            && self.swell_wave_height.is_none()
            && self.swell_wave_direction.is_none()
            && self.swell_wave_period.is_none()
            && self.swell_wave_peak_period.is_none()
            && self.timezone.is_none()
            && self.model.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_id_is_stable_and_distinct() {
        let a = Location::new("Kings Beach", -26.8017, 153.1426);
        let b = Location::new("Moffat Beach", -26.7905, 153.14);

        assert_eq!(a.unique_id(), a.unique_id());
        assert_ne!(a.unique_id(), b.unique_id());
        assert!(a.unique_id().ends_with("_current"));
    }

    #[test]
    fn empty_observation_is_empty() {
        assert!(MarineObservation::empty().is_empty());

        let obs = MarineObservation {
            swell_wave_height: Some(1.2),
            ..MarineObservation::empty()
        };
        assert!(!obs.is_empty());
    }

    #[test]
    fn observation_roundtrips_through_json() {
        let obs = MarineObservation {
            wave_height: Some(1.2),
            wave_direction: Some(90.0),
            timezone: Some("UTC".to_string()),
            model: Some("best_match".to_string()),
            ..MarineObservation::empty()
        };

        let json = serde_json::to_string(&obs).unwrap();
        let back: MarineObservation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }
}
