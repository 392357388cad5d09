//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! marine-config.toml file: the monitored locations, the health-monitor
//! thresholds and the polling cadences. Locations are validated with
//! field-specific errors before any polling logic ever sees them.

use crate::health::HealthConfig;
use crate::Location;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration-time validation errors.
///
/// These surface synchronously at setup; an invalid location never reaches
/// the polling logic.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// The locations list is empty
    #[error("no locations configured")]
    NoLocations,

    /// A location is missing its name
    #[error("location name must not be empty")]
    EmptyName,

    /// Latitude outside [-90, 90]
    #[error("latitude {latitude} for \"{name}\" is outside [-90, 90]")]
    InvalidLatitude { name: String, latitude: f64 },

    /// Longitude outside [-180, 180]
    #[error("longitude {longitude} for \"{name}\" is outside [-180, 180]")]
    InvalidLongitude { name: String, longitude: f64 },
}

/// Application configuration loaded from marine-config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service-level settings
    pub service: ServiceConfig,
    /// Monitored locations, fixed for the life of the running instance
    pub locations: Vec<Location>,
    /// Health-monitor thresholds and probe cadence
    pub health: HealthConfig,
    /// Data-fetch cadence and request settings
    pub polling: PollingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Display name of the running instance
    pub name: String,
}

/// Data-fetch cadence and request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Minutes between full fetches per location
    pub fetch_interval_minutes: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Timezone parameter passed through to the API
    pub timezone: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            name: "Open Meteo Marine Weather".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            fetch_interval_minutes: 30,
            request_timeout_secs: 10,
            timezone: "auto".to_string(),
        }
    }
}

impl PollingConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: ServiceConfig::default(),
            locations: vec![
                Location::new("Alexandra Headlands", -26.6715, 153.1006),
                Location::new("Kings Beach", -26.8017, 153.1426),
                Location::new("Moffat Beach", -26.7905, 153.14),
            ],
            health: HealthConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from marine-config.toml in the working directory.
    /// Falls back to the default configuration if the file doesn't exist or
    /// is invalid.
    pub fn load() -> Self {
        Self::load_from_path("marine-config.toml")
    }

    /// Load configuration from the specified path.
    /// Falls back to the default configuration if the file doesn't exist or
    /// is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        locations = config.locations.len(),
                        "loaded configuration for \"{}\"", config.service.name
                    );
                    config
                }
                Err(err) => {
                    warn!(error = %err, "invalid config file format, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Validate the configured locations, surfacing the first field-specific
    /// error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }
        for location in &self.locations {
            if location.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(ConfigError::InvalidLatitude {
                    name: location.name.clone(),
                    latitude: location.latitude,
                });
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(ConfigError::InvalidLongitude {
                    name: location.name.clone(),
                    longitude: location.longitude,
                });
            }
        }
        Ok(())
    }
}

/// Parse a compact locations string into a list of locations.
///
/// Expected format: `"Name1,lat1,lon1;Name2,lat2,lon2;..."`. Malformed
/// entries are skipped with a warning rather than failing the whole list,
/// so one typo doesn't take out every location a host supplied.
pub fn parse_locations(locations_string: &str) -> Vec<Location> {
    let mut locations = Vec::new();

    for part in locations_string.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let values: Vec<&str> = part.split(',').map(str::trim).collect();
        if values.len() != 3 {
            warn!(entry = part, "invalid location format (expected: name,lat,lon)");
            continue;
        }

        let (name, lat_str, lon_str) = (values[0], values[1], values[2]);
        if name.is_empty() {
            warn!(entry = part, "empty location name");
            continue;
        }

        let (latitude, longitude) = match (lat_str.parse::<f64>(), lon_str.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            _ => {
                warn!(entry = part, "invalid coordinates");
                continue;
            }
        };

        locations.push(Location::new(name, latitude, longitude));
    }

    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.locations.len(), 3);
        assert_eq!(config.locations[0].name, "Alexandra Headlands");
        assert_eq!(config.polling.fetch_interval_minutes, 30);
        assert_eq!(config.polling.request_timeout_secs, 10);
        assert_eq!(config.health.failure_threshold, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.locations, config.locations);
        assert_eq!(parsed.service.name, config.service.name);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fall back to default
        assert_eq!(config.locations.len(), 3);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[locations]]\nname = \"Test Reef\"\nlatitude = -27.0\nlongitude = 153.4\n"
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.locations.len(), 1);
        assert_eq!(config.locations[0].name, "Test Reef");
        // Unspecified sections keep their defaults
        assert_eq!(config.health.recovery_threshold, 2);
        assert_eq!(config.polling.fetch_interval_minutes, 30);
    }

    #[test]
    fn validate_rejects_out_of_range_latitude() {
        let config = Config {
            locations: vec![Location::new("Nowhere", 91.0, 0.0)],
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLatitude {
                name: "Nowhere".to_string(),
                latitude: 91.0
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_range_longitude() {
        let config = Config {
            locations: vec![Location::new("Nowhere", 0.0, -180.5)],
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLongitude {
                name: "Nowhere".to_string(),
                longitude: -180.5
            })
        );
    }

    #[test]
    fn validate_rejects_empty_inputs() {
        let config = Config {
            locations: vec![],
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoLocations));

        let config = Config {
            locations: vec![Location::new("  ", 0.0, 0.0)],
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyName));
    }

    #[test]
    fn parse_locations_handles_well_formed_string() {
        let parsed = parse_locations("Location A,-26.6715,153.1006;Location B,-26.8017,153.1426");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Location A");
        assert_eq!(parsed[1].latitude, -26.8017);
    }

    #[test]
    fn parse_locations_skips_malformed_entries() {
        let parsed = parse_locations("Good,1.0,2.0;missing-fields;,3.0,4.0;Bad,abc,def;;");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Good");
    }

    #[test]
    fn parse_locations_empty_string_is_empty() {
        assert!(parse_locations("").is_empty());
        assert!(parse_locations("   ").is_empty());
    }
}
