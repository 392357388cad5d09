//! Observable entity snapshots.
//!
//! Bridges the polling logic to whatever host consumes it. Each snapshot
//! carries a primary value, a flat attribute map, a unit tag and an
//! availability flag; hosts subscribe to the service's snapshot stream or
//! pull snapshots on demand and map them onto their own entity model.

use crate::compass::degrees_to_compass;
use crate::health::{HealthMetrics, HealthStatus};
use crate::{Location, MarineObservation};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const UNIT_METERS: &str = "m";
pub const UNIT_DEGREES: &str = "°";
pub const UNIT_SECONDS: &str = "s";
pub const UNIT_PERCENT: &str = "%";

/// Unique id of the API health entity.
pub const HEALTH_ENTITY_ID: &str = "marine_tracker_api_health";

/// A point-in-time rendering of one observable value.
#[derive(Clone, Debug, Serialize)]
pub struct EntitySnapshot {
    /// Stable identity across restarts
    pub unique_id: String,
    /// Display name
    pub name: String,
    /// Primary value: a number for marine sensors, a status string for the
    /// health sensor, null when unavailable
    pub value: Value,
    /// Unit tag of the primary value
    pub unit: Option<&'static str>,
    /// Suggested number of decimal places for display
    pub display_precision: Option<u8>,
    /// False once the observation has been cleared (or never populated)
    pub available: bool,
    /// Flat attribute map
    pub attributes: Map<String, Value>,
}

/// Build the marine sensor snapshot for one location.
///
/// The primary value is the swell wave height in meters. The attribute map
/// is the full field set (raw value plus unit tag, compass names for the
/// directional fields) and, when a health monitor is present, the current
/// API-health summary.
pub fn marine_snapshot(
    location: &Location,
    observation: &MarineObservation,
    health: Option<(HealthStatus, &HealthMetrics)>,
) -> EntitySnapshot {
    let mut attributes = Map::new();

    attributes.insert("latitude".to_string(), json!(location.latitude));
    attributes.insert("longitude".to_string(), json!(location.longitude));

    push_height(&mut attributes, "wave_height", observation.wave_height);
    push_direction(&mut attributes, "wave_direction", observation.wave_direction);
    push_period(&mut attributes, "wave_period", observation.wave_period);

    push_height(
        &mut attributes,
        "wind_wave_height",
        observation.wind_wave_height,
    );
    push_direction(
        &mut attributes,
        "wind_wave_direction",
        observation.wind_wave_direction,
    );
    push_period(
        &mut attributes,
        "wind_wave_period",
        observation.wind_wave_period,
    );
    push_period(
        &mut attributes,
        "wind_wave_peak_period",
        observation.wind_wave_peak_period,
    );

    push_height(
        &mut attributes,
        "swell_wave_height",
        observation.swell_wave_height,
    );
    push_direction(
        &mut attributes,
        "swell_wave_direction",
        observation.swell_wave_direction,
    );
    push_period(
        &mut attributes,
        "swell_wave_period",
        observation.swell_wave_period,
    );
    push_period(
        &mut attributes,
        "swell_wave_peak_period",
        observation.swell_wave_peak_period,
    );

    attributes.insert("timezone".to_string(), json_opt_str(&observation.timezone));
    attributes.insert("models".to_string(), json_opt_str(&observation.model));

    if let Some((status, metrics)) = health {
        attributes.insert("api_health_status".to_string(), json!(status.as_str()));
        attributes.insert(
            "api_success_rate".to_string(),
            json!(metrics.success_rate()),
        );
        attributes.insert("api_success_rate_unit".to_string(), json!(UNIT_PERCENT));
        attributes.insert(
            "api_avg_response_time".to_string(),
            json!(metrics.average_response_time()),
        );
        attributes.insert(
            "api_avg_response_time_unit".to_string(),
            json!(UNIT_SECONDS),
        );
        attributes.insert(
            "api_total_requests".to_string(),
            json!(metrics.total_checks),
        );
        attributes.insert(
            "api_failed_requests".to_string(),
            json!(metrics.error_count),
        );
    }

    EntitySnapshot {
        unique_id: location.unique_id(),
        name: format!("{} Current", location.name),
        value: json_opt(observation.swell_wave_height),
        unit: Some(UNIT_METERS),
        display_precision: Some(2),
        available: !observation.is_empty(),
        attributes,
    }
}

/// Build the API health sensor snapshot.
///
/// The primary value is the status name; the attributes are the full
/// metrics record.
pub fn health_snapshot(status: HealthStatus, metrics: &HealthMetrics) -> EntitySnapshot {
    let mut attributes = Map::new();

    attributes.insert("success_rate".to_string(), json!(metrics.success_rate()));
    attributes.insert("success_rate_unit".to_string(), json!(UNIT_PERCENT));
    attributes.insert(
        "average_response_time".to_string(),
        json!(metrics.average_response_time()),
    );
    attributes.insert(
        "average_response_time_unit".to_string(),
        json!(UNIT_SECONDS),
    );
    attributes.insert("total_requests".to_string(), json!(metrics.total_checks));
    attributes.insert("failed_requests".to_string(), json!(metrics.error_count));
    attributes.insert(
        "consecutive_failures".to_string(),
        json!(metrics.consecutive_failures),
    );
    attributes.insert(
        "consecutive_successes".to_string(),
        json!(metrics.consecutive_successes),
    );
    attributes.insert("last_check".to_string(), json_timestamp(&metrics.last_check));
    attributes.insert(
        "last_success".to_string(),
        json_timestamp(&metrics.last_success),
    );
    attributes.insert(
        "last_failure".to_string(),
        json_timestamp(&metrics.last_failure),
    );
    attributes.insert(
        "response_times".to_string(),
        json!(metrics.response_times),
    );

    EntitySnapshot {
        unique_id: HEALTH_ENTITY_ID.to_string(),
        name: "Open Meteo Marine Weather API Health".to_string(),
        value: json!(status.as_str()),
        unit: None,
        display_precision: None,
        available: true,
        attributes,
    }
}

// -- Private Implementation --

fn push_height(attributes: &mut Map<String, Value>, name: &str, value: Option<f64>) {
    attributes.insert(name.to_string(), json_opt(value));
    attributes.insert(format!("{name}_unit"), json!(UNIT_METERS));
}

fn push_direction(attributes: &mut Map<String, Value>, name: &str, value: Option<f64>) {
    attributes.insert(name.to_string(), json_opt(value));
    attributes.insert(format!("{name}_unit"), json!(UNIT_DEGREES));
    attributes.insert(format!("{name}_name"), json!(degrees_to_compass(value)));
}

fn push_period(attributes: &mut Map<String, Value>, name: &str, value: Option<f64>) {
    attributes.insert(name.to_string(), json_opt(value));
    attributes.insert(format!("{name}_unit"), json!(UNIT_SECONDS));
}

fn json_opt(value: Option<f64>) -> Value {
    value.map_or(Value::Null, |v| json!(v))
}

fn json_opt_str(value: &Option<String>) -> Value {
    value.as_deref().map_or(Value::Null, |v| json!(v))
}

fn json_timestamp(value: &Option<chrono::DateTime<chrono::Utc>>) -> Value {
    value.map_or(Value::Null, |t| json!(t.to_rfc3339()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marine_data::shape;
    use serde_json::json;

    fn location() -> Location {
        Location::new("Kings Beach", -26.8017, 153.1426)
    }

    fn shaped_observation() -> MarineObservation {
        shape(&json!({
            "current": {
                "wave_height": 1.2,
                "wave_direction": 90,
                "swell_wave_height": 0.9,
                "swell_wave_direction": 170,
                "swell_wave_period": 11.0
            },
            "timezone": "UTC"
        }))
        .unwrap()
    }

    #[test]
    fn marine_snapshot_carries_value_and_units() {
        let snapshot = marine_snapshot(&location(), &shaped_observation(), None);

        assert_eq!(snapshot.unique_id, "-26.8017_153.1426_Kings_Beach_current");
        assert_eq!(snapshot.name, "Kings Beach Current");
        assert_eq!(snapshot.value, json!(0.9));
        assert_eq!(snapshot.unit, Some(UNIT_METERS));
        assert_eq!(snapshot.display_precision, Some(2));
        assert!(snapshot.available);

        assert_eq!(snapshot.attributes["wave_height"], json!(1.2));
        assert_eq!(snapshot.attributes["wave_height_unit"], json!("m"));
        assert_eq!(snapshot.attributes["wave_direction_name"], json!("E"));
        assert_eq!(snapshot.attributes["swell_wave_direction_name"], json!("S"));
        assert_eq!(snapshot.attributes["swell_wave_period_unit"], json!("s"));
        assert_eq!(snapshot.attributes["timezone"], json!("UTC"));
        assert_eq!(snapshot.attributes["models"], json!("best_match"));
        assert_eq!(snapshot.attributes["latitude"], json!(-26.8017));
    }

    #[test]
    fn marine_snapshot_keeps_nulls_null() {
        let snapshot = marine_snapshot(&location(), &shaped_observation(), None);

        // Fields the upstream skipped stay null, with their unit tag and an
        // Unknown compass name
        assert_eq!(snapshot.attributes["wind_wave_height"], Value::Null);
        assert_eq!(snapshot.attributes["wind_wave_direction"], Value::Null);
        assert_eq!(
            snapshot.attributes["wind_wave_direction_name"],
            json!("Unknown")
        );
    }

    #[test]
    fn empty_observation_renders_unavailable() {
        let snapshot = marine_snapshot(&location(), &MarineObservation::empty(), None);

        assert!(!snapshot.available);
        assert_eq!(snapshot.value, Value::Null);
    }

    #[test]
    fn marine_snapshot_appends_health_summary_when_present() {
        let mut metrics = HealthMetrics::default();
        metrics.total_checks = 10;
        metrics.error_count = 3;
        metrics.response_times.push_back(0.5);

        let snapshot = marine_snapshot(
            &location(),
            &shaped_observation(),
            Some((HealthStatus::Degraded, &metrics)),
        );

        assert_eq!(snapshot.attributes["api_health_status"], json!("degraded"));
        assert_eq!(snapshot.attributes["api_success_rate"], json!(70.0));
        assert_eq!(snapshot.attributes["api_total_requests"], json!(10));
        assert_eq!(snapshot.attributes["api_failed_requests"], json!(3));
    }

    #[test]
    fn health_snapshot_exposes_full_metrics_record() {
        let mut metrics = HealthMetrics::default();
        metrics.consecutive_failures = 2;
        metrics.total_checks = 5;
        metrics.error_count = 2;
        metrics.response_times.push_back(1.0);
        metrics.response_times.push_back(3.0);

        let snapshot = health_snapshot(HealthStatus::Degraded, &metrics);

        assert_eq!(snapshot.unique_id, HEALTH_ENTITY_ID);
        assert_eq!(snapshot.value, json!("degraded"));
        assert!(snapshot.available);
        assert_eq!(snapshot.attributes["consecutive_failures"], json!(2));
        assert_eq!(snapshot.attributes["failed_requests"], json!(2));
        assert_eq!(snapshot.attributes["success_rate"], json!(60.0));
        assert_eq!(snapshot.attributes["average_response_time"], json!(2.0));
        assert_eq!(snapshot.attributes["last_check"], Value::Null);
        assert_eq!(snapshot.attributes["response_times"], json!([1.0, 3.0]));
    }
}
