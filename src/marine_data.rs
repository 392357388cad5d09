//! # Open-Meteo Marine Data Fetching and Shaping
//!
//! This module handles all network operations against the Open-Meteo marine
//! API and the shaping of raw JSON responses into typed observations.
//!
//! ## Data Source
//!
//! ### Open-Meteo Marine API
//! - **URL**: <https://marine-api.open-meteo.com/v1/marine>
//! - **Query**: latitude/longitude plus a comma-separated `current` field
//!   list, a timezone and `models=best_match`
//! - **Format**: JSON object with a `current` sub-object of numeric-or-null
//!   fields and a `timezone` string
//!
//! ### Data Processing Pipeline
//! 1. **Fetch**: HTTP GET with a per-request timeout
//! 2. **Decode**: parse the body as JSON
//! 3. **Shape**: extract the fixed field set from `current` into a
//!    [`MarineObservation`], treating missing fields as null
//!
//! A minimal-query variant ([`probe`]) requests only `wave_height`; the
//! health monitor uses it to test the API without pulling a full payload.
//!
//! ## Error Handling
//!
//! The error taxonomy matters downstream: transport failures and HTTP error
//! statuses leave the caller's last observation intact, an undecodable body
//! clears it, and a missing `current` key is a failed poll that publishes
//! nothing. All variants propagate through [`MarineError`].

use crate::{Location, MarineObservation};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Base endpoint of the Open-Meteo marine API.
pub const API_URL: &str = "https://marine-api.open-meteo.com/v1/marine";

/// The full `current` field list requested on every fetch.
pub const CURRENT_FIELDS: &str = "wave_height,wave_direction,wave_period,\
wind_wave_height,wind_wave_direction,wind_wave_period,wind_wave_peak_period,\
swell_wave_height,swell_wave_direction,swell_wave_period,swell_wave_peak_period";

/// Model identifier requested from (and echoed back by) the API.
pub const MODEL: &str = "best_match";

/// Errors that can occur while fetching or shaping marine data.
#[derive(Error, Debug)]
pub enum MarineError {
    /// Transport-level failure (DNS, connection, protocol)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API returned status {0}")]
    Status(reqwest::StatusCode),

    /// The request exceeded its timeout
    #[error("Timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The body was not valid JSON
    #[error("undecodable response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Valid JSON, but the expected `current` block is absent
    #[error("response is missing the 'current' block")]
    MalformedResponse,
}

impl MarineError {
    /// True for the failure modes where the previous observation stays
    /// trustworthy (the fetch failed, not the data).
    pub fn retains_observation(&self) -> bool {
        !matches!(self, MarineError::Decode(_))
    }
}

/// Fetch the current marine conditions for a location.
///
/// Issues a single GET with the full field list and returns the decoded
/// JSON body. Callers pass the result through [`shape`] to obtain a typed
/// observation.
pub async fn fetch_current(
    client: &reqwest::Client,
    location: &Location,
    timezone: &str,
    timeout: Duration,
) -> Result<Value, MarineError> {
    let response = client
        .get(API_URL)
        .query(&current_query(location, timezone))
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| classify_transport(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MarineError::Status(status));
    }

    let body = response
        .text()
        .await
        .map_err(|err| classify_transport(err, timeout))?;

    Ok(serde_json::from_str(&body)?)
}

/// Issue the minimal health-probe request against the same endpoint.
///
/// Succeeds only on HTTP 200 with a well-formed `current` block; every
/// other outcome is the corresponding [`MarineError`].
pub async fn probe(
    client: &reqwest::Client,
    location: &Location,
    timeout: Duration,
) -> Result<(), MarineError> {
    let response = client
        .get(API_URL)
        .query(&[
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current", "wave_height".to_string()),
            ("timezone", "auto".to_string()),
        ])
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| classify_transport(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MarineError::Status(status));
    }

    let body: Value = serde_json::from_str(
        &response
            .text()
            .await
            .map_err(|err| classify_transport(err, timeout))?,
    )?;

    if body.get("current").is_none() {
        return Err(MarineError::MalformedResponse);
    }
    Ok(())
}

/// Shape a raw API response into a [`MarineObservation`].
///
/// Fails with [`MarineError::MalformedResponse`] when the `current` key is
/// absent. Missing individual fields inside `current` become `None`; that
/// is not an error.
pub fn shape(body: &Value) -> Result<MarineObservation, MarineError> {
    let current = body.get("current").ok_or(MarineError::MalformedResponse)?;
    let field = |name: &str| current.get(name).and_then(Value::as_f64);

    Ok(MarineObservation {
        wave_height: field("wave_height"),
        wave_direction: field("wave_direction"),
        wave_period: field("wave_period"),
        wind_wave_height: field("wind_wave_height"),
        wind_wave_direction: field("wind_wave_direction"),
        wind_wave_period: field("wind_wave_period"),
        wind_wave_peak_period: field("wind_wave_peak_period"),
        swell_wave_height: field("swell_wave_height"),
        swell_wave_direction: field("swell_wave_direction"),
        swell_wave_period: field("swell_wave_period"),
        swell_wave_peak_period: field("swell_wave_peak_period"),
        timezone: body
            .get("timezone")
            .and_then(Value::as_str)
            .map(String::from),
        model: Some(MODEL.to_string()),
    })
}

// -- Private Implementation --

fn current_query(location: &Location, timezone: &str) -> [(&'static str, String); 5] {
    [
        ("latitude", location.latitude.to_string()),
        ("longitude", location.longitude.to_string()),
        ("current", CURRENT_FIELDS.to_string()),
        ("timezone", timezone.to_string()),
        ("models", MODEL.to_string()),
    ]
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> MarineError {
    if err.is_timeout() {
        MarineError::Timeout(timeout)
    } else {
        MarineError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shape_extracts_all_fields() {
        let body = json!({
            "current": {
                "wave_height": 1.2,
                "wave_direction": 90,
                "wave_period": 8.5,
                "wind_wave_height": 0.4,
                "wind_wave_direction": 120,
                "wind_wave_period": 3.1,
                "wind_wave_peak_period": 4.0,
                "swell_wave_height": 1.0,
                "swell_wave_direction": 170,
                "swell_wave_period": 11.0,
                "swell_wave_peak_period": 12.5
            },
            "timezone": "UTC"
        });

        let obs = shape(&body).unwrap();
        assert_eq!(obs.wave_height, Some(1.2));
        assert_eq!(obs.wave_direction, Some(90.0));
        assert_eq!(obs.swell_wave_height, Some(1.0));
        assert_eq!(obs.swell_wave_peak_period, Some(12.5));
        assert_eq!(obs.timezone.as_deref(), Some("UTC"));
        assert_eq!(obs.model.as_deref(), Some("best_match"));
    }

    #[test]
    fn shape_treats_missing_fields_as_null() {
        let body = json!({
            "current": { "wave_height": 0.8 },
            "timezone": "Australia/Sydney"
        });

        let obs = shape(&body).unwrap();
        assert_eq!(obs.wave_height, Some(0.8));
        assert_eq!(obs.swell_wave_height, None);
        assert_eq!(obs.wind_wave_peak_period, None);
    }

    #[test]
    fn shape_propagates_explicit_nulls() {
        let body = json!({
            "current": { "wave_height": null, "wave_period": 7.0 }
        });

        let obs = shape(&body).unwrap();
        // null must stay null, never become zero
        assert_eq!(obs.wave_height, None);
        assert_eq!(obs.wave_period, Some(7.0));
        assert_eq!(obs.timezone, None);
    }

    #[test]
    fn shape_fails_without_current_block() {
        let body = json!({ "timezone": "UTC", "elevation": 0.0 });
        assert!(matches!(
            shape(&body),
            Err(MarineError::MalformedResponse)
        ));
    }

    #[test]
    fn retains_observation_matches_error_taxonomy() {
        let decode_err = serde_json::from_str::<Value>("not json").unwrap_err();
        assert!(!MarineError::Decode(decode_err).retains_observation());

        assert!(MarineError::MalformedResponse.retains_observation());
        assert!(MarineError::Timeout(Duration::from_secs(10)).retains_observation());
        assert!(
            MarineError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR).retains_observation()
        );
    }

    #[test]
    fn timeout_error_names_its_reason() {
        let err = MarineError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "Timeout after 10s");
    }

    #[test]
    fn current_query_carries_full_field_list() {
        let location = Location::new("Kings Beach", -26.8017, 153.1426);
        let query = current_query(&location, "auto");

        assert_eq!(query[0], ("latitude", "-26.8017".to_string()));
        assert_eq!(query[1], ("longitude", "153.1426".to_string()));
        assert!(query[2].1.contains("swell_wave_peak_period"));
        assert_eq!(query[2].1.matches(',').count(), 10);
        assert_eq!(query[4], ("models", "best_match".to_string()));
    }
}
