//! Degrees to 16-point compass-rose conversion.
//!
//! Maps a bearing in [0°, 360°) onto the ordered compass table starting at
//! N and going clockwise in 22.5° steps. Ties (11.25°, 33.75°, …) round to
//! the nearest even index, matching `f64::round_ties_even`; the boundary
//! behavior is pinned down by the tests below.

/// The 16 compass points, clockwise from north.
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Name returned when no bearing is available.
pub const UNKNOWN_DIRECTION: &str = "Unknown";

/// Convert a bearing in degrees into a compass direction name.
///
/// `None` (field not reported by upstream) maps to `"Unknown"`.
///
/// # Example
/// ```
/// use marine_tracker_lib::compass::degrees_to_compass;
///
/// assert_eq!(degrees_to_compass(Some(0.0)), "N");
/// assert_eq!(degrees_to_compass(Some(90.0)), "E");
/// assert_eq!(degrees_to_compass(None), "Unknown");
/// ```
pub fn degrees_to_compass(degrees: Option<f64>) -> &'static str {
    let Some(degrees) = degrees else {
        return UNKNOWN_DIRECTION;
    };
    let index = (degrees / 22.5).round_ties_even() as usize % 16;
    COMPASS_POINTS[index]
}
