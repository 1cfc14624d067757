//! Distance and magnitude classification helpers.

use std::f64::consts::PI;

use crate::models::{Coordinates, ImpactLevel};

/// Earth radius in kilometers for haversine calculations.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Magnitude below which an event is `minor`.
pub const MODERATE_THRESHOLD: f64 = 4.0;
/// Magnitude below which an event is at most `moderate`.
pub const MAJOR_THRESHOLD: f64 = 5.5;
/// Magnitude at or above which an event is `severe`.
pub const SEVERE_THRESHOLD: f64 = 7.0;

/// Calculate the great-circle distance between two points using the haversine formula.
///
/// Returns distance in kilometers.
#[must_use]
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let lat1_rad = a.latitude * PI / 180.0;
    let lat2_rad = b.latitude * PI / 180.0;
    let delta_lat = (b.latitude - a.latitude) * PI / 180.0;
    let delta_lon = (b.longitude - a.longitude) * PI / 180.0;

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Bucket a magnitude into an impact level.
#[must_use]
pub fn classify(magnitude: f64) -> ImpactLevel {
    match magnitude {
        m if m < MODERATE_THRESHOLD => ImpactLevel::Minor,
        m if m < MAJOR_THRESHOLD => ImpactLevel::Moderate,
        m if m < SEVERE_THRESHOLD => ImpactLevel::Major,
        _ => ImpactLevel::Severe,
    }
}
