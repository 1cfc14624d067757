//! Map projection of the display set.
//!
//! The browser page draws whatever these descriptors say; nothing here keeps
//! state of its own.

use serde::Serialize;

use crate::models::{Coordinates, EarthquakeEvent, ImpactLevel};
use crate::output::format_datetime;

/// Center used when the user's location is unknown.
pub const DEFAULT_CENTER: Coordinates = Coordinates::new(15.870_032, 100.992_541);

/// Zoom when no user location is known.
pub const DEFAULT_ZOOM: u8 = 5;

/// Zoom when centered on the user.
pub const USER_ZOOM: u8 = 6;

/// Zoom after flying to a selected event.
pub const FLY_TO_ZOOM: u8 = 10;

/// Duration of the fly-to animation in milliseconds.
pub const FLY_TO_DURATION_MS: u32 = 1000;

/// Marker pixel size per unit of magnitude.
const PX_PER_MAGNITUDE: f64 = 8.0;

/// Everything the map needs to draw one earthquake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerDescriptor {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub size_px: f64,
    pub color: &'static str,
    pub title: String,
    pub popup: String,
    pub selected: bool,
}

/// Fill color for an impact level.
#[must_use]
pub const fn impact_color(level: ImpactLevel) -> &'static str {
    match level {
        ImpactLevel::Minor => "rgba(0, 128, 0, 0.6)",
        ImpactLevel::Moderate => "rgba(255, 255, 0, 0.6)",
        ImpactLevel::Major => "rgba(255, 165, 0, 0.6)",
        ImpactLevel::Severe => "rgba(255, 0, 0, 0.6)",
    }
}

#[must_use]
pub fn marker_for(event: &EarthquakeEvent, selected: bool) -> MarkerDescriptor {
    let time = format_datetime(event.time);
    MarkerDescriptor {
        id: event.id.clone(),
        latitude: event.coordinates.latitude,
        longitude: event.coordinates.longitude,
        size_px: (event.magnitude * PX_PER_MAGNITUDE).max(0.0),
        color: impact_color(event.impact_level),
        title: event.title.clone(),
        popup: format!("Magnitude: {}\nTime: {time}", event.magnitude),
        selected,
    }
}

/// One marker per displayed event.
#[must_use]
pub fn markers(events: &[EarthquakeEvent], selected: Option<&str>) -> Vec<MarkerDescriptor> {
    events
        .iter()
        .map(|e| marker_for(e, selected == Some(e.id.as_str())))
        .collect()
}

/// Camera position and the animation used to get there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapCamera {
    pub center: Coordinates,
    pub zoom: u8,
    pub duration_ms: u32,
}

impl MapCamera {
    /// Starting view: the user if known, otherwise the default center.
    #[must_use]
    pub fn initial(user_location: Option<Coordinates>) -> Self {
        match user_location {
            Some(center) => Self {
                center,
                zoom: USER_ZOOM,
                duration_ms: 0,
            },
            None => Self {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
                duration_ms: 0,
            },
        }
    }

    /// Animated move used when an event is selected.
    #[must_use]
    pub fn fly_to(center: Coordinates) -> Self {
        Self {
            center,
            zoom: FLY_TO_ZOOM,
            duration_ms: FLY_TO_DURATION_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::classify;

    fn quake(id: &str, magnitude: f64) -> EarthquakeEvent {
        EarthquakeEvent {
            id: id.into(),
            title: format!("M {magnitude}"),
            time: 0,
            coordinates: Coordinates::new(35.0, 139.0),
            magnitude,
            depth: 10.0,
            impact_level: classify(magnitude),
            place: "Honshu".into(),
            url: String::new(),
            felt: None,
            tsunami: false,
            distance_from_user: None,
        }
    }

    #[test]
    fn test_marker_size_and_color() {
        let marker = marker_for(&quake("a", 7.2), false);
        assert!((marker.size_px - 57.6).abs() < 1e-9);
        assert_eq!(marker.color, "rgba(255, 0, 0, 0.6)");
        assert!((marker.latitude - 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_magnitude_has_no_negative_size() {
        let marker = marker_for(&quake("a", -0.5), false);
        assert!(marker.size_px.abs() < f64::EPSILON);
    }

    #[test]
    fn test_markers_flag_selection() {
        let events = vec![quake("a", 2.0), quake("b", 5.0)];
        let out = markers(&events, Some("b"));
        assert!(!out[0].selected);
        assert!(out[1].selected);
        assert_eq!(out[1].color, impact_color(ImpactLevel::Moderate));
    }

    #[test]
    fn test_camera() {
        let initial = MapCamera::initial(None);
        assert_eq!(initial.center, DEFAULT_CENTER);
        assert_eq!(initial.zoom, DEFAULT_ZOOM);

        let here = Coordinates::new(1.0, 2.0);
        assert_eq!(MapCamera::initial(Some(here)).zoom, USER_ZOOM);

        let fly = MapCamera::fly_to(here);
        assert_eq!(fly.zoom, FLY_TO_ZOOM);
        assert_eq!(fly.duration_ms, FLY_TO_DURATION_MS);
    }
}
