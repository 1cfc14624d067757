//! Data models for feed payloads and normalized earthquake records.
//!
//! The feed structures match the GeoJSON format of the USGS summary feeds,
//! but are deliberately lenient: anything the dashboard does not need is
//! optional so that a partially populated feature is still usable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::{classify, haversine_distance};

/// A single earthquake feature as delivered by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Unique event ID (stable dedupe key)
    pub id: String,

    /// Geographic location
    pub geometry: Geometry,

    /// Event properties
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    /// Get longitude (degrees).
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates.first().copied().unwrap_or(0.0)
    }

    /// Get latitude (degrees).
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates.get(1).copied().unwrap_or(0.0)
    }

    /// Get depth in kilometers (positive down).
    #[must_use]
    pub fn depth_km(&self) -> f64 {
        self.geometry.coordinates.get(2).copied().unwrap_or(0.0)
    }

    /// A feature is usable when it has an id and at least a lon/lat pair.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.id.is_empty() && self.geometry.coordinates.len() >= 2
    }
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    pub coordinates: Vec<f64>,
}

/// The subset of feed properties the dashboard reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Properties {
    /// Magnitude value
    pub mag: Option<f64>,

    /// Human-readable title
    pub title: Option<String>,

    /// Event time (ms since epoch)
    pub time: i64,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event page URL
    pub url: Option<String>,

    /// Number of "Did You Feel It?" reports
    pub felt: Option<u32>,

    /// Tsunami flag: 0 or 1
    pub tsunami: i32,
}

/// A point on the globe in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::str::FromStr for Coordinates {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "location requires 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in location: {e}"))?;
        let coords = Self::new(vals[0], vals[1]);

        if !(-90.0..=90.0).contains(&coords.latitude) {
            return Err(format!(
                "latitude {} out of range [-90, 90]",
                coords.latitude
            ));
        }
        if !(-180.0..=180.0).contains(&coords.longitude) {
            return Err(format!(
                "longitude {} out of range [-180, 180]",
                coords.longitude
            ));
        }

        Ok(coords)
    }
}

/// Coarse impact bucket derived from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Minor,
    Moderate,
    Major,
    Severe,
}

impl ImpactLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minor" => Ok(Self::Minor),
            "moderate" => Ok(Self::Moderate),
            "major" => Ok(Self::Major),
            "severe" => Ok(Self::Severe),
            _ => Err(format!(
                "unknown impact level: {s} (expected: minor, moderate, major, severe)"
            )),
        }
    }
}

/// Normalized earthquake record.
///
/// Records are immutable once created. `distance_from_user` is computed at
/// ingestion from the location known at that moment and is never refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeEvent {
    pub id: String,
    pub title: String,
    /// Event time (ms since epoch)
    pub time: i64,
    pub coordinates: Coordinates,
    pub magnitude: f64,
    /// Depth in kilometers
    pub depth: f64,
    pub impact_level: ImpactLevel,
    pub place: String,
    pub url: String,
    pub felt: Option<u32>,
    pub tsunami: bool,
    /// Kilometers from the user at ingestion time
    pub distance_from_user: Option<f64>,
}

impl EarthquakeEvent {
    /// Build a record from a feed feature and the current location snapshot.
    #[must_use]
    pub fn from_feature(feature: &Feature, user_location: Option<Coordinates>) -> Self {
        let coordinates = Coordinates::new(feature.latitude(), feature.longitude());
        let magnitude = feature.properties.mag.unwrap_or(0.0);
        let props = &feature.properties;

        Self {
            id: feature.id.clone(),
            title: props.title.clone().unwrap_or_default(),
            time: props.time,
            coordinates,
            magnitude,
            depth: feature.depth_km(),
            impact_level: classify(magnitude),
            place: props.place.clone().unwrap_or_default(),
            url: props.url.clone().unwrap_or_default(),
            felt: props.felt,
            tsunami: props.tsunami != 0,
            distance_from_user: user_location.map(|loc| haversine_distance(loc, coordinates)),
        }
    }
}
