//! Display-set derivation: filtering, sorting and the display limit.
//!
//! Everything here is a pure function of the accumulated records and the
//! user's filter/sort choices. The accumulated set itself is never touched.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{EarthquakeEvent, ImpactLevel};

/// Maximum number of records handed to the views.
pub const DISPLAY_LIMIT: usize = 500;

/// Optional inclusive time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Inclusive magnitude window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

impl MagnitudeRange {
    /// Build a range, pulling `min` down to `max` if they cross.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: min.min(max),
            max,
        }
    }

    #[must_use]
    pub fn contains(&self, magnitude: f64) -> bool {
        magnitude >= self.min && magnitude <= self.max
    }
}

impl Default for MagnitudeRange {
    fn default() -> Self {
        Self { min: 0.0, max: 10.0 }
    }
}

/// Combined filter criteria. A record must satisfy all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub date_range: DateRange,
    /// Accepted impact levels; empty accepts everything
    #[serde(rename = "impactLevel")]
    pub impact_levels: BTreeSet<ImpactLevel>,
    /// Minimum distance from the user in kilometers
    pub min_distance: Option<f64>,
    pub magnitude_range: MagnitudeRange,
}

impl FilterOptions {
    /// Check if an event passes all filter criteria.
    #[must_use]
    pub fn matches(&self, event: &EarthquakeEvent) -> bool {
        self.check_date_range(event)
            && self.check_impact_level(event)
            && self.check_distance(event)
            && self.magnitude_range.contains(event.magnitude)
    }

    fn check_date_range(&self, event: &EarthquakeEvent) -> bool {
        let after_start = self
            .date_range
            .start
            .is_none_or(|start| event.time >= start.timestamp_millis());
        let before_end = self
            .date_range
            .end
            .is_none_or(|end| event.time <= end.timestamp_millis());
        after_start && before_end
    }

    fn check_impact_level(&self, event: &EarthquakeEvent) -> bool {
        self.impact_levels.is_empty() || self.impact_levels.contains(&event.impact_level)
    }

    fn check_distance(&self, event: &EarthquakeEvent) -> bool {
        // Records with unknown distance always pass.
        match (self.min_distance, event.distance_from_user) {
            (Some(min), Some(distance)) => distance >= min,
            _ => true,
        }
    }
}

/// Sort order for the display set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOption {
    #[serde(rename = "mag-asc", alias = "magnitude-asc")]
    MagnitudeAsc,
    #[serde(rename = "mag-desc", alias = "magnitude-desc")]
    MagnitudeDesc,
    #[serde(rename = "time-asc")]
    TimeAsc,
    #[default]
    #[serde(rename = "time-desc")]
    TimeDesc,
    #[serde(rename = "distance-asc")]
    DistanceAsc,
}

impl SortOption {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MagnitudeAsc => "mag-asc",
            Self::MagnitudeDesc => "mag-desc",
            Self::TimeAsc => "time-asc",
            Self::TimeDesc => "time-desc",
            Self::DistanceAsc => "distance-asc",
        }
    }

    /// Compare two records under this ordering.
    #[must_use]
    pub fn compare(self, a: &EarthquakeEvent, b: &EarthquakeEvent) -> Ordering {
        match self {
            Self::MagnitudeAsc => a.magnitude.total_cmp(&b.magnitude),
            Self::MagnitudeDesc => b.magnitude.total_cmp(&a.magnitude),
            Self::TimeAsc => a.time.cmp(&b.time),
            Self::TimeDesc => b.time.cmp(&a.time),
            Self::DistanceAsc => match (a.distance_from_user, b.distance_from_user) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

impl std::str::FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mag-asc" | "magnitude-asc" => Ok(Self::MagnitudeAsc),
            "mag-desc" | "magnitude-desc" => Ok(Self::MagnitudeDesc),
            "time-asc" => Ok(Self::TimeAsc),
            "time-desc" => Ok(Self::TimeDesc),
            "distance-asc" => Ok(Self::DistanceAsc),
            _ => Err(format!(
                "unknown sort: {s} (expected: mag-asc, mag-desc, time-asc, time-desc, distance-asc)"
            )),
        }
    }
}

/// Filter, stable-sort and truncate to [`DISPLAY_LIMIT`].
#[must_use]
pub fn derive_display(
    events: &[EarthquakeEvent],
    filters: &FilterOptions,
    sort: SortOption,
) -> Vec<EarthquakeEvent> {
    let mut visible: Vec<&EarthquakeEvent> = events.iter().filter(|e| filters.matches(e)).collect();

    visible.sort_by(|a, b| sort.compare(a, b));
    visible.truncate(DISPLAY_LIMIT);

    visible.into_iter().cloned().collect()
}
