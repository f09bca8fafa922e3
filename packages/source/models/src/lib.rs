#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data source descriptors and the fetch contract types.
//!
//! A [`SourceDescriptor`] is the static metadata a source declares once at
//! registration: where it has data ([`Coverage`]), how far into the past or
//! future it can answer ([`TemporalCharacteristics`]), and which categories
//! and temporal types it produces. The engine uses descriptors to decide
//! which sources to invoke before any network call happens.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use risk_radar_alert_models::{Alert, AlertCategory, GeoPoint, SourceType, TemporalType};
use serde::{Deserialize, Serialize};

/// Geographic scope a source serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Coverage {
    /// Matches every query location.
    Global,
    /// A circle around a center point.
    Regional {
        /// Center of the covered area.
        center: GeoPoint,
        /// Radius of the covered area in meters.
        radius_meters: f64,
    },
}

impl Coverage {
    /// Returns `true` if `point` falls inside this coverage area.
    ///
    /// Regional coverage uses the haversine distance from the declared
    /// center, inclusive of the radius.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            Self::Global => true,
            Self::Regional {
                center,
                radius_meters,
            } => risk_radar_geography::within_radius(center, point, *radius_meters),
        }
    }
}

/// A source's declared ability to answer about the past and future.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalCharacteristics {
    /// Whether the source has data about time windows entirely in the past.
    #[serde(default)]
    pub supports_past: bool,
    /// Whether the source has data about time windows entirely in the
    /// future.
    #[serde(default)]
    pub supports_future: bool,
    /// How many minutes behind "now" published past data trails.
    #[serde(default)]
    pub data_lag_minutes: Option<u32>,
    /// How many minutes ahead of "now" scheduled data is visible.
    #[serde(default)]
    pub future_lookahead_minutes: Option<u32>,
    /// Free-text description of how fresh the data is.
    #[serde(default)]
    pub freshness_description: String,
}

/// Static metadata describing a registered source.
///
/// Set once at registration and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Unique registry key (e.g., `"nws"`, `"seattle_fire_911"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Adapter version string.
    pub version: String,
    /// What kind of upstream the source talks to.
    pub source_type: SourceType,
    /// Where the source has data.
    pub coverage: Coverage,
    /// How far back and ahead the source can answer.
    pub temporal: TemporalCharacteristics,
    /// Categories this source can produce.
    pub supported_categories: BTreeSet<AlertCategory>,
    /// Temporal types this source can produce.
    pub supported_temporal_types: BTreeSet<TemporalType>,
    /// Query radius to use when the caller does not provide one. Overrides
    /// the engine-wide default.
    #[serde(default)]
    pub default_radius_meters: Option<f64>,
}

/// A concrete, resolved time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window from its bounds.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `instant` lies inside the window (inclusive).
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Returns `true` if the interval `[start, end]` overlaps the window.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}

/// Parameters handed to a source's fetch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Query center.
    pub location: GeoPoint,
    /// Search radius in meters.
    pub radius_meters: f64,
    /// Resolved time window.
    pub time_window: TimeWindow,
    /// Maximum number of alerts the caller wants back.
    pub limit: Option<usize>,
    /// Category filter requested by the caller, if any.
    pub categories: Option<Vec<AlertCategory>>,
    /// Temporal-type filter requested by the caller, if any.
    pub temporal_types: Option<Vec<TemporalType>>,
}

/// What a source returns from a successful fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    /// Normalized alerts.
    pub alerts: Vec<Alert>,
    /// Whether the answer was served from a cache.
    pub from_cache: bool,
    /// Non-fatal problems encountered while fetching.
    pub warnings: Vec<String>,
}

impl FetchResult {
    /// Wraps a freshly fetched set of alerts.
    #[must_use]
    pub const fn new(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            from_cache: false,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_coverage_matches_everything() {
        assert!(Coverage::Global.contains(&GeoPoint::new(-33.86, 151.2)));
        assert!(Coverage::Global.contains(&GeoPoint::new(64.1, -21.9)));
    }

    #[test]
    fn regional_coverage_uses_radius() {
        let coverage = Coverage::Regional {
            center: GeoPoint::new(47.6062, -122.3321),
            radius_meters: 30_000.0,
        };
        assert!(coverage.contains(&GeoPoint::new(47.61, -122.33)));
        assert!(!coverage.contains(&GeoPoint::new(45.5152, -122.6784)));
    }

    #[test]
    fn window_overlap_is_inclusive() {
        let start = DateTime::from_timestamp(1_000, 0).unwrap();
        let end = DateTime::from_timestamp(2_000, 0).unwrap();
        let window = TimeWindow::new(start, end);

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(window.overlaps(DateTime::from_timestamp(0, 0).unwrap(), start));
        assert!(!window.overlaps(
            DateTime::from_timestamp(2_001, 0).unwrap(),
            DateTime::from_timestamp(3_000, 0).unwrap()
        ));
    }

    #[test]
    fn coverage_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            coverage: Coverage,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            [coverage]
            type = "regional"
            radius_meters = 25000.0
            center = { latitude = 47.6, longitude = -122.3 }
            "#,
        )
        .unwrap();

        assert!(matches!(
            parsed.coverage,
            Coverage::Regional { radius_meters, .. } if (radius_meters - 25_000.0).abs() < f64::EPSILON
        ));
    }
}
