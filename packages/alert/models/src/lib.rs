#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Alert taxonomy and the canonical normalized alert format.
//!
//! Every data source adapter (weather service, dispatch feed, event
//! calendar, etc.) produces [`Alert`] records that conform to the shared
//! taxonomy defined here. Alerts are created per fetch call, never mutated
//! afterwards, and only live for the duration of a single query.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Highest urgency an alert can carry.
pub const PRIORITY_HIGHEST: u8 = 1;

/// Lowest urgency an alert can carry.
pub const PRIORITY_LOWEST: u8 = 5;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a new point from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both coordinates are finite and inside the valid
    /// WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Top-level alert category groupings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AlertCategory {
    /// Police activity and reported crime
    Crime,
    /// Fire department responses
    Fire,
    /// Medical aid responses
    Medical,
    /// Weather watches, warnings and advisories
    Weather,
    /// Collisions, closures and congestion
    Traffic,
    /// Scheduled public events
    Event,
    /// Protests, riots and other civil disturbances
    CivilUnrest,
    /// Anything not fitting another category
    Other,
}

impl AlertCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Crime,
            Self::Fire,
            Self::Medical,
            Self::Weather,
            Self::Traffic,
            Self::Event,
            Self::CivilUnrest,
            Self::Other,
        ]
    }
}

/// Ordered risk level, from [`RiskLevel::Low`] to [`RiskLevel::Extreme`].
///
/// The derived ordering follows declaration order, so `Low < Moderate <
/// High < Severe < Extreme`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RiskLevel {
    /// Informational
    Low = 1,
    /// Worth knowing about
    Moderate = 2,
    /// Likely to affect people nearby
    High = 3,
    /// Dangerous
    Severe = 4,
    /// Life-threatening
    Extreme = 5,
}

impl RiskLevel {
    /// Returns the ordinal rank of this level (1 = low, 5 = extreme).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Returns all variants in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Low,
            Self::Moderate,
            Self::High,
            Self::Severe,
            Self::Extreme,
        ]
    }
}

/// Whether an alert describes something that already happened, something
/// planned, or something happening right now.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TemporalType {
    /// Past incidents (crime reports, closed calls)
    Historical,
    /// Planned in advance (events, forecasts, road works)
    Scheduled,
    /// Live feeds (dispatch, active warnings)
    RealTime,
}

impl TemporalType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Historical, Self::Scheduled, Self::RealTime]
    }
}

/// The kind of upstream a source talks to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Government weather service API
    WeatherApi,
    /// Police / fire computer-aided dispatch feed
    DispatchFeed,
    /// Traffic incident feed
    TrafficFeed,
    /// Public events calendar
    EventCalendar,
    /// Bulk CSV or similar flat-file download
    CsvBulk,
    /// Anything else
    Other,
}

/// Provenance of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSourceInfo {
    /// Registry id of the source that produced the alert.
    pub source_id: String,
    /// Human-readable source name.
    pub name: String,
    /// Identifier of the record in the upstream system, if it has one.
    pub external_id: Option<String>,
    /// What kind of upstream produced the record.
    pub source_type: SourceType,
}

/// A risk-relevant event normalized to the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique id within the producing source.
    pub id: String,
    /// Short headline.
    pub title: String,
    /// Longer free-text description.
    pub description: Option<String>,
    /// Top-level category.
    pub category: AlertCategory,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Urgency, 1 (highest) to 5 (lowest).
    pub priority: u8,
    /// Historical, scheduled or real-time.
    pub temporal_type: TemporalType,
    /// Where the alert applies.
    pub location: GeoPoint,
    /// Street address, if known.
    pub address: Option<String>,
    /// City, if known.
    pub city: Option<String>,
    /// Two-letter state abbreviation, if known.
    pub state: Option<String>,
    /// When the alert was issued by its source.
    pub issued: DateTime<Utc>,
    /// When the underlying event starts.
    pub event_start: Option<DateTime<Utc>>,
    /// When the underlying event ends.
    pub event_end: Option<DateTime<Utc>>,
    /// When the alert stops being relevant.
    pub expires: Option<DateTime<Utc>>,
    /// Where the alert came from.
    pub source: AlertSourceInfo,
    /// Source-specific detail. Never interpreted by the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Alert {
    /// Returns the `(source id, external id)` dedup key, if the alert has an
    /// external id.
    #[must_use]
    pub fn external_key(&self) -> Option<(&str, &str)> {
        self.source
            .external_id
            .as_deref()
            .map(|external_id| (self.source.source_id.as_str(), external_id))
    }
}

/// Clamps an arbitrary priority into the valid
/// [`PRIORITY_HIGHEST`]..=[`PRIORITY_LOWEST`] range.
#[must_use]
pub fn clamp_priority(priority: u8) -> u8 {
    priority.clamp(PRIORITY_HIGHEST, PRIORITY_LOWEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        for pair in RiskLevel::all().windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn risk_level_parses_case_insensitively() {
        assert_eq!("SEVERE".parse::<RiskLevel>().unwrap(), RiskLevel::Severe);
        assert_eq!("moderate".parse::<RiskLevel>().unwrap(), RiskLevel::Moderate);
        assert!("catastrophic".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn categories_use_kebab_case() {
        assert_eq!(AlertCategory::CivilUnrest.to_string(), "civil-unrest");
        assert_eq!(
            "civil-unrest".parse::<AlertCategory>().unwrap(),
            AlertCategory::CivilUnrest
        );
        assert_eq!(
            serde_json::to_string(&TemporalType::RealTime).unwrap(),
            "\"real-time\""
        );
    }

    #[test]
    fn clamps_priority() {
        assert_eq!(clamp_priority(0), 1);
        assert_eq!(clamp_priority(3), 3);
        assert_eq!(clamp_priority(9), 5);
    }

    #[test]
    fn validates_points() {
        assert!(GeoPoint::new(47.6, -122.3).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
