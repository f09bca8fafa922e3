#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the risk radar server.
//!
//! Query-string parameters are flat strings; [`AlertQueryParams::into_query`]
//! validates them into an engine [`AlertQuery`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use risk_radar_alert_models::{AlertCategory, GeoPoint, RiskLevel, TemporalType};
use risk_radar_engine_models::AlertQuery;
use risk_radar_source_models::SourceDescriptor;
use risk_radar_time_window::TimeWindowInput;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// A registered source as listed by `GET /api/sources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    /// Static descriptor.
    #[serde(flatten)]
    pub descriptor: SourceDescriptor,
    /// Whether the source participates in queries.
    pub enabled: bool,
    /// Whether the source has been initialized.
    pub initialized: bool,
}

/// Rejected query-string input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// Coordinates outside the WGS84 range.
    #[error("Invalid location: lat={lat}, lon={lon}")]
    InvalidLocation {
        /// Latitude as given.
        lat: String,
        /// Longitude as given.
        lon: String,
    },
    /// Negative or non-finite radius.
    #[error("Invalid radius: {radius}")]
    InvalidRadius {
        /// Radius as given.
        radius: String,
    },
    /// Only one of `start`/`end`, or combined with `window`.
    #[error("Provide either window or both start and end")]
    AmbiguousWindow,
    /// An enum value that does not parse.
    #[error("Invalid {param}: {value}")]
    InvalidValue {
        /// Parameter name.
        param: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Query parameters for `GET /api/alerts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQueryParams {
    /// Latitude of the query point.
    pub lat: f64,
    /// Longitude of the query point.
    pub lon: f64,
    /// Search radius in meters.
    pub radius: Option<f64>,
    /// Time window preset (e.g. `past-24h`, `next-7d`).
    pub window: Option<String>,
    /// Explicit window start (ISO 8601).
    pub start: Option<DateTime<Utc>>,
    /// Explicit window end (ISO 8601).
    pub end: Option<DateTime<Utc>>,
    /// Minimum risk level name.
    pub min_risk: Option<String>,
    /// Comma-separated categories.
    pub categories: Option<String>,
    /// Comma-separated temporal types.
    pub temporal_types: Option<String>,
    /// Maximum number of alerts.
    pub limit: Option<usize>,
    /// Include per-source diagnostics.
    #[serde(default)]
    pub diagnostics: bool,
}

impl AlertQueryParams {
    /// Validates the parameters into an engine query.
    ///
    /// Preset names are not checked here; the engine rejects unknown ones.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] for out-of-range coordinates, a bad radius,
    /// a half-specified window, or unparseable enum values.
    pub fn into_query(self) -> Result<AlertQuery, ParamError> {
        let location = GeoPoint::new(self.lat, self.lon);
        if !location.is_valid() {
            return Err(ParamError::InvalidLocation {
                lat: self.lat.to_string(),
                lon: self.lon.to_string(),
            });
        }

        if let Some(radius) = self.radius
            && !(radius.is_finite() && radius >= 0.0)
        {
            return Err(ParamError::InvalidRadius {
                radius: radius.to_string(),
            });
        }

        let time_window = match (self.window, self.start, self.end) {
            (None, None, None) => None,
            (Some(preset), None, None) => Some(TimeWindowInput::Preset(preset)),
            (None, Some(start), Some(end)) => Some(TimeWindowInput::Explicit { start, end }),
            _ => return Err(ParamError::AmbiguousWindow),
        };

        let min_risk_level = self
            .min_risk
            .as_deref()
            .map(|v| parse_one::<RiskLevel>("minRisk", v))
            .transpose()?;

        Ok(AlertQuery {
            location,
            radius_meters: self.radius,
            time_window,
            min_risk_level,
            categories: parse_list::<AlertCategory>("categories", self.categories.as_deref())?,
            temporal_types: parse_list::<TemporalType>(
                "temporalTypes",
                self.temporal_types.as_deref(),
            )?,
            limit: self.limit,
            include_diagnostics: self.diagnostics,
        })
    }
}

fn parse_one<T: FromStr>(param: &'static str, value: &str) -> Result<T, ParamError> {
    value.trim().parse().map_err(|_| ParamError::InvalidValue {
        param,
        value: value.to_string(),
    })
}

/// Parses a comma-separated list. Empty input means no filter.
fn parse_list<T: FromStr>(
    param: &'static str,
    raw: Option<&str>,
) -> Result<Option<Vec<T>>, ParamError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_one(param, s))
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: serde_json::Value) -> AlertQueryParams {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_full_query() {
        let query = params(serde_json::json!({
            "lat": 47.6,
            "lon": -122.3,
            "radius": 2500.0,
            "window": "past-24h",
            "minRisk": "HIGH",
            "categories": "crime, fire",
            "temporalTypes": "real-time",
            "limit": 20,
            "diagnostics": true,
        }))
        .into_query()
        .unwrap();

        assert_eq!(query.radius_meters, Some(2500.0));
        assert_eq!(query.min_risk_level, Some(RiskLevel::High));
        assert_eq!(
            query.categories,
            Some(vec![AlertCategory::Crime, AlertCategory::Fire])
        );
        assert_eq!(query.temporal_types, Some(vec![TemporalType::RealTime]));
        assert!(query.include_diagnostics);
    }

    #[test]
    fn rejects_bad_input() {
        let bad_lat = params(serde_json::json!({"lat": 95.0, "lon": 0.0}));
        assert!(matches!(
            bad_lat.into_query(),
            Err(ParamError::InvalidLocation { .. })
        ));

        let half_window = params(serde_json::json!({
            "lat": 47.6, "lon": -122.3, "start": "2024-06-01T00:00:00Z"
        }));
        assert_eq!(half_window.into_query(), Err(ParamError::AmbiguousWindow));

        let bad_category = params(serde_json::json!({
            "lat": 47.6, "lon": -122.3, "categories": "crime,aliens"
        }));
        assert_eq!(
            bad_category.into_query(),
            Err(ParamError::InvalidValue {
                param: "categories",
                value: "aliens".to_string()
            })
        );

        let negative = params(serde_json::json!({"lat": 47.6, "lon": -122.3, "radius": -1.0}));
        assert!(matches!(
            negative.into_query(),
            Err(ParamError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn empty_list_means_no_filter() {
        let query = params(serde_json::json!({"lat": 47.6, "lon": -122.3, "categories": ""}))
            .into_query()
            .unwrap();
        assert!(query.categories.is_none());
        assert!(query.time_window.is_none());
    }
}
