//! Config-driven dispatch feed definition.
//!
//! [`FeedDefinition`] captures everything unique about a tabular incident
//! feed in a serializable config struct, and [`FeedSource`] is the single
//! generic [`AlertSource`] implementation that serves all of them. Adding a
//! feed means writing a TOML file, not a new adapter.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use risk_radar_alert_models::{
    Alert, AlertCategory, AlertSourceInfo, SourceType, TemporalType, clamp_priority,
};
use risk_radar_source_models::{
    Coverage, FetchOptions, FetchResult, SourceDescriptor, TemporalCharacteristics,
};
use serde::{Deserialize, Deserializer};

use crate::parsing::{json_coord, parse_point, parse_point_object, parse_socrata_date};
use crate::socrata::{SocrataConfig, fetch_socrata};
use crate::type_mapping::map_incident_type;
use crate::{AlertSource, SourceError};

/// Environment variable consulted for a Socrata app token when the source
/// config does not provide one.
pub const SOCRATA_APP_TOKEN_ENV: &str = "SOCRATA_APP_TOKEN";

// ── Top-level feed definition ────────────────────────────────────────────

/// A complete, config-driven feed definition loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDefinition {
    /// Unique identifier (e.g., `"seattle_fire_911"`).
    pub id: String,
    /// Human-readable name (e.g., `"Seattle Fire 911 Dispatches"`).
    pub name: String,
    /// Adapter version.
    #[serde(default = "default_version")]
    pub version: String,
    /// City attached to every alert.
    pub city: String,
    /// Two-letter state abbreviation attached to every alert.
    pub state: String,
    /// IANA zone the feed's floating timestamps are recorded in
    /// (e.g., `"America/Los_Angeles"`).
    #[serde(deserialize_with = "deserialize_time_zone")]
    pub timezone: Tz,
    /// Upstream kind.
    pub source_type: SourceType,
    /// Categories the feed can produce.
    pub categories: Vec<AlertCategory>,
    /// Temporal types the feed can produce.
    pub temporal_types: Vec<TemporalType>,
    /// Default query radius in meters.
    pub default_radius_meters: Option<f64>,
    /// Records issued less than this many minutes ago are real-time; older
    /// ones are historical.
    #[serde(default = "default_realtime_minutes")]
    pub realtime_minutes: i64,
    /// Geographic coverage.
    pub coverage: Coverage,
    /// How far back and ahead the feed can answer.
    pub temporal: TemporalConfig,
    /// How to fetch raw records.
    pub fetcher: FetcherConfig,
    /// Field name mappings for normalization.
    pub fields: FieldMapping,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

const fn default_realtime_minutes() -> i64 {
    60
}

fn deserialize_time_zone<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.trim().parse().map_err(serde::de::Error::custom)
}

/// Temporal characteristics as written in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemporalConfig {
    /// Whether the feed answers about the past.
    #[serde(default)]
    pub supports_past: bool,
    /// Whether the feed answers about the future.
    #[serde(default)]
    pub supports_future: bool,
    /// Publication lag for past data, in minutes.
    pub data_lag_minutes: Option<u32>,
    /// Forecast horizon, in minutes.
    pub future_lookahead_minutes: Option<u32>,
    /// Free-text freshness description.
    #[serde(default)]
    pub freshness: String,
}

// ── Fetcher config ───────────────────────────────────────────────────────

/// How to fetch raw records from the upstream API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// Socrata SODA API (`within_circle` + `between`).
    Socrata {
        /// Base Socrata API URL.
        api_url: String,
        /// Date column for ordering and window filtering.
        date_column: String,
        /// Point column for `within_circle`.
        location_column: String,
        /// Maximum rows per request.
        max_rows: u64,
    },
}

// ── Field mapping ────────────────────────────────────────────────────────

/// Maps feed-specific JSON field names to canonical alert fields.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Field holding the upstream record id.
    pub incident_id: String,
    /// Fields holding the incident type, tried in order (first non-empty
    /// wins).
    pub incident_type: Vec<String>,
    /// Field holding the issue timestamp (Socrata floating timestamp in the
    /// feed's zone).
    pub issued_at: String,
    /// How to read the record's coordinates.
    pub location: LocationField,
    /// Optional street address field.
    pub address: Option<String>,
    /// Optional free-text description field.
    pub description: Option<String>,
}

/// Where a record keeps its coordinates.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationField {
    /// Separate latitude and longitude fields (strings or numbers).
    LatLng {
        /// Latitude field name.
        latitude: String,
        /// Longitude field name.
        longitude: String,
    },
    /// A single `GeoJSON` point or Socrata location object.
    Point {
        /// Field name.
        field: String,
    },
}

impl FeedDefinition {
    /// Builds the static [`SourceDescriptor`] for this feed.
    #[must_use]
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            source_type: self.source_type,
            coverage: self.coverage.clone(),
            temporal: TemporalCharacteristics {
                supports_past: self.temporal.supports_past,
                supports_future: self.temporal.supports_future,
                data_lag_minutes: self.temporal.data_lag_minutes,
                future_lookahead_minutes: self.temporal.future_lookahead_minutes,
                freshness_description: self.temporal.freshness.clone(),
            },
            supported_categories: self.categories.iter().copied().collect::<BTreeSet<_>>(),
            supported_temporal_types: self.temporal_types.iter().copied().collect::<BTreeSet<_>>(),
            default_radius_meters: self.default_radius_meters,
        }
    }

    /// Normalizes one raw record into an [`Alert`].
    ///
    /// Returns `None` when the record has no id, no parseable timestamp or
    /// no usable coordinates.
    #[must_use]
    pub fn normalize_record(&self, record: &serde_json::Value, now: DateTime<Utc>) -> Option<Alert> {
        let fields = &self.fields;

        let incident_id = match record.get(&fields.incident_id)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let issued = record
            .get(&fields.issued_at)
            .and_then(serde_json::Value::as_str)
            .and_then(|s| parse_socrata_date(s, self.timezone))?;

        let location = match &fields.location {
            LocationField::LatLng {
                latitude,
                longitude,
            } => parse_point(json_coord(record, latitude), json_coord(record, longitude)),
            LocationField::Point { field } => record.get(field).and_then(parse_point_object),
        }?;

        let raw_type = fields
            .incident_type
            .iter()
            .filter_map(|f| record.get(f).and_then(serde_json::Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty());
        let class = map_incident_type(raw_type.unwrap_or_default());

        let temporal_type = if now - issued <= Duration::minutes(self.realtime_minutes) {
            TemporalType::RealTime
        } else {
            TemporalType::Historical
        };

        let text_field = |name: &Option<String>| {
            name.as_ref()
                .and_then(|f| record.get(f))
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let mut metadata = std::collections::BTreeMap::new();
        if let Some(raw) = raw_type {
            metadata.insert("rawType".to_string(), serde_json::Value::from(raw));
        }

        Some(Alert {
            id: format!("{}:{incident_id}", self.id),
            title: raw_type.unwrap_or("Unclassified incident").to_string(),
            description: text_field(&fields.description),
            category: class.category,
            risk_level: class.risk_level,
            priority: clamp_priority(class.priority),
            temporal_type,
            location,
            address: text_field(&fields.address),
            city: Some(self.city.clone()),
            state: Some(self.state.clone()),
            issued,
            event_start: Some(issued),
            event_end: None,
            expires: None,
            source: AlertSourceInfo {
                source_id: self.id.clone(),
                name: self.name.clone(),
                external_id: Some(incident_id),
                source_type: self.source_type,
            },
            metadata,
        })
    }
}

// ── Generic source implementation ────────────────────────────────────────

/// The [`AlertSource`] implementation behind every [`FeedDefinition`].
pub struct FeedSource {
    definition: FeedDefinition,
    descriptor: SourceDescriptor,
    client: reqwest::Client,
    app_token: OnceLock<Option<String>>,
}

impl FeedSource {
    /// Wraps a feed definition.
    #[must_use]
    pub fn new(definition: FeedDefinition) -> Self {
        let descriptor = definition.descriptor();
        Self {
            definition,
            descriptor,
            client: reqwest::Client::new(),
            app_token: OnceLock::new(),
        }
    }
}

#[async_trait]
impl AlertSource for FeedSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: Option<&serde_json::Value>) -> Result<(), SourceError> {
        let FetcherConfig::Socrata { api_url, .. } = &self.definition.fetcher;
        if !api_url.starts_with("https://") {
            return Err(SourceError::Other {
                message: format!("{}: api_url must use https: {api_url}", self.definition.id),
            });
        }

        let token = config
            .and_then(|c| c.get("app_token"))
            .and_then(serde_json::Value::as_str)
            .map(String::from)
            .or_else(|| std::env::var(SOCRATA_APP_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty());
        if token.is_none() {
            log::debug!(
                "{}: no Socrata app token configured, requests will be throttled",
                self.definition.id
            );
        }
        let _ = self.app_token.set(token);
        Ok(())
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<FetchResult, SourceError> {
        let FetcherConfig::Socrata {
            api_url,
            date_column,
            location_column,
            max_rows,
        } = &self.definition.fetcher;

        let config = SocrataConfig {
            api_url,
            date_column,
            location_column,
            label: &self.definition.name,
            max_rows: *max_rows,
            app_token: self.app_token.get().and_then(Option::as_deref),
            timezone: self.definition.timezone,
        };

        let records = fetch_socrata(&self.client, &config, options).await?;
        let now = Utc::now();

        let mut dropped = 0_usize;
        let alerts: Vec<Alert> = records
            .iter()
            .filter_map(|record| {
                let alert = self.definition.normalize_record(record, now);
                if alert.is_none() {
                    dropped += 1;
                }
                alert
            })
            .filter(|alert| {
                options
                    .categories
                    .as_ref()
                    .is_none_or(|c| c.contains(&alert.category))
                    && options
                        .temporal_types
                        .as_ref()
                        .is_none_or(|t| t.contains(&alert.temporal_type))
            })
            .collect();

        let mut result = FetchResult::new(alerts);
        if dropped > 0 {
            result.warnings.push(format!(
                "{dropped} of {} records were missing an id, timestamp or coordinates",
                records.len()
            ));
        }
        Ok(result)
    }
}

/// Parses a TOML string into a [`FeedDefinition`].
///
/// # Errors
///
/// Returns a [`toml::de::Error`] if the TOML is malformed or does not match
/// the expected schema.
pub fn parse_feed_toml(toml_str: &str) -> Result<FeedDefinition, toml::de::Error> {
    toml::from_str(toml_str)
}
