//! National Weather Service active alerts adapter.
//!
//! Queries `https://api.weather.gov/alerts/active?point=LAT,LON`, which
//! returns a `GeoJSON` feature collection of the watches, warnings and
//! advisories currently in effect for that point. The API only knows about
//! active and upcoming alerts, so the source declares no past support.
//!
//! Responses are cached per rounded query point for five minutes when a
//! [`Cache`] is supplied.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_radar_alert_models::{
    Alert, AlertCategory, AlertSourceInfo, GeoPoint, RiskLevel, SourceType, TemporalType,
    clamp_priority,
};
use risk_radar_source_models::{
    Coverage, FetchOptions, FetchResult, SourceDescriptor, TemporalCharacteristics,
};

use crate::cache::Cache;
use crate::parsing::json_rfc3339;
use crate::{AlertSource, SourceError, retry};

/// Registry id of the NWS source.
pub const NWS_SOURCE_ID: &str = "nws";

const DEFAULT_BASE_URL: &str = "https://api.weather.gov";
const DEFAULT_USER_AGENT: &str = "risk-radar (https://github.com/risk-radar/risk-radar)";
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Geographic center of the contiguous United States.
const CONUS_CENTER: GeoPoint = GeoPoint::new(39.8283, -98.5795);
/// Radius that covers the contiguous United States from [`CONUS_CENTER`].
const CONUS_RADIUS_METERS: f64 = 2_900_000.0;
/// One week of forecast visibility.
const LOOKAHEAD_MINUTES: u32 = 7 * 24 * 60;

/// Active weather alerts from `api.weather.gov`.
pub struct NwsSource {
    descriptor: SourceDescriptor,
    client: reqwest::Client,
    cache: Option<Arc<dyn Cache>>,
    base_url: String,
    user_agent: OnceLock<String>,
}

impl NwsSource {
    /// Creates the adapter. `cache` is optional; without one every fetch
    /// goes to the network.
    #[must_use]
    pub fn new(cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            descriptor: descriptor(),
            client: reqwest::Client::new(),
            cache,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: OnceLock::new(),
        }
    }

    fn cache_key(point: &GeoPoint) -> String {
        format!("nws:{:.3},{:.3}", point.latitude, point.longitude)
    }

    async fn load(&self, point: &GeoPoint) -> Result<(serde_json::Value, bool), SourceError> {
        let key = Self::cache_key(point);
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&key).await
        {
            log::debug!("NWS cache hit for {key}");
            return Ok((hit, true));
        }

        let url = format!("{}/alerts/active", self.base_url);
        let point_param = format!("{:.4},{:.4}", point.latitude, point.longitude);
        let user_agent = self
            .user_agent
            .get()
            .map_or(DEFAULT_USER_AGENT, String::as_str);

        let body = retry::send_json(|| {
            self.client
                .get(&url)
                .query(&[("point", point_param.as_str())])
                .header(reqwest::header::USER_AGENT, user_agent)
                .header(reqwest::header::ACCEPT, "application/geo+json")
        })
        .await?;

        if let Some(cache) = &self.cache {
            cache.set(&key, body.clone(), Some(CACHE_TTL)).await;
        }
        Ok((body, false))
    }
}

fn descriptor() -> SourceDescriptor {
    SourceDescriptor {
        id: NWS_SOURCE_ID.to_string(),
        name: "National Weather Service Alerts".to_string(),
        version: "1.0.0".to_string(),
        source_type: SourceType::WeatherApi,
        coverage: Coverage::Regional {
            center: CONUS_CENTER,
            radius_meters: CONUS_RADIUS_METERS,
        },
        temporal: TemporalCharacteristics {
            supports_past: false,
            supports_future: true,
            data_lag_minutes: None,
            future_lookahead_minutes: Some(LOOKAHEAD_MINUTES),
            freshness_description: "Active alerts, updated continuously".to_string(),
        },
        supported_categories: BTreeSet::from([AlertCategory::Weather]),
        supported_temporal_types: BTreeSet::from([TemporalType::RealTime, TemporalType::Scheduled]),
        default_radius_meters: Some(25_000.0),
    }
}

/// Maps NWS `severity` and `urgency` onto a risk level.
///
/// A moderate alert that needs immediate action is bumped to high.
#[must_use]
pub fn map_severity(severity: &str, urgency: &str) -> RiskLevel {
    match severity.to_ascii_lowercase().as_str() {
        "extreme" => RiskLevel::Extreme,
        "severe" => RiskLevel::Severe,
        "moderate" if urgency.eq_ignore_ascii_case("immediate") => RiskLevel::High,
        "moderate" => RiskLevel::Moderate,
        _ => RiskLevel::Low,
    }
}

/// Priority derived from risk: extreme is 1, low is 5.
const fn priority_for(risk: RiskLevel) -> u8 {
    6 - risk.rank()
}

/// Normalizes one NWS feature into an [`Alert`].
///
/// Alerts without geometry (zone-based alerts) are placed at `fallback`,
/// the query point. Returns `None` when the feature has no id or no
/// `sent` timestamp.
#[must_use]
pub fn normalize_feature(
    feature: &serde_json::Value,
    fallback: &GeoPoint,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let props = feature.get("properties")?;
    let text = |field: &str| {
        props
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let id = text("id").or_else(|| feature.get("id").and_then(serde_json::Value::as_str))?;
    let issued = json_rfc3339(props, "sent")?;
    let event_start = json_rfc3339(props, "onset").or_else(|| json_rfc3339(props, "effective"));
    let expires = json_rfc3339(props, "expires");
    let event_end = json_rfc3339(props, "ends").or(expires);

    let risk_level = map_severity(
        text("severity").unwrap_or_default(),
        text("urgency").unwrap_or_default(),
    );

    let location = feature
        .get("geometry")
        .filter(|g| !g.is_null())
        .and_then(|g| serde_json::from_value::<geojson::Geometry>(g.clone()).ok())
        .and_then(|g| risk_radar_geography::geometry_centroid(&g))
        .unwrap_or(*fallback);

    let temporal_type = match event_start {
        Some(start) if start > now => TemporalType::Scheduled,
        _ => TemporalType::RealTime,
    };

    let event = text("event").unwrap_or("Weather Alert");
    let mut metadata = BTreeMap::new();
    for (key, field) in [
        ("severity", "severity"),
        ("urgency", "urgency"),
        ("certainty", "certainty"),
        ("areaDesc", "areaDesc"),
        ("senderName", "senderName"),
    ] {
        if let Some(value) = text(field) {
            metadata.insert(key.to_string(), serde_json::Value::from(value));
        }
    }

    Some(Alert {
        id: format!("{NWS_SOURCE_ID}:{id}"),
        title: text("headline").unwrap_or(event).to_string(),
        description: text("description").map(String::from),
        category: AlertCategory::Weather,
        risk_level,
        priority: clamp_priority(priority_for(risk_level)),
        temporal_type,
        location,
        address: text("areaDesc").map(String::from),
        city: None,
        state: None,
        issued,
        event_start,
        event_end,
        expires,
        source: AlertSourceInfo {
            source_id: NWS_SOURCE_ID.to_string(),
            name: "National Weather Service".to_string(),
            external_id: Some(id.to_string()),
            source_type: SourceType::WeatherApi,
        },
        metadata,
    })
}

#[async_trait]
impl AlertSource for NwsSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: Option<&serde_json::Value>) -> Result<(), SourceError> {
        if let Some(agent) = config
            .and_then(|c| c.get("user_agent"))
            .and_then(serde_json::Value::as_str)
        {
            let _ = self.user_agent.set(agent.to_string());
        }
        Ok(())
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<FetchResult, SourceError> {
        let (body, from_cache) = self.load(&options.location).await?;

        let features = body
            .get("features")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| SourceError::Normalization {
                message: "NWS response has no features array".to_string(),
            })?;

        let now = Utc::now();
        let mut warnings = Vec::new();
        let mut alerts = Vec::with_capacity(features.len());
        for feature in features {
            match normalize_feature(feature, &options.location, now) {
                Some(alert) => alerts.push(alert),
                None => warnings.push("skipped NWS feature without id or sent time".to_string()),
            }
        }

        alerts.retain(|alert| {
            options
                .temporal_types
                .as_ref()
                .is_none_or(|t| t.contains(&alert.temporal_type))
                && options
                    .categories
                    .as_ref()
                    .is_none_or(|c| c.contains(&alert.category))
        });

        log::debug!("NWS returned {} alerts (cached: {from_cache})", alerts.len());

        Ok(FetchResult {
            alerts,
            from_cache,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::cache::MemoryCache;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn feature(onset: &str, geometry: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.abc",
            "type": "Feature",
            "geometry": geometry,
            "properties": {
                "id": "urn:oid:2.49.0.1.840.0.abc",
                "areaDesc": "King County",
                "sent": "2024-06-01T04:00:00-07:00",
                "effective": "2024-06-01T04:00:00-07:00",
                "onset": onset,
                "expires": "2024-06-01T18:00:00-07:00",
                "ends": "2024-06-02T06:00:00-07:00",
                "severity": "Severe",
                "urgency": "Expected",
                "event": "Wind Advisory",
                "headline": "Wind Advisory issued June 1",
                "description": "Gusts up to 50 mph.",
            }
        })
    }

    #[test]
    fn maps_severity_and_urgency() {
        assert_eq!(map_severity("Extreme", "Immediate"), RiskLevel::Extreme);
        assert_eq!(map_severity("Moderate", "Immediate"), RiskLevel::High);
        assert_eq!(map_severity("Moderate", "Expected"), RiskLevel::Moderate);
        assert_eq!(map_severity("Minor", "Future"), RiskLevel::Low);
        assert_eq!(map_severity("Unknown", "Unknown"), RiskLevel::Low);
    }

    #[test]
    fn normalizes_zone_alert_at_query_point() {
        let fallback = GeoPoint::new(47.6062, -122.3321);
        let alert = normalize_feature(
            &feature("2024-06-01T04:00:00-07:00", serde_json::Value::Null),
            &fallback,
            now(),
        )
        .unwrap();

        assert_eq!(alert.id, "nws:urn:oid:2.49.0.1.840.0.abc");
        assert_eq!(alert.location, fallback);
        assert_eq!(alert.risk_level, RiskLevel::Severe);
        assert_eq!(alert.priority, 2);
        assert_eq!(alert.temporal_type, TemporalType::RealTime);
        assert_eq!(alert.issued.to_rfc3339(), "2024-06-01T11:00:00+00:00");
        assert_eq!(alert.title, "Wind Advisory issued June 1");
        assert!(alert.event_end.is_some());
    }

    #[test]
    fn future_onset_is_scheduled_and_polygon_uses_centroid() {
        let polygon = serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[-122.0, 47.0], [-121.0, 47.0], [-121.0, 48.0], [-122.0, 48.0], [-122.0, 47.0]]]
        });
        let alert = normalize_feature(
            &feature("2024-06-01T20:00:00-07:00", polygon),
            &GeoPoint::new(0.0, 0.0),
            now(),
        )
        .unwrap();

        assert_eq!(alert.temporal_type, TemporalType::Scheduled);
        assert!((alert.location.latitude - 47.5).abs() < 1e-9);
        assert!((alert.location.longitude - -121.5).abs() < 1e-9);
    }

    #[test]
    fn open_ended_alert_ends_at_expiry() {
        let mut f = feature("2024-06-01T04:00:00-07:00", serde_json::Value::Null);
        f["properties"]["ends"] = serde_json::Value::Null;

        let alert = normalize_feature(&f, &GeoPoint::new(47.6, -122.3), now()).unwrap();
        let expiry = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        assert_eq!(alert.expires, Some(expiry));
        assert_eq!(alert.event_end, Some(expiry));
    }

    #[test]
    fn feature_without_sent_is_dropped() {
        let mut f = feature("2024-06-01T04:00:00-07:00", serde_json::Value::Null);
        f["properties"]
            .as_object_mut()
            .unwrap()
            .remove("sent");
        assert!(normalize_feature(&f, &GeoPoint::new(47.6, -122.3), now()).is_none());
    }

    #[tokio::test]
    async fn serves_cached_response() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let point = GeoPoint::new(47.6062, -122.3321);
        cache
            .set(
                &NwsSource::cache_key(&point),
                serde_json::json!({
                    "type": "FeatureCollection",
                    "features": [feature("2024-06-01T04:00:00-07:00", serde_json::Value::Null)]
                }),
                None,
            )
            .await;

        let source = NwsSource::new(Some(cache));
        let options = FetchOptions {
            location: point,
            radius_meters: 5_000.0,
            time_window: risk_radar_source_models::TimeWindow::new(now(), now()),
            limit: None,
            categories: None,
            temporal_types: None,
        };

        let result = source.fetch(&options).await.unwrap();
        assert!(result.from_cache);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].category, AlertCategory::Weather);
    }

    #[test]
    fn covers_contiguous_us_only() {
        let source = NwsSource::new(None);
        assert!(source.covers_location(&GeoPoint::new(47.6062, -122.3321)));
        assert!(source.covers_location(&GeoPoint::new(25.7617, -80.1918)));
        assert!(!source.covers_location(&GeoPoint::new(51.5074, -0.1278)));
    }
}
