//! Shared parsing utilities for source adapters.
//!
//! Date and coordinate parsing used across adapters. Unparseable values
//! become `None` so the record can be dropped instead of failing the fetch.

use chrono::{DateTime, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use risk_radar_alert_models::GeoPoint;

/// ISO 8601 without offset, optional fractional seconds.
fn parse_socrata_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Parses a Socrata floating timestamp recorded as wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times
/// skipped by a DST jump return `None`.
#[must_use]
pub fn parse_socrata_date(s: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = parse_socrata_naive(s)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Parses an RFC 3339 timestamp with offset (e.g. NWS `"sent"` fields).
#[must_use]
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reads a JSON string field as an RFC 3339 timestamp.
#[must_use]
pub fn json_rfc3339(value: &serde_json::Value, field: &str) -> Option<DateTime<Utc>> {
    value.get(field)?.as_str().and_then(parse_rfc3339)
}

/// Reads a coordinate that may be encoded as a JSON string or number.
#[must_use]
pub fn json_coord(value: &serde_json::Value, field: &str) -> Option<f64> {
    match value.get(field)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Builds a point from latitude/longitude. Returns `None` for zero or
/// out-of-range coordinates.
#[must_use]
pub fn parse_point(latitude: Option<f64>, longitude: Option<f64>) -> Option<GeoPoint> {
    let point = GeoPoint::new(latitude?, longitude?);
    if point.latitude == 0.0 || point.longitude == 0.0 || !point.is_valid() {
        return None;
    }
    Some(point)
}

/// Extracts a point from a `GeoJSON` Point object
/// (`{"type":"Point","coordinates":[lng,lat]}`) or a Socrata location
/// object (`{"latitude":"..","longitude":".."}`).
#[must_use]
pub fn parse_point_object(value: &serde_json::Value) -> Option<GeoPoint> {
    if let Some(coords) = value.get("coordinates").and_then(serde_json::Value::as_array) {
        let lng = coords.first()?.as_f64();
        let lat = coords.get(1)?.as_f64();
        return parse_point(lat, lng);
    }
    parse_point(json_coord(value, "latitude"), json_coord(value, "longitude"))
}
