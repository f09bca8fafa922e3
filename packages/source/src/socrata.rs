//! Shared Socrata SODA API fetcher.
//!
//! Fetches the most recent records of a Socrata dataset inside a circle and
//! a time window using the `$where`, `$order` and `$limit` query
//! parameters. Used by every dispatch feed defined in `feeds/`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use risk_radar_source_models::FetchOptions;

use crate::{SourceError, retry};

/// Socrata floating-timestamp format used in `$where` clauses.
const SOCRATA_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Configuration for a Socrata fetch operation.
pub struct SocrataConfig<'a> {
    /// Base API URL (e.g., `"https://data.seattle.gov/resource/kzjm-xkqj.json"`).
    pub api_url: &'a str,
    /// The date column used for ordering and window filtering.
    pub date_column: &'a str,
    /// The location (point) column used by `within_circle`.
    pub location_column: &'a str,
    /// Label for log messages (e.g., `"Seattle Fire 911"`).
    pub label: &'a str,
    /// Maximum number of rows to request.
    pub max_rows: u64,
    /// Optional Socrata application token.
    pub app_token: Option<&'a str>,
    /// Zone the dataset's floating timestamps are recorded in.
    pub timezone: Tz,
}

/// Builds the SODA `$where` clause restricting rows to the query circle
/// and time window. Window bounds are written as wall-clock time in the
/// dataset's zone.
#[must_use]
pub fn where_clause(config: &SocrataConfig<'_>, options: &FetchOptions) -> String {
    format!(
        "within_circle({}, {}, {}, {}) AND {} between '{}' and '{}'",
        config.location_column,
        options.location.latitude,
        options.location.longitude,
        options.radius_meters.round(),
        config.date_column,
        format_date(options.time_window.start, config.timezone),
        format_date(options.time_window.end, config.timezone),
    )
}

fn format_date(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(SOCRATA_DATE_FORMAT).to_string()
}

/// Fetches the newest rows matching the query window and circle.
///
/// # Errors
///
/// Returns [`SourceError`] if the HTTP request fails or the response is not
/// a JSON array.
pub async fn fetch_socrata(
    client: &reqwest::Client,
    config: &SocrataConfig<'_>,
    options: &FetchOptions,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let limit = options
        .limit
        .map_or(config.max_rows, |l| {
            u64::try_from(l).unwrap_or(u64::MAX).min(config.max_rows)
        });

    let params = [
        ("$where", where_clause(config, options)),
        ("$order", format!("{} DESC", config.date_column)),
        ("$limit", limit.to_string()),
    ];

    log::debug!("Fetching {} data: limit={limit}", config.label);

    let body = retry::send_json(|| {
        let req = client.get(config.api_url).query(&params);
        match config.app_token {
            Some(token) => req.header("X-App-Token", token),
            None => req,
        }
    })
    .await?;

    match body {
        serde_json::Value::Array(records) => {
            log::debug!("Downloaded {} {} records", records.len(), config.label);
            Ok(records)
        }
        other => Err(SourceError::Normalization {
            message: format!(
                "{}: expected a JSON array, got {}",
                config.label,
                json_kind(&other)
            ),
        }),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use risk_radar_alert_models::GeoPoint;
    use risk_radar_source_models::TimeWindow;

    use super::*;

    fn seattle_config(timezone: Tz) -> SocrataConfig<'static> {
        SocrataConfig {
            api_url: "https://data.seattle.gov/resource/kzjm-xkqj.json",
            date_column: "datetime",
            location_column: "report_location",
            label: "Seattle Fire 911",
            max_rows: 1000,
            app_token: None,
            timezone,
        }
    }

    fn options() -> FetchOptions {
        FetchOptions {
            location: GeoPoint::new(47.6062, -122.3321),
            radius_meters: 1500.4,
            time_window: TimeWindow::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            ),
            limit: None,
            categories: None,
            temporal_types: None,
        }
    }

    #[test]
    fn builds_circle_and_window_clause() {
        assert_eq!(
            where_clause(&seattle_config(Tz::UTC), &options()),
            "within_circle(report_location, 47.6062, -122.3321, 1500) AND datetime \
             between '2024-06-01T00:00:00' and '2024-06-01T12:30:00'"
        );
    }

    #[test]
    fn window_bounds_use_dataset_local_time() {
        assert_eq!(
            where_clause(&seattle_config(chrono_tz::America::Los_Angeles), &options()),
            "within_circle(report_location, 47.6062, -122.3321, 1500) AND datetime \
             between '2024-05-31T17:00:00' and '2024-06-01T05:30:00'"
        );
    }
}
