//! Built-in source catalog.
//!
//! Each `.toml` file in `packages/source/feeds/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a dispatch feed is as
//! simple as creating a new TOML file and adding it to the list below.

use std::sync::Arc;

use crate::AlertSource;
use crate::cache::Cache;
use crate::nws::NwsSource;
use crate::source_def::{FeedDefinition, FeedSource, parse_feed_toml};

/// Feed configs embedded at compile time.
const FEED_TOMLS: &[(&str, &str)] = &[
    ("seattle_fire_911", include_str!("../feeds/seattle_fire_911.toml")),
    ("sf_police_calls", include_str!("../feeds/sf_police_calls.toml")),
];

#[cfg(test)]
const EXPECTED_FEED_COUNT: usize = 2;

/// Returns all configured feed definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_feed_definitions() -> Vec<FeedDefinition> {
    FEED_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_feed_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Instantiates every bundled source: the dispatch feeds plus NWS.
///
/// `cache` is shared with the sources that cache upstream responses.
#[must_use]
pub fn builtin_sources(cache: Option<Arc<dyn Cache>>) -> Vec<Arc<dyn AlertSource>> {
    let mut sources: Vec<Arc<dyn AlertSource>> = all_feed_definitions()
        .into_iter()
        .map(|def| Arc::new(FeedSource::new(def)) as Arc<dyn AlertSource>)
        .collect();
    sources.push(Arc::new(NwsSource::new(cache)));
    sources
}

#[cfg(test)]
mod tests {
    use risk_radar_alert_models::GeoPoint;

    use super::*;

    #[test]
    fn loads_all_feeds() {
        assert_eq!(all_feed_definitions().len(), EXPECTED_FEED_COUNT);
    }

    #[test]
    fn source_ids_are_unique() {
        let sources = builtin_sources(None);
        let mut ids: Vec<&str> = sources.iter().map(|s| s.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXPECTED_FEED_COUNT + 1);
    }

    #[test]
    fn feeds_cover_their_own_city() {
        let seattle = GeoPoint::new(47.6097, -122.3331);
        let sf = GeoPoint::new(37.7793, -122.4193);

        for def in all_feed_definitions() {
            let descriptor = def.descriptor();
            let home = if def.city == "Seattle" { seattle } else { sf };
            assert!(descriptor.coverage.contains(&home), "{}", def.id);
            assert!(!descriptor.supported_categories.is_empty(), "{}", def.id);
            assert!(!def.fields.incident_type.is_empty(), "{}", def.id);
        }
    }

    #[test]
    fn west_coast_feeds_record_pacific_time() {
        for def in all_feed_definitions() {
            assert_eq!(def.timezone, chrono_tz::America::Los_Angeles, "{}", def.id);
        }
    }
}
