//! Engine configuration.
//!
//! Values come from defaults, optionally a TOML document, and finally
//! `RISK_RADAR_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Tunables for the fetch and aggregation phases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sources fetched simultaneously per batch.
    pub max_concurrent_fetches: usize,
    /// Per-source fetch deadline.
    pub plugin_timeout_ms: u64,
    /// Record source failures as diagnostics instead of aborting the query.
    pub continue_on_plugin_error: bool,
    /// Fetch radius when neither the query nor the source provides one.
    pub default_radius_meters: f64,
    /// Result limit when the query does not set one.
    pub default_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 5,
            plugin_timeout_ms: 10_000,
            continue_on_plugin_error: true,
            default_radius_meters: 5_000.0,
            default_limit: 100,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`toml::de::Error`] if the document is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Defaults overlaid with `RISK_RADAR_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlays `RISK_RADAR_*` environment variables on `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_var(&lookup, "RISK_RADAR_MAX_CONCURRENT_FETCHES") {
            self.max_concurrent_fetches = v;
        }
        if let Some(v) = parse_var(&lookup, "RISK_RADAR_PLUGIN_TIMEOUT_MS") {
            self.plugin_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "RISK_RADAR_CONTINUE_ON_PLUGIN_ERROR") {
            self.continue_on_plugin_error = v;
        }
        if let Some(v) = parse_var(&lookup, "RISK_RADAR_DEFAULT_RADIUS_METERS") {
            self.default_radius_meters = v;
        }
        if let Some(v) = parse_var(&lookup, "RISK_RADAR_DEFAULT_LIMIT") {
            self.default_limit = v;
        }
        self
    }

    /// Batch size, never less than one.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    /// Per-source fetch deadline.
    #[must_use]
    pub const fn plugin_timeout(&self) -> Duration {
        Duration::from_millis(self.plugin_timeout_ms)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        log::warn!("Ignoring {name}={raw:?}: not a valid value");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = EngineConfig::from_toml_str(
            r"
            max_concurrent_fetches = 2
            continue_on_plugin_error = false
            ",
        )
        .unwrap();

        assert_eq!(config.max_concurrent_fetches, 2);
        assert!(!config.continue_on_plugin_error);
        assert_eq!(config.plugin_timeout_ms, 10_000);
        assert_eq!(config.default_limit, 100);
    }

    #[test]
    fn env_overrides_skip_unparseable_values() {
        let vars = BTreeMap::from([
            ("RISK_RADAR_PLUGIN_TIMEOUT_MS", "2500"),
            ("RISK_RADAR_DEFAULT_LIMIT", "lots"),
            ("RISK_RADAR_CONTINUE_ON_PLUGIN_ERROR", "false"),
        ]);
        let config = EngineConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.plugin_timeout(), Duration::from_millis(2500));
        assert_eq!(config.default_limit, 100);
        assert!(!config.continue_on_plugin_error);
    }

    #[test]
    fn batch_size_is_at_least_one() {
        let config = EngineConfig {
            max_concurrent_fetches: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.batch_size(), 1);
    }
}
