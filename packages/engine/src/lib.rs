#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query coordinator for the alert engine.
//!
//! [`AlertEngine::query`] runs a query through three phases:
//!
//! 1. **Resolve**: the time window is made concrete and registered sources
//!    that cannot answer (coverage, category, temporal reach) are skipped.
//! 2. **Fetch**: eligible sources are invoked concurrently in bounded
//!    batches, each under a timeout.
//! 3. **Aggregate**: results are deduplicated, filtered, sorted and
//!    truncated.

pub mod aggregator;
pub mod config;
pub mod orchestrator;
pub mod resolver;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use risk_radar_engine_models::{
    AlertQuery, QueryMeta, QueryResponse, SourceDiagnostic, SourceOutcome,
};
use risk_radar_source::SourceError;
use risk_radar_source::registry::SourceRegistry;
use risk_radar_time_window::TimeWindowError;

use crate::aggregator::{AggregateOptions, aggregate};
use crate::config::EngineConfig;
use crate::orchestrator::{FetchPlan, fetch_all};
use crate::resolver::{ResolveRequest, resolve_sources};

/// Errors that abort a query.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested time window could not be resolved.
    #[error(transparent)]
    TimeWindow(#[from] TimeWindowError),

    /// A source failed while `continue_on_plugin_error` is off.
    #[error("Source {source_id} failed: {error}")]
    Source {
        /// The failing source.
        source_id: String,
        /// What went wrong.
        #[source]
        error: SourceError,
    },
}

/// Owns the source registry and answers queries against it.
pub struct AlertEngine {
    registry: Arc<SourceRegistry>,
    config: EngineConfig,
}

impl AlertEngine {
    /// Creates an engine over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<SourceRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// The registry queried by this engine.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answers `query` as of the current instant.
    ///
    /// # Errors
    ///
    /// * [`EngineError::TimeWindow`] if the window is an unknown preset or
    ///   an inverted range.
    /// * [`EngineError::Source`] if a source fails and
    ///   `continue_on_plugin_error` is off.
    pub async fn query(&self, query: &AlertQuery) -> Result<QueryResponse, EngineError> {
        self.query_at(query, Utc::now()).await
    }

    /// Answers `query` with `now` as the reference instant.
    ///
    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn query_at(
        &self,
        query: &AlertQuery,
        now: DateTime<Utc>,
    ) -> Result<QueryResponse, EngineError> {
        let window = risk_radar_time_window::resolve(query.time_window.as_ref(), now)?;
        let limit = query.limit.unwrap_or(self.config.default_limit);

        let resolution = resolve_sources(
            self.registry.get_all(true).await,
            &ResolveRequest {
                location: &query.location,
                categories: query.categories.as_deref(),
                temporal_types: query.temporal_types.as_deref(),
                window: &window,
                now,
            },
        );

        log::debug!(
            "Query at ({}, {}): {} eligible, {} skipped, window {} .. {}",
            query.location.latitude,
            query.location.longitude,
            resolution.eligible.len(),
            resolution.skipped.len(),
            window.start,
            window.end
        );

        let plan = FetchPlan {
            location: query.location,
            radius_meters: query.radius_meters,
            time_window: window,
            limit: Some(limit),
            categories: query.categories.clone(),
            temporal_types: query.temporal_types.clone(),
        };
        let fetched = fetch_all(&resolution.eligible, &plan, &self.config).await?;

        let result = aggregate(
            fetched.results,
            &AggregateOptions {
                min_risk_level: query.min_risk_level,
                time_window: &window,
                radius: query.radius_meters.map(|r| (query.location, r)),
                limit,
            },
        );

        let diagnostics = query.include_diagnostics.then(|| {
            let mut all: Vec<SourceDiagnostic> = resolution
                .skipped
                .into_iter()
                .map(|skipped| SourceDiagnostic {
                    source_id: skipped.id,
                    source_name: skipped.name,
                    outcome: SourceOutcome::Skipped {
                        reason: skipped.reason.to_string(),
                    },
                })
                .chain(fetched.diagnostics)
                .collect();
            all.sort_by(|a, b| a.source_id.cmp(&b.source_id));
            all
        });

        Ok(QueryResponse {
            alerts: result.alerts,
            meta: QueryMeta {
                total_count: result.total_count,
                queried_at: now,
                resolved_time_window: window,
                location: query.location,
                radius_meters: query.radius_meters,
                truncated: result.truncated,
            },
            diagnostics,
        })
    }

    /// Disposes every registered source.
    pub async fn shutdown(&self) {
        log::info!("Shutting down alert engine");
        self.registry.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone as _};
    use risk_radar_alert_models::{
        Alert, AlertCategory, AlertSourceInfo, GeoPoint, RiskLevel, SourceType, TemporalType,
    };
    use risk_radar_source::AlertSource;
    use risk_radar_source::registry::RegistryError;
    use risk_radar_source_models::{
        Coverage, FetchOptions, FetchResult, SourceDescriptor, TemporalCharacteristics,
    };
    use risk_radar_time_window::TimeWindowInput;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn seattle() -> GeoPoint {
        GeoPoint::new(47.6062, -122.3321)
    }

    struct FakeSource {
        descriptor: SourceDescriptor,
        alerts: Vec<Alert>,
        fail: bool,
        fetches: AtomicUsize,
        disposals: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn new(id: &str, category: AlertCategory, temporal: TemporalCharacteristics) -> Self {
            Self {
                descriptor: SourceDescriptor {
                    id: id.to_string(),
                    name: format!("Fake {id}"),
                    version: "1.0.0".to_string(),
                    source_type: SourceType::Other,
                    coverage: Coverage::Global,
                    temporal,
                    supported_categories: BTreeSet::from([category]),
                    supported_temporal_types: TemporalType::all().iter().copied().collect(),
                    default_radius_meters: None,
                },
                alerts: Vec::new(),
                fail: false,
                fetches: AtomicUsize::new(0),
                disposals: Arc::default(),
            }
        }

        fn past() -> TemporalCharacteristics {
            TemporalCharacteristics {
                supports_past: true,
                ..TemporalCharacteristics::default()
            }
        }

        fn with_alert(mut self, local_id: &str, priority: u8, issued: DateTime<Utc>) -> Self {
            let id = self.descriptor.id.clone();
            self.alerts.push(Alert {
                id: format!("{id}:{local_id}"),
                title: local_id.to_string(),
                description: None,
                category: self.descriptor.supported_categories.iter().copied().next().unwrap(),
                risk_level: RiskLevel::Moderate,
                priority,
                temporal_type: TemporalType::Historical,
                location: seattle(),
                address: None,
                city: None,
                state: None,
                issued,
                event_start: None,
                event_end: None,
                expires: None,
                source: AlertSourceInfo {
                    source_id: id,
                    name: self.descriptor.name.clone(),
                    external_id: Some(local_id.to_string()),
                    source_type: SourceType::Other,
                },
                metadata: BTreeMap::new(),
            });
            self
        }
    }

    #[async_trait]
    impl AlertSource for FakeSource {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn fetch(&self, _options: &FetchOptions) -> Result<FetchResult, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Other {
                    message: "feed offline".to_string(),
                });
            }
            Ok(FetchResult::new(self.alerts.clone()))
        }

        async fn dispose(&self) -> Result<(), SourceError> {
            self.disposals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn past_day_query() -> AlertQuery {
        AlertQuery {
            time_window: Some(TimeWindowInput::Preset("past-24h".to_string())),
            include_diagnostics: true,
            ..AlertQuery::at(seattle())
        }
    }

    async fn engine_with(sources: Vec<FakeSource>, config: EngineConfig) -> AlertEngine {
        let registry = Arc::new(SourceRegistry::new());
        for source in sources {
            registry.register(Arc::new(source), None, true).await.unwrap();
        }
        AlertEngine::new(registry, config)
    }

    #[tokio::test]
    async fn merges_sources_and_reports_every_source_once() {
        let crime = FakeSource::new("crime", AlertCategory::Crime, FakeSource::past())
            .with_alert("1", 3, now() - Duration::hours(2))
            .with_alert("2", 1, now() - Duration::hours(5));
        let fire = FakeSource::new("fire", AlertCategory::Fire, FakeSource::past())
            .with_alert("9", 3, now() - Duration::hours(1));
        let forecast = FakeSource::new(
            "forecast",
            AlertCategory::Weather,
            TemporalCharacteristics {
                supports_future: true,
                ..TemporalCharacteristics::default()
            },
        );

        let engine = engine_with(vec![crime, fire, forecast], EngineConfig::default()).await;
        let response = engine.query_at(&past_day_query(), now()).await.unwrap();

        let ids: Vec<&str> = response.alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["crime:2", "fire:9", "crime:1"]);
        assert_eq!(response.meta.total_count, 3);
        assert!(!response.meta.truncated);
        assert_eq!(response.meta.resolved_time_window.end, now());

        let diagnostics = response.diagnostics.unwrap();
        let statuses: Vec<(&str, bool, bool)> = diagnostics
            .iter()
            .map(|d| (d.source_id.as_str(), d.is_success(), d.is_skipped()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("crime", true, false),
                ("fire", true, false),
                ("forecast", false, true)
            ]
        );
    }

    #[tokio::test]
    async fn failing_source_does_not_hide_others() {
        let good = FakeSource::new("good", AlertCategory::Crime, FakeSource::past())
            .with_alert("1", 2, now() - Duration::hours(1));
        let mut bad = FakeSource::new("bad", AlertCategory::Crime, FakeSource::past());
        bad.fail = true;

        let engine = engine_with(vec![good, bad], EngineConfig::default()).await;
        let response = engine.query_at(&past_day_query(), now()).await.unwrap();

        assert_eq!(response.alerts.len(), 1);
        let diagnostics = response.diagnostics.unwrap();
        let bad = diagnostics.iter().find(|d| d.source_id == "bad").unwrap();
        assert!(!bad.is_success());
        assert!(!bad.is_skipped());
        assert_eq!(bad.reason(), Some("feed offline"));
    }

    #[tokio::test]
    async fn failing_source_aborts_when_configured() {
        let mut bad = FakeSource::new("bad", AlertCategory::Crime, FakeSource::past());
        bad.fail = true;
        let config = EngineConfig {
            continue_on_plugin_error: false,
            ..EngineConfig::default()
        };

        let engine = engine_with(vec![bad], config).await;
        let err = engine.query_at(&past_day_query(), now()).await.unwrap_err();
        assert!(matches!(err, EngineError::Source { .. }));
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected() {
        let engine = engine_with(Vec::new(), EngineConfig::default()).await;
        let query = AlertQuery {
            time_window: Some(TimeWindowInput::Preset("last-fortnight".to_string())),
            ..AlertQuery::at(seattle())
        };

        let err = engine.query_at(&query, now()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::TimeWindow(TimeWindowError::UnknownPreset { .. })
        ));
    }

    #[tokio::test]
    async fn default_limit_truncates_and_diagnostics_are_optional() {
        let mut source = FakeSource::new("busy", AlertCategory::Crime, FakeSource::past());
        for i in 0..8 {
            source = source.with_alert(&i.to_string(), 3, now() - Duration::minutes(i));
        }
        let config = EngineConfig {
            default_limit: 5,
            ..EngineConfig::default()
        };

        let engine = engine_with(vec![source], config).await;
        let query = AlertQuery {
            include_diagnostics: false,
            ..past_day_query()
        };
        let response = engine.query_at(&query, now()).await.unwrap();

        assert_eq!(response.alerts.len(), 5);
        assert_eq!(response.meta.total_count, 8);
        assert!(response.meta.truncated);
        assert!(response.diagnostics.is_none());
    }

    #[tokio::test]
    async fn skipped_sources_are_never_fetched() {
        let registry = Arc::new(SourceRegistry::new());
        let forecast = Arc::new(FakeSource::new(
            "forecast",
            AlertCategory::Weather,
            TemporalCharacteristics {
                supports_future: true,
                ..TemporalCharacteristics::default()
            },
        ));
        registry
            .register(Arc::clone(&forecast) as Arc<dyn AlertSource>, None, true)
            .await
            .unwrap();

        let engine = AlertEngine::new(registry, EngineConfig::default());
        engine.query_at(&past_day_query(), now()).await.unwrap();

        assert_eq!(forecast.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_original() {
        let registry = Arc::new(SourceRegistry::new());
        let first = FakeSource::new("weather", AlertCategory::Weather, FakeSource::past())
            .with_alert("original", 3, now() - Duration::hours(1));
        let second = FakeSource::new("weather", AlertCategory::Weather, FakeSource::past())
            .with_alert("impostor", 3, now() - Duration::hours(1));

        registry.register(Arc::new(first), None, true).await.unwrap();
        let err = registry
            .register(Arc::new(second), None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSource { ref id } if id == "weather"));

        let engine = AlertEngine::new(registry, EngineConfig::default());
        let response = engine.query_at(&past_day_query(), now()).await.unwrap();
        assert_eq!(response.alerts.len(), 1);
        assert_eq!(response.alerts[0].id, "weather:original");
    }

    #[tokio::test]
    async fn shutdown_disposes_sources() {
        let source = FakeSource::new("crime", AlertCategory::Crime, FakeSource::past());
        let disposals = Arc::clone(&source.disposals);

        let engine = engine_with(vec![source], EngineConfig::default()).await;
        engine.shutdown().await;

        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert!(engine.registry().is_empty().await);
    }
}
