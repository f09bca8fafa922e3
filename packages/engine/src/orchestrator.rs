//! Concurrent fetch fan-out.
//!
//! Eligible sources are fetched in batches of
//! [`EngineConfig::batch_size`]: every fetch in a batch runs concurrently,
//! batches run one after another. Each fetch is raced against
//! [`EngineConfig::plugin_timeout`].

use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use risk_radar_alert_models::{Alert, AlertCategory, GeoPoint, TemporalType};
use risk_radar_engine_models::{SourceDiagnostic, SourceOutcome};
use risk_radar_source::{AlertSource, SourceError};
use risk_radar_source_models::{FetchOptions, FetchResult, TimeWindow};

use crate::EngineError;
use crate::config::EngineConfig;

/// Query parameters shared by every fetch of one query.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// Query center.
    pub location: GeoPoint,
    /// Radius the caller asked for, if any.
    pub radius_meters: Option<f64>,
    /// Resolved window.
    pub time_window: TimeWindow,
    /// Result limit forwarded to sources.
    pub limit: Option<usize>,
    /// Category filter forwarded to sources.
    pub categories: Option<Vec<AlertCategory>>,
    /// Temporal-type filter forwarded to sources.
    pub temporal_types: Option<Vec<TemporalType>>,
}

impl FetchPlan {
    /// Builds the options for one source. The radius falls back to the
    /// source's own default, then to `default_radius_meters`.
    #[must_use]
    pub fn options_for(&self, source: &dyn AlertSource, default_radius_meters: f64) -> FetchOptions {
        FetchOptions {
            location: self.location,
            radius_meters: self
                .radius_meters
                .or(source.descriptor().default_radius_meters)
                .unwrap_or(default_radius_meters),
            time_window: self.time_window,
            limit: self.limit,
            categories: self.categories.clone(),
            temporal_types: self.temporal_types.clone(),
        }
    }
}

/// Per-source alert sets plus one diagnostic per invoked source.
#[derive(Debug, Default)]
pub struct FetchOutput {
    /// Alerts from each invoked source, in invocation order. Failed sources
    /// contribute an empty set.
    pub results: Vec<Vec<Alert>>,
    /// One record per invoked source, in invocation order.
    pub diagnostics: Vec<SourceDiagnostic>,
}

struct Attempt {
    source_id: String,
    source_name: String,
    duration_ms: u64,
    result: Result<FetchResult, SourceError>,
}

impl Attempt {
    fn into_parts(self) -> (Vec<Alert>, SourceDiagnostic) {
        let (alerts, outcome) = match self.result {
            Ok(result) => {
                let outcome = SourceOutcome::Success {
                    alert_count: result.alerts.len(),
                    duration_ms: self.duration_ms,
                    from_cache: result.from_cache,
                    warnings: result.warnings,
                };
                (result.alerts, outcome)
            }
            Err(e) => (
                Vec::new(),
                SourceOutcome::Failed {
                    duration_ms: self.duration_ms,
                    error: e.to_string(),
                },
            ),
        };

        (
            alerts,
            SourceDiagnostic {
                source_id: self.source_id,
                source_name: self.source_name,
                outcome,
            },
        )
    }

    /// Turns a failed attempt into the error that aborts the query.
    fn or_abort(self) -> Result<Self, EngineError> {
        match self.result {
            Ok(_) => Ok(self),
            Err(error) => Err(EngineError::Source {
                source_id: self.source_id,
                error,
            }),
        }
    }
}

async fn fetch_one(source: Arc<dyn AlertSource>, options: FetchOptions, config: &EngineConfig) -> Attempt {
    let started = Instant::now();
    let timeout = config.plugin_timeout();

    let result = match tokio::time::timeout(timeout, source.fetch(&options)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!(
                "Source {} timed out after {}ms; its request may still be in flight",
                source.id(),
                config.plugin_timeout_ms
            );
            Err(SourceError::Timeout {
                timeout_ms: config.plugin_timeout_ms,
            })
        }
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match &result {
        Ok(r) => log::debug!(
            "Source {} returned {} alerts in {duration_ms}ms",
            source.id(),
            r.alerts.len()
        ),
        Err(SourceError::Timeout { .. }) => {}
        Err(e) => log::warn!("Source {} failed after {duration_ms}ms: {e}", source.id()),
    }

    Attempt {
        source_id: source.id().to_string(),
        source_name: source.name().to_string(),
        duration_ms,
        result,
    }
}

/// Fetches every source in `sources` under the configured concurrency cap,
/// timeout, and error policy.
///
/// # Errors
///
/// With `continue_on_plugin_error` off, returns [`EngineError::Source`] for
/// the first failing source of the first batch that has one. Remaining
/// fetches of that batch are dropped and later batches never start.
pub async fn fetch_all(
    sources: &[Arc<dyn AlertSource>],
    plan: &FetchPlan,
    config: &EngineConfig,
) -> Result<FetchOutput, EngineError> {
    let mut output = FetchOutput::default();

    for batch in sources.chunks(config.batch_size()) {
        let fetches = batch.iter().map(|source| {
            let options = plan.options_for(source.as_ref(), config.default_radius_meters);
            fetch_one(Arc::clone(source), options, config)
        });

        let attempts = if config.continue_on_plugin_error {
            join_all(fetches).await
        } else {
            try_join_all(fetches.map(|fetch| async move { fetch.await.or_abort() })).await?
        };

        for attempt in attempts {
            let (alerts, diagnostic) = attempt.into_parts();
            output.results.push(alerts);
            output.diagnostics.push(diagnostic);
        }
    }

    Ok(output)
}
