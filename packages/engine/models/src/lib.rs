#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query and response types for the alert engine.
//!
//! An [`AlertQuery`] goes in, a [`QueryResponse`] comes out. When the
//! caller asks for diagnostics, the response lists every registered source
//! exactly once with a [`SourceOutcome`]: it was skipped before any fetch,
//! it answered, or it failed.

use chrono::{DateTime, Utc};
use risk_radar_alert_models::{Alert, AlertCategory, GeoPoint, RiskLevel, TemporalType};
use risk_radar_source_models::TimeWindow;
use risk_radar_time_window::TimeWindowInput;
use serde::{Deserialize, Serialize};

/// A single "what is happening near here" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQuery {
    /// Query center.
    pub location: GeoPoint,
    /// Search radius in meters. When absent, each source falls back to its
    /// own default radius and no radius filter is applied to the merged
    /// result.
    #[serde(default)]
    pub radius_meters: Option<f64>,
    /// Preset name or explicit bounds. Defaults to the next 24 hours.
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Drop alerts below this risk level.
    #[serde(default)]
    pub min_risk_level: Option<RiskLevel>,
    /// Only consult sources producing at least one of these categories.
    #[serde(default)]
    pub categories: Option<Vec<AlertCategory>>,
    /// Only consult sources producing at least one of these temporal types.
    #[serde(default)]
    pub temporal_types: Option<Vec<TemporalType>>,
    /// Maximum number of alerts to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Attach per-source diagnostics to the response.
    #[serde(default)]
    pub include_diagnostics: bool,
}

impl AlertQuery {
    /// A query for `location` with every option left at its default.
    #[must_use]
    pub const fn at(location: GeoPoint) -> Self {
        Self {
            location,
            radius_meters: None,
            time_window: None,
            min_risk_level: None,
            categories: None,
            temporal_types: None,
            limit: None,
            include_diagnostics: false,
        }
    }
}

/// What happened to one source during a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    /// The source was invoked and answered.
    #[serde(rename_all = "camelCase")]
    Success {
        /// Alerts the source returned, before aggregation.
        alert_count: usize,
        /// Wall-clock time spent in the fetch.
        duration_ms: u64,
        /// Whether the source answered from its cache.
        from_cache: bool,
        /// Non-fatal problems the source reported.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    /// The source was invoked and failed or timed out.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// Wall-clock time until the failure.
        duration_ms: u64,
        /// Error message.
        error: String,
    },
    /// The source was never invoked.
    Skipped {
        /// Why the source could not answer this query.
        reason: String,
    },
}

/// Per-source execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDiagnostic {
    /// Registry id.
    pub source_id: String,
    /// Human-readable name.
    pub source_name: String,
    /// Skip, success or failure.
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

impl SourceDiagnostic {
    /// Returns `true` if the source was invoked and answered.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Success { .. })
    }

    /// Returns `true` if the source was never invoked.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Skipped { .. })
    }

    /// Number of alerts the source contributed (zero unless successful).
    #[must_use]
    pub const fn alert_count(&self) -> usize {
        match self.outcome {
            SourceOutcome::Success { alert_count, .. } => alert_count,
            SourceOutcome::Failed { .. } | SourceOutcome::Skipped { .. } => 0,
        }
    }

    /// The failure message or skip reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            SourceOutcome::Success { .. } => None,
            SourceOutcome::Failed { error, .. } => Some(error),
            SourceOutcome::Skipped { reason } => Some(reason),
        }
    }
}

/// Summary of how a response was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    /// Alerts that survived filtering, before truncation.
    pub total_count: usize,
    /// Reference instant the query was evaluated against.
    pub queried_at: DateTime<Utc>,
    /// The concrete window the query resolved to.
    pub resolved_time_window: TimeWindow,
    /// Query center.
    pub location: GeoPoint,
    /// Radius the caller asked for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<f64>,
    /// Whether `total_count` exceeded the limit.
    pub truncated: bool,
}

/// The merged answer to an [`AlertQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Deduplicated, filtered, sorted and truncated alerts.
    pub alerts: Vec<Alert>,
    /// Response metadata.
    pub meta: QueryMeta,
    /// Per-source records, present when the query asked for them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<SourceDiagnostic>>,
}
