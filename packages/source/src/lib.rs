#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Alert source contract, registry and bundled adapters.
//!
//! Each data provider implements the [`AlertSource`] trait: it declares a
//! static [`SourceDescriptor`], answers whether it covers a point, and
//! fetches normalized [`Alert`](risk_radar_alert_models::Alert)s for a
//! query. Sources are registered in a [`registry::SourceRegistry`], which
//! owns their enable/disable state and initialization lifecycle.

pub mod cache;
pub mod catalog;
pub mod nws;
pub mod parsing;
pub mod registry;
pub mod retry;
pub mod socrata;
pub mod source_def;
pub mod type_mapping;

use async_trait::async_trait;
use risk_radar_alert_models::GeoPoint;
use risk_radar_source_models::{FetchOptions, FetchResult, SourceDescriptor};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source did not answer within its deadline.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Data normalization error.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },

    /// Any other adapter-specific failure.
    #[error("{message}")]
    Other {
        /// Description of what went wrong.
        message: String,
    },
}

/// Trait that all alert sources must implement.
///
/// Implementations must be `Send + Sync` so the engine can share them
/// across concurrently running fetches.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Returns the static metadata for this source.
    fn descriptor(&self) -> &SourceDescriptor;

    /// Returns the unique identifier for this source.
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Returns the human-readable name of this source.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Returns `true` if the source has data for `point`.
    ///
    /// Defaults to the declared [`Coverage`](risk_radar_source_models::Coverage).
    fn covers_location(&self, point: &GeoPoint) -> bool {
        self.descriptor().coverage.contains(point)
    }

    /// One-time setup, run before the source first participates in a query.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source cannot be made ready.
    async fn initialize(&self, _config: Option<&serde_json::Value>) -> Result<(), SourceError> {
        Ok(())
    }

    /// Fetches normalized alerts for the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if fetching or normalization fails.
    async fn fetch(&self, options: &FetchOptions) -> Result<FetchResult, SourceError>;

    /// Releases any resources held by the source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if teardown fails. Callers treat this as
    /// best-effort.
    async fn dispose(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
