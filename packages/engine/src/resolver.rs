//! Source eligibility.
//!
//! Narrows the registry's enabled sources down to the ones that can
//! possibly answer a query, before any network call. A source that fails a
//! check is skipped with a [`SkipReason`]; skipping is never an error.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use risk_radar_alert_models::{AlertCategory, GeoPoint, TemporalType};
use risk_radar_source::AlertSource;
use risk_radar_source_models::{SourceDescriptor, TimeWindow};

/// Slack applied around "now" when deciding whether a window is past or
/// future, so a window ending a few seconds from now still counts as past.
const NOW_TOLERANCE_MINUTES: i64 = 1;

/// Why a source was not invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The query point is outside the source's coverage.
    OutsideCoverage,
    /// None of the requested categories are produced by the source.
    NoCategoryOverlap,
    /// None of the requested temporal types are produced by the source.
    NoTemporalTypeOverlap,
    /// The window is in the past and the source has no past data.
    PastNotSupported,
    /// The window is too recent for the source's publication lag.
    DataNotYetPublished {
        /// Declared lag.
        lag_minutes: u32,
    },
    /// The window is in the future and the source has no future data.
    FutureNotSupported,
    /// The window starts beyond the source's forecast horizon.
    BeyondLookahead {
        /// Declared horizon.
        lookahead_minutes: u32,
    },
    /// The window straddles now and the source supports neither direction.
    NoTemporalSupport,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideCoverage => f.write_str("does not cover the query location"),
            Self::NoCategoryOverlap => f.write_str("supports none of the requested categories"),
            Self::NoTemporalTypeOverlap => {
                f.write_str("supports none of the requested temporal types")
            }
            Self::PastNotSupported => f.write_str("does not support past time windows"),
            Self::DataNotYetPublished { lag_minutes } => write!(
                f,
                "data lags {lag_minutes} minutes behind real time, window is not yet published"
            ),
            Self::FutureNotSupported => f.write_str("does not support future time windows"),
            Self::BeyondLookahead { lookahead_minutes } => write!(
                f,
                "window starts beyond the {lookahead_minutes}-minute lookahead"
            ),
            Self::NoTemporalSupport => f.write_str("supports neither past nor future data"),
        }
    }
}

/// A source that will not be invoked, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    /// Registry id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of resolving a query against the registered sources.
#[derive(Default)]
pub struct Resolution {
    /// Sources to invoke, in registry order.
    pub eligible: Vec<Arc<dyn AlertSource>>,
    /// Sources left out.
    pub skipped: Vec<SkippedSource>,
}

/// Query parameters the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Query center.
    pub location: &'a GeoPoint,
    /// Requested categories, if filtered.
    pub categories: Option<&'a [AlertCategory]>,
    /// Requested temporal types, if filtered.
    pub temporal_types: Option<&'a [TemporalType]>,
    /// Resolved window.
    pub window: &'a TimeWindow,
    /// Reference instant.
    pub now: DateTime<Utc>,
}

/// Splits `sources` into eligible and skipped.
#[must_use]
pub fn resolve_sources(sources: Vec<Arc<dyn AlertSource>>, request: &ResolveRequest<'_>) -> Resolution {
    let mut resolution = Resolution::default();

    for source in sources {
        match check_source(source.as_ref(), request) {
            Ok(()) => resolution.eligible.push(source),
            Err(reason) => {
                log::debug!("Skipping source {}: {reason}", source.id());
                resolution.skipped.push(SkippedSource {
                    id: source.id().to_string(),
                    name: source.name().to_string(),
                    reason,
                });
            }
        }
    }

    resolution
}

/// Runs every check against one source, first failure wins.
///
/// # Errors
///
/// Returns the [`SkipReason`] of the first failed check.
pub fn check_source(source: &dyn AlertSource, request: &ResolveRequest<'_>) -> Result<(), SkipReason> {
    if !source.covers_location(request.location) {
        return Err(SkipReason::OutsideCoverage);
    }

    let descriptor = source.descriptor();
    if !overlaps(request.categories, |c| descriptor.supported_categories.contains(c)) {
        return Err(SkipReason::NoCategoryOverlap);
    }
    if !overlaps(request.temporal_types, |t| {
        descriptor.supported_temporal_types.contains(t)
    }) {
        return Err(SkipReason::NoTemporalTypeOverlap);
    }

    check_temporal_compatibility(descriptor, request.window, request.now)
}

/// An absent filter matches everything; a present one needs one hit.
fn overlaps<T>(requested: Option<&[T]>, supported: impl Fn(&T) -> bool) -> bool {
    requested.is_none_or(|items| items.iter().any(supported))
}

/// Decides whether a source's temporal reach can satisfy `window`.
///
/// The window is entirely past when it ends no later than one minute from
/// `now`, entirely future when it starts no earlier than one minute ago,
/// and straddling otherwise. Past is checked first.
///
/// # Errors
///
/// Returns the [`SkipReason`] explaining the mismatch.
pub fn check_temporal_compatibility(
    descriptor: &SourceDescriptor,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Result<(), SkipReason> {
    let temporal = &descriptor.temporal;
    let tolerance = Duration::minutes(NOW_TOLERANCE_MINUTES);

    if window.end <= now + tolerance {
        if !temporal.supports_past {
            return Err(SkipReason::PastNotSupported);
        }
        if let Some(lag_minutes) = temporal.data_lag_minutes
            && window.start > now - Duration::minutes(i64::from(lag_minutes))
        {
            return Err(SkipReason::DataNotYetPublished { lag_minutes });
        }
        return Ok(());
    }

    if window.start >= now - tolerance {
        if !temporal.supports_future {
            return Err(SkipReason::FutureNotSupported);
        }
        if let Some(lookahead_minutes) = temporal.future_lookahead_minutes
            && window.start > now + Duration::minutes(i64::from(lookahead_minutes))
        {
            return Err(SkipReason::BeyondLookahead { lookahead_minutes });
        }
        return Ok(());
    }

    if !temporal.supports_past && !temporal.supports_future {
        return Err(SkipReason::NoTemporalSupport);
    }
    Ok(())
}
