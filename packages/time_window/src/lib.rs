#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Time-window resolution.
//!
//! Callers describe the window they care about either symbolically
//! (`"past-24h"`, `"next-7d"`) or explicitly (`start`/`end`). Everything
//! downstream of [`resolve`] only ever sees a concrete [`TimeWindow`].

use chrono::{DateTime, Duration, Utc};
use risk_radar_source_models::TimeWindow;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Length of the window used when the caller does not supply one.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Errors produced while resolving a time window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeWindowError {
    /// The preset string is not one of the known presets.
    #[error("Unknown time window preset: {preset}")]
    UnknownPreset {
        /// The unrecognized preset.
        preset: String,
    },

    /// An explicit window whose start comes after its end.
    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start.
        start: DateTime<Utc>,
        /// Requested end.
        end: DateTime<Utc>,
    },
}

/// Closed set of symbolic windows, relative to "now".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TimeWindowPreset {
    /// The last hour
    #[strum(serialize = "past-1h")]
    #[serde(rename = "past-1h")]
    Past1h,
    /// The last 6 hours
    #[strum(serialize = "past-6h")]
    #[serde(rename = "past-6h")]
    Past6h,
    /// The last 24 hours
    #[strum(serialize = "past-24h")]
    #[serde(rename = "past-24h")]
    Past24h,
    /// The last 7 days
    #[strum(serialize = "past-7d")]
    #[serde(rename = "past-7d")]
    Past7d,
    /// The last 30 days
    #[strum(serialize = "past-30d")]
    #[serde(rename = "past-30d")]
    Past30d,
    /// The next hour
    #[strum(serialize = "next-1h")]
    #[serde(rename = "next-1h")]
    Next1h,
    /// The next 6 hours
    #[strum(serialize = "next-6h")]
    #[serde(rename = "next-6h")]
    Next6h,
    /// The next 24 hours
    #[strum(serialize = "next-24h")]
    #[serde(rename = "next-24h")]
    Next24h,
    /// The next 7 days
    #[strum(serialize = "next-7d")]
    #[serde(rename = "next-7d")]
    Next7d,
    /// The next 30 days
    #[strum(serialize = "next-30d")]
    #[serde(rename = "next-30d")]
    Next30d,
}

impl TimeWindowPreset {
    /// Returns all presets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Past1h,
            Self::Past6h,
            Self::Past24h,
            Self::Past7d,
            Self::Past30d,
            Self::Next1h,
            Self::Next6h,
            Self::Next24h,
            Self::Next7d,
            Self::Next30d,
        ]
    }

    /// Returns the window length and whether it extends into the past
    /// (`true`) or future (`false`).
    fn span(self) -> (Duration, bool) {
        match self {
            Self::Past1h => (Duration::hours(1), true),
            Self::Past6h => (Duration::hours(6), true),
            Self::Past24h => (Duration::hours(24), true),
            Self::Past7d => (Duration::days(7), true),
            Self::Past30d => (Duration::days(30), true),
            Self::Next1h => (Duration::hours(1), false),
            Self::Next6h => (Duration::hours(6), false),
            Self::Next24h => (Duration::hours(24), false),
            Self::Next7d => (Duration::days(7), false),
            Self::Next30d => (Duration::days(30), false),
        }
    }

    /// Turns the preset into a concrete window anchored at `now`.
    #[must_use]
    pub fn to_window(self, now: DateTime<Utc>) -> TimeWindow {
        let (length, past) = self.span();
        if past {
            TimeWindow::new(now - length, now)
        } else {
            TimeWindow::new(now, now + length)
        }
    }
}

/// A time window as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeWindowInput {
    /// A preset name, e.g. `"past-24h"`.
    Preset(String),
    /// Explicit bounds.
    Explicit {
        /// Window start.
        start: DateTime<Utc>,
        /// Window end.
        end: DateTime<Utc>,
    },
}

/// Resolves `input` against `now` into a concrete window.
///
/// Without input, the window is the next [`DEFAULT_WINDOW_HOURS`] hours.
///
/// # Errors
///
/// * [`TimeWindowError::UnknownPreset`] if a preset name is not recognized.
/// * [`TimeWindowError::InvalidRange`] if an explicit start is after its end.
pub fn resolve(
    input: Option<&TimeWindowInput>,
    now: DateTime<Utc>,
) -> Result<TimeWindow, TimeWindowError> {
    match input {
        None => Ok(TimeWindow::new(
            now,
            now + Duration::hours(DEFAULT_WINDOW_HOURS),
        )),
        Some(TimeWindowInput::Preset(name)) => {
            let preset: TimeWindowPreset = name
                .trim()
                .parse()
                .map_err(|_| TimeWindowError::UnknownPreset {
                    preset: name.clone(),
                })?;
            Ok(preset.to_window(now))
        }
        Some(TimeWindowInput::Explicit { start, end }) => {
            if start > end {
                return Err(TimeWindowError::InvalidRange {
                    start: *start,
                    end: *end,
                });
            }
            Ok(TimeWindow::new(*start, *end))
        }
    }
}
