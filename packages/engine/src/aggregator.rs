//! Result merging.
//!
//! Flattens every source's alerts and runs them through a fixed pipeline:
//! deduplicate, minimum-risk filter, time-window filter, radius filter,
//! sort, truncate. Pure and synchronous.

use std::collections::{BTreeMap, BTreeSet};

use risk_radar_alert_models::{Alert, GeoPoint, RiskLevel};
use risk_radar_source_models::TimeWindow;

/// Filters and limits applied after deduplication.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions<'a> {
    /// Drop alerts below this level.
    pub min_risk_level: Option<RiskLevel>,
    /// Keep only alerts relevant to this window.
    pub time_window: &'a TimeWindow,
    /// Keep only alerts within `(center, radius_meters)`.
    pub radius: Option<(GeoPoint, f64)>,
    /// Maximum number of alerts returned.
    pub limit: usize,
}

/// Final merged answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    /// Sorted alerts, at most `limit` of them.
    pub alerts: Vec<Alert>,
    /// Alerts that survived filtering, before truncation.
    pub total_count: usize,
    /// Whether `total_count` exceeded the limit.
    pub truncated: bool,
}

/// Merges per-source alert sets into one ranked list.
#[must_use]
pub fn aggregate(results: Vec<Vec<Alert>>, options: &AggregateOptions<'_>) -> AggregateResult {
    let merged: Vec<Alert> = results.into_iter().flatten().collect();
    let input_count = merged.len();

    let mut alerts = deduplicate(merged);
    let unique_count = alerts.len();

    alerts.retain(|alert| {
        options
            .min_risk_level
            .is_none_or(|min| alert.risk_level.rank() >= min.rank())
            && is_in_window(alert, options.time_window)
            && options.radius.is_none_or(|(center, radius)| {
                risk_radar_geography::within_radius(&center, &alert.location, radius)
            })
    });

    sort_alerts(&mut alerts);

    let total_count = alerts.len();
    let truncated = total_count > options.limit;
    alerts.truncate(options.limit);

    log::debug!(
        "Aggregated {input_count} alerts: {unique_count} unique, {total_count} after filters, \
         returning {}",
        alerts.len()
    );

    AggregateResult {
        alerts,
        total_count,
        truncated,
    }
}

/// Collapses alerts that share an `id` or a `(source id, external id)`
/// pair.
///
/// Matches are transitive: if A shares an id with B and B shares an
/// external key with C, all three are one event. Each group keeps its most
/// recently issued alert, the earliest one on ties. Survivors keep their
/// input order.
#[must_use]
pub fn deduplicate(alerts: Vec<Alert>) -> Vec<Alert> {
    let keep: BTreeSet<usize> = {
        let mut groups = DisjointSet::new(alerts.len());
        let mut by_id: BTreeMap<&str, usize> = BTreeMap::new();
        let mut by_external: BTreeMap<(&str, &str), usize> = BTreeMap::new();

        for (i, alert) in alerts.iter().enumerate() {
            if let Some(&first) = by_id.get(alert.id.as_str()) {
                groups.union(first, i);
            } else {
                by_id.insert(&alert.id, i);
            }

            if let Some(key) = alert.external_key() {
                if let Some(&first) = by_external.get(&key) {
                    groups.union(first, i);
                } else {
                    by_external.insert(key, i);
                }
            }
        }

        let mut winners: BTreeMap<usize, usize> = BTreeMap::new();
        for (i, alert) in alerts.iter().enumerate() {
            let root = groups.find(i);
            winners
                .entry(root)
                .and_modify(|winner| {
                    if alert.issued > alerts[*winner].issued {
                        *winner = i;
                    }
                })
                .or_insert(i);
        }
        winners.into_values().collect()
    };

    alerts
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, alert)| alert)
        .collect()
}

/// Returns `true` if the alert is relevant to `window`: it was issued
/// inside it, its event interval overlaps it, or its single known event
/// instant falls inside it.
#[must_use]
pub fn is_in_window(alert: &Alert, window: &TimeWindow) -> bool {
    if window.contains(alert.issued) {
        return true;
    }
    match (alert.event_start, alert.event_end) {
        (Some(start), Some(end)) => window.overlaps(start, end),
        (Some(instant), None) | (None, Some(instant)) => window.contains(instant),
        (None, None) => false,
    }
}

/// Priority ascending, then most recently issued first. Stable.
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.issued.cmp(&a.issued))
    });
}

/// Union-find over input positions. Roots are always the smallest index of
/// their group.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
