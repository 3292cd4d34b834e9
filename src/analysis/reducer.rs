//! Metric reduction.
//!
//! Reduces each defined metric's point buffer into the summary shape of
//! its declared type.

use crate::models::{
    DataPoint, MetricDefinition, MetricEntry, MetricKind, MetricSummary, TimeSeriesPoint,
    TrendSummary,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Quantile reported as `p95` for trend metrics.
pub const P95: f64 = 0.95;

/// Summarize every defined metric with a recognized type.
///
/// Metrics that have points but no definition are left out.
pub fn reduce_metrics(
    definitions: &HashMap<String, MetricDefinition>,
    points: &HashMap<String, Vec<DataPoint>>,
    include_time_series: bool,
) -> BTreeMap<String, MetricEntry> {
    let mut metrics = BTreeMap::new();

    for (name, definition) in definitions {
        let Some(kind) = definition.kind else {
            continue;
        };

        let metric_points = points.get(name).map(Vec::as_slice).unwrap_or_default();
        metrics.insert(
            name.clone(),
            MetricEntry {
                kind,
                contains: definition.contains.clone(),
                values: summarize(kind, metric_points, include_time_series),
            },
        );
    }

    let undefined = points
        .keys()
        .filter(|name| !definitions.contains_key(*name))
        .count();
    if undefined > 0 {
        debug!("{} metrics have points but no definition", undefined);
    }

    metrics
}

/// Reduce one point buffer according to the metric type.
pub fn summarize(kind: MetricKind, points: &[DataPoint], include_time_series: bool) -> MetricSummary {
    match kind {
        MetricKind::Counter => MetricSummary::Counter {
            count: points.iter().map(DataPoint::value_or_zero).sum(),
        },
        MetricKind::Gauge => MetricSummary::Gauge {
            value: points
                .iter()
                .map(DataPoint::value_or_zero)
                .reduce(f64::max)
                .unwrap_or(0.0),
        },
        MetricKind::Rate => summarize_rate(points),
        MetricKind::Trend => MetricSummary::Trend(summarize_trend(points, include_time_series)),
    }
}

fn summarize_rate(points: &[DataPoint]) -> MetricSummary {
    let passes = points.iter().filter(|p| p.value == Some(1.0)).count() as u64;
    let fails = points.iter().filter(|p| p.value == Some(0.0)).count() as u64;
    let total = passes + fails;

    MetricSummary::Rate {
        passes,
        fails,
        rate: if total > 0 {
            passes as f64 / total as f64
        } else {
            0.0
        },
    }
}

fn summarize_trend(points: &[DataPoint], include_time_series: bool) -> TrendSummary {
    if points.is_empty() {
        return TrendSummary::default();
    }

    let mut values: Vec<f64> = points.iter().map(DataPoint::value_or_zero).collect();
    values.sort_by(f64::total_cmp);

    let time_series = (include_time_series && points.iter().any(|p| p.time.is_some())).then(|| {
        points
            .iter()
            .map(|p| TimeSeriesPoint {
                time: p.timestamp_millis(),
                value: p.value_or_zero(),
                tags: p.tags.clone(),
            })
            .collect()
    });

    TrendSummary {
        min: values.first().copied(),
        max: values.last().copied(),
        avg: Some(values.iter().sum::<f64>() / values.len() as f64),
        p95: nearest_rank(&values, P95),
        time_series,
    }
}

/// Nearest-rank percentile over ascending values: index `ceil(n * q) - 1`,
/// clamped to the slice.
pub fn nearest_rank(sorted: &[f64], quantile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (sorted.len() as f64 * quantile).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}
