//! Metric ingestion and windowed aggregation.
//!
//! [`MetricsCollector`] is the producer-facing entry point: application code
//! (HTTP middleware, job runners) calls [`MetricsCollector::record_metric`]
//! and the collector keeps a bounded rolling buffer per metric name. Alert
//! rules read back an aggregate of a metric over their evaluation window.
//!
//! Buffers are bounded both by point count and by age, so an unevaluated
//! metric (one referenced by no rule) costs a fixed amount of memory and is
//! otherwise ignored.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Maximum number of points retained per metric name.
const MAX_POINTS_PER_METRIC: usize = 10_000;

/// Maximum age of a retained point. Older points are pruned on insert.
const MAX_POINT_AGE_MINUTES: i64 = 120;

/// Aggregation applied to a metric's points over a rule window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Arithmetic mean of the window.
    Avg,
    /// Sum of the window.
    Sum,
    /// Smallest value in the window.
    Min,
    /// Largest value in the window.
    Max,
    /// Number of points in the window.
    Count,
    /// 95th percentile of the window.
    P95,
}

/// A single recorded metric observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Observed value.
    pub value: f64,
    /// Unit label (e.g., "ms", "count", "percent").
    pub unit: String,
    /// Free-form tags attached by the producer.
    pub tags: Vec<String>,
    /// Key/value dimensions (e.g., route, region).
    pub dimensions: HashMap<String, String>,
    /// When the observation was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Collects metrics into per-name rolling buffers. Shared behind an `Arc`
/// by the intake and the runtime.
#[derive(Default)]
pub struct MetricsCollector {
    buffers: DashMap<String, RwLock<VecDeque<MetricPoint>>>,
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self { buffers: DashMap::new() }
    }

    /// Records a metric observation.
    ///
    /// This is the producer-facing entry point. Recording never fails and
    /// never blocks on rule evaluation; evaluation happens separately in the
    /// signal intake path.
    pub fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        tags: Vec<String>,
        dimensions: HashMap<String, String>,
    ) {
        let point = MetricPoint { value, unit: unit.to_string(), tags, dimensions, timestamp: Utc::now() };

        let buffer = self.buffers.entry(name.to_string()).or_default();
        let mut points = buffer.write();

        points.push_back(point);
        Self::prune(&mut points);
    }

    /// Returns the most recent point for a metric, if any.
    #[must_use]
    pub fn latest(&self, name: &str) -> Option<MetricPoint> {
        self.buffers.get(name).and_then(|b| b.read().back().cloned())
    }

    /// Aggregates a metric's points over the trailing `window_minutes`.
    ///
    /// Returns `None` when the metric has no points inside the window, so
    /// callers can distinguish "no data" from a zero aggregate.
    #[must_use]
    pub fn aggregate(&self, name: &str, window_minutes: u32, aggregation: Aggregation) -> Option<f64> {
        let buffer = self.buffers.get(name)?;
        let cutoff = Utc::now() - Duration::minutes(i64::from(window_minutes));

        let points = buffer.read();
        let mut values: Vec<f64> =
            points.iter().filter(|p| p.timestamp >= cutoff).map(|p| p.value).collect();

        if values.is_empty() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let result = match aggregation {
            Aggregation::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Count => values.len() as f64,
            Aggregation::P95 => {
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let rank = ((values.len() as f64) * 0.95).ceil() as usize;
                values[rank.saturating_sub(1).min(values.len() - 1)]
            }
        };

        Some(result)
    }

    /// Number of distinct metric names currently buffered.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.buffers.len()
    }

    fn prune(points: &mut VecDeque<MetricPoint>) {
        let cutoff = Utc::now() - Duration::minutes(MAX_POINT_AGE_MINUTES);
        while let Some(front) = points.front() {
            if front.timestamp < cutoff {
                points.pop_front();
            } else {
                break;
            }
        }
        while points.len() > MAX_POINTS_PER_METRIC {
            points.pop_front();
        }
    }
}
