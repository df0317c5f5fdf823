use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Identity of one metric series: name plus label pairs. Labels are kept
/// sorted so the same pairs in any order address the same series.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        labels.sort();
        Self {
            name: name.to_owned(),
            labels,
        }
    }
}

/// Monotonic event count.
#[derive(Default)]
struct CounterCell(AtomicU64);

impl CounterCell {
    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Point-in-time value. Stored as raw f64 bits in an atomic so writes
/// from any thread never need a lock.
#[derive(Default)]
struct GaugeCell(AtomicI64);

impl GaugeCell {
    fn put(&self, value: f64) {
        self.0.store(value.to_bits() as i64, Ordering::Relaxed);
    }

    fn add(&self, delta: f64) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits as u64) + delta).to_bits() as i64)
            });
    }

    fn value(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed) as u64)
    }
}

/// Raw observations, summarized on demand. Fine at relay volumes, where a
/// series sees one observation per publish.
#[derive(Default)]
struct HistogramCell {
    samples: Mutex<Vec<f64>>,
}

impl HistogramCell {
    fn record(&self, value: f64) {
        self.samples.lock().push(value);
    }

    fn summarize(&self) -> HistogramSummary {
        let mut samples = self.samples.lock();
        if samples.is_empty() {
            return HistogramSummary::default();
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        HistogramSummary {
            count: samples.len() as u64,
            sum: samples.iter().sum(),
            p50: quantile(&samples, 0.50),
            p95: quantile(&samples, 0.95),
            p99: quantile(&samples, 0.99),
        }
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Summary statistics for one histogram series.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Thread-safe in-process metrics recorder. Values live for the lifetime
/// of the process; there is no persistence.
pub struct MetricsRecorder {
    counters: RwLock<HashMap<SeriesKey, CounterCell>>,
    gauges: RwLock<HashMap<SeriesKey, GaugeCell>>,
    histograms: RwLock<HashMap<SeriesKey, HistogramCell>>,
}

/// Run `f` against the cell for `key`, creating the cell on first use.
/// The hot path takes only the shared lock; a miss retries under the
/// write lock.
fn with_cell<C: Default>(
    map: &RwLock<HashMap<SeriesKey, C>>,
    key: SeriesKey,
    f: impl FnOnce(&C),
) {
    {
        let cells = map.read();
        if let Some(cell) = cells.get(&key) {
            f(cell);
            return;
        }
    }
    let mut cells = map.write();
    f(cells.entry(key).or_default());
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// Increment a counter by `n`.
    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        with_cell(&self.counters, SeriesKey::new(name, labels), |c| c.add(n));
    }

    /// Set a gauge to an absolute value.
    pub fn gauge_set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        with_cell(&self.gauges, SeriesKey::new(name, labels), |g| {
            g.put(value)
        });
    }

    /// Move a gauge by `delta`, which may be negative.
    pub fn gauge_inc(&self, name: &str, labels: &[(&str, &str)], delta: f64) {
        with_cell(&self.gauges, SeriesKey::new(name, labels), |g| {
            g.add(delta)
        });
    }

    /// Record one histogram observation.
    pub fn histogram_observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        with_cell(&self.histograms, SeriesKey::new(name, labels), |h| {
            h.record(value)
        });
    }

    /// Summary of a histogram series; zeroed when the series is unknown.
    pub fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        let key = SeriesKey::new(name, labels);
        self.histograms
            .read()
            .get(&key)
            .map(HistogramCell::summarize)
            .unwrap_or_default()
    }

    /// Current value of a counter series, 0 when unknown.
    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = SeriesKey::new(name, labels);
        self.counters.read().get(&key).map_or(0, CounterCell::value)
    }

    /// Current value of a gauge series, 0.0 when unknown.
    pub fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let key = SeriesKey::new(name, labels);
        self.gauges.read().get(&key).map_or(0.0, GaugeCell::value)
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
