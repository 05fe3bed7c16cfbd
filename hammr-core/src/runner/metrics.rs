use hdrhistogram::Histogram;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    pub values: MetricValues,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter {
        value: u64,
    },
    Gauge {
        value: i64,
        peak: i64,
    },
    Rate {
        total: u64,
        trues: u64,
        rate: Option<f64>,
    },
    Trend {
        count: u64,
        min: Option<f64>,
        max: Option<f64>,
        avg: Option<f64>,
        p50: Option<f64>,
        p90: Option<f64>,
        p95: Option<f64>,
        p99: Option<f64>,
    },
}

/// Point-in-time view of a trend series, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrendStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    kind: MetricKind,
    name: Arc<str>,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    series: Mutex<HashMap<MetricKey, Arc<Metric>>>,
}

impl MetricsRegistry {
    pub fn handle(&self, kind: MetricKind, name: &str) -> MetricHandle {
        let name: Arc<str> = Arc::from(name);
        let key = MetricKey {
            kind,
            name: name.clone(),
        };

        let mut map = self.series.lock().unwrap_or_else(|p| p.into_inner());
        let base = map
            .entry(key)
            .or_insert_with(|| Arc::new(Metric::new(kind, name)))
            .clone();
        MetricHandle { base }
    }

    pub fn summarize(&self) -> Vec<MetricSeriesSummary> {
        let map = self.series.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<MetricSeriesSummary> = map.values().map(|m| m.summarize()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

/// Cheap cloneable recorder bound to one series. Recording through the
/// wrong kind of handle is a no-op rather than an error.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    base: Arc<Metric>,
}

impl MetricHandle {
    pub fn increment(&self, by: u64) {
        self.base.increment(by);
    }

    pub fn observe(&self, value: f64) {
        self.base.observe(value);
    }

    pub fn add_bool(&self, value: bool) {
        self.base.add_bool(value);
    }

    pub fn acquire(&self) -> GaugeGuard {
        GaugeGuard::new(self.base.clone())
    }

    pub fn kind(&self) -> MetricKind {
        self.base.kind
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn counter_value(&self) -> u64 {
        self.base.counter_value()
    }

    pub fn rate_counts(&self) -> (u64, u64) {
        self.base.rate_counts()
    }

    pub fn gauge_values(&self) -> (i64, i64) {
        self.base.gauge_values()
    }

    pub fn trend_stats(&self) -> Option<TrendStats> {
        self.base.trend.as_ref().and_then(TrendAgg::stats)
    }
}

/// RAII increment on a gauge series. The slot is released on drop, so
/// early returns cannot leave the gauge elevated.
#[derive(Debug)]
pub struct GaugeGuard {
    metric: Arc<Metric>,
}

impl GaugeGuard {
    fn new(metric: Arc<Metric>) -> Self {
        metric.gauge_inc();
        Self { metric }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.metric.gauge_dec();
    }
}

#[derive(Debug)]
struct Metric {
    kind: MetricKind,
    name: Arc<str>,
    counter: Option<CounterAgg>,
    gauge: Option<GaugeAgg>,
    rate: Option<RateAgg>,
    trend: Option<TrendAgg>,
}

impl Metric {
    fn new(kind: MetricKind, name: Arc<str>) -> Self {
        Self {
            kind,
            name,
            counter: (kind == MetricKind::Counter).then(CounterAgg::default),
            gauge: (kind == MetricKind::Gauge).then(GaugeAgg::default),
            rate: (kind == MetricKind::Rate).then(RateAgg::default),
            trend: (kind == MetricKind::Trend).then(TrendAgg::new),
        }
    }

    fn increment(&self, by: u64) {
        if let Some(c) = &self.counter {
            c.add(by);
        }
    }

    fn observe(&self, value: f64) {
        if let Some(t) = &self.trend {
            t.record(value);
        }
    }

    fn add_bool(&self, value: bool) {
        if let Some(r) = &self.rate {
            r.add(value);
        }
    }

    fn gauge_inc(&self) {
        if let Some(g) = &self.gauge {
            g.inc();
        }
    }

    fn gauge_dec(&self) {
        if let Some(g) = &self.gauge {
            g.dec();
        }
    }

    fn counter_value(&self) -> u64 {
        self.counter.as_ref().map(CounterAgg::get).unwrap_or(0)
    }

    fn rate_counts(&self) -> (u64, u64) {
        self.rate.as_ref().map(RateAgg::counts).unwrap_or((0, 0))
    }

    fn gauge_values(&self) -> (i64, i64) {
        self.gauge.as_ref().map(GaugeAgg::get).unwrap_or((0, 0))
    }

    fn summarize(&self) -> MetricSeriesSummary {
        let values = match self.kind {
            MetricKind::Counter => MetricValues::Counter {
                value: self.counter_value(),
            },
            MetricKind::Gauge => {
                let (value, peak) = self.gauge_values();
                MetricValues::Gauge { value, peak }
            }
            MetricKind::Rate => {
                let (total, trues) = self.rate_counts();
                let rate = (total > 0).then(|| trues as f64 / total as f64);
                MetricValues::Rate { total, trues, rate }
            }
            MetricKind::Trend => match self.trend.as_ref().and_then(TrendAgg::stats) {
                Some(s) => MetricValues::Trend {
                    count: s.count,
                    min: Some(s.min),
                    max: Some(s.max),
                    avg: Some(s.avg),
                    p50: Some(s.p50),
                    p90: Some(s.p90),
                    p95: Some(s.p95),
                    p99: Some(s.p99),
                },
                None => MetricValues::Trend {
                    count: 0,
                    min: None,
                    max: None,
                    avg: None,
                    p50: None,
                    p90: None,
                    p95: None,
                    p99: None,
                },
            },
        };

        MetricSeriesSummary {
            name: self.name.to_string(),
            kind: self.kind,
            values,
        }
    }
}

#[derive(Debug, Default)]
struct CounterAgg {
    value: AtomicU64,
}

impl CounterAgg {
    fn add(&self, by: u64) {
        self.value.fetch_add(by, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct GaugeAgg {
    value: AtomicI64,
    peak: AtomicI64,
}

impl GaugeAgg {
    fn inc(&self) {
        let now = self.value.fetch_add(1, Ordering::Relaxed) + 1;

        let mut cur = self.peak.load(Ordering::Relaxed);
        while now > cur {
            match self
                .peak
                .compare_exchange_weak(cur, now, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(v) => cur = v,
            }
        }
    }

    fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    fn get(&self) -> (i64, i64) {
        (
            self.value.load(Ordering::Relaxed),
            self.peak.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Default)]
struct RateAgg {
    total: AtomicU64,
    trues: AtomicU64,
}

impl RateAgg {
    fn add(&self, v: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if v {
            self.trues.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn counts(&self) -> (u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.trues.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug)]
struct TrendAgg {
    count: AtomicU64,
    sum_scaled: AtomicU64,
    min_scaled: AtomicU64,
    max_scaled: AtomicU64,
    hist: Mutex<Histogram<u64>>,
}

impl TrendAgg {
    fn new() -> Self {
        // Microsecond-scaled, so durations up to one minute keep three
        // significant figures.
        let hist = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));
        Self {
            count: AtomicU64::new(0),
            sum_scaled: AtomicU64::new(0),
            min_scaled: AtomicU64::new(u64::MAX),
            max_scaled: AtomicU64::new(0),
            hist: Mutex::new(hist),
        }
    }

    fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let scaled = (value * 1000.0).round();
        if scaled <= 0.0 {
            return;
        }
        let scaled = scaled as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_scaled.fetch_add(scaled, Ordering::Relaxed);

        let mut cur = self.min_scaled.load(Ordering::Relaxed);
        while scaled < cur {
            match self.min_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(v) => cur = v,
            }
        }

        let mut cur = self.max_scaled.load(Ordering::Relaxed);
        while scaled > cur {
            match self.max_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(v) => cur = v,
            }
        }

        let mut h = self.hist.lock().unwrap_or_else(|p| p.into_inner());
        let _ = h.record(scaled);
    }

    fn stats(&self) -> Option<TrendStats> {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }

        let sum = self.sum_scaled.load(Ordering::Relaxed) as f64;
        let min = self.min_scaled.load(Ordering::Relaxed);
        let max = self.max_scaled.load(Ordering::Relaxed);

        let h = self.hist.lock().unwrap_or_else(|p| p.into_inner());
        let (p50, p90, p95, p99) = if h.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (
                h.value_at_quantile(0.50) as f64 / 1000.0,
                h.value_at_quantile(0.90) as f64 / 1000.0,
                h.value_at_quantile(0.95) as f64 / 1000.0,
                h.value_at_quantile(0.99) as f64 / 1000.0,
            )
        };

        Some(TrendStats {
            count,
            min: min as f64 / 1000.0,
            max: max as f64 / 1000.0,
            avg: sum / (count as f64) / 1000.0,
            p50,
            p90,
            p95,
            p99,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_across_handles() {
        let metrics = MetricsRegistry::default();
        let a = metrics.handle(MetricKind::Counter, "reqs");
        let b = metrics.handle(MetricKind::Counter, "reqs");

        a.increment(2);
        b.increment(3);

        assert_eq!(a.counter_value(), 5);
        assert_eq!(b.counter_value(), 5);
    }

    #[test]
    fn mismatched_recordings_are_ignored() {
        let metrics = MetricsRegistry::default();
        let counter = metrics.handle(MetricKind::Counter, "c");

        counter.observe(12.5);
        counter.add_bool(true);
        let _guard = counter.acquire();

        assert_eq!(counter.counter_value(), 0);
        assert_eq!(counter.rate_counts(), (0, 0));
        assert!(counter.trend_stats().is_none());
    }

    #[test]
    fn trend_ignores_non_positive_and_non_finite_values() {
        let metrics = MetricsRegistry::default();
        let t = metrics.handle(MetricKind::Trend, "latency");

        t.observe(f64::NAN);
        t.observe(f64::INFINITY);
        t.observe(0.0);
        t.observe(-3.0);
        t.observe(1.0);
        t.observe(2.0);

        let stats = match t.trend_stats() {
            Some(s) => s,
            None => panic!("expected trend samples"),
        };
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 2.0);
        assert_eq!(stats.avg, 1.5);
        assert!((stats.p50 - 2.0).abs() < 0.01);
    }

    #[test]
    fn rate_tracks_total_and_trues() {
        let metrics = MetricsRegistry::default();
        let r = metrics.handle(MetricKind::Rate, "errors");

        r.add_bool(true);
        r.add_bool(false);
        r.add_bool(true);

        assert_eq!(r.rate_counts(), (3, 2));

        let out = metrics.summarize();
        let MetricValues::Rate { total, trues, rate } = &out[0].values else {
            panic!("expected rate values");
        };
        assert_eq!(*total, 3);
        assert_eq!(*trues, 2);
        assert_eq!(*rate, Some(2.0 / 3.0));
    }

    #[test]
    fn gauge_guard_releases_on_drop_and_keeps_peak() {
        let metrics = MetricsRegistry::default();
        let g = metrics.handle(MetricKind::Gauge, "in_flight");

        {
            let _a = g.acquire();
            let _b = g.acquire();
            assert_eq!(g.gauge_values(), (2, 2));
        }
        let _c = g.acquire();

        assert_eq!(g.gauge_values(), (1, 2));
    }

    #[test]
    fn summaries_are_sorted_by_name() {
        let metrics = MetricsRegistry::default();
        metrics.handle(MetricKind::Counter, "b_series").increment(1);
        metrics.handle(MetricKind::Rate, "a_series").add_bool(true);

        let out = metrics.summarize();
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a_series", "b_series"]);
        assert_eq!(out[0].kind.to_string(), "rate");
    }
}
