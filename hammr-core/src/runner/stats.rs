use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use super::metrics::{
    GaugeGuard, MetricHandle, MetricKind, MetricSeriesSummary, MetricsRegistry,
};
use super::scenario::ScenarioKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// One finished request, as observed by the worker that issued it.
#[derive(Debug, Clone, Copy)]
pub struct MetricSample {
    pub scenario: ScenarioKind,
    pub duration: Duration,
    pub outcome: Outcome,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub at: SystemTime,
}

/// Shared accumulator for a single run. Workers call [`RunMetrics::record`]
/// concurrently; [`RunMetrics::aggregate`] reads a consistent snapshot once
/// they have quiesced.
#[derive(Debug)]
pub struct RunMetrics {
    registry: MetricsRegistry,
    http_reqs: MetricHandle,
    http_req_duration: MetricHandle,
    http_req_failed: MetricHandle,
    response_time: MetricHandle,
    success: MetricHandle,
    errors: MetricHandle,
    messages_sent: MetricHandle,
    messages_failed: MetricHandle,
    data_received: MetricHandle,
    data_sent: MetricHandle,
    iterations: MetricHandle,
    iteration_duration: MetricHandle,
    active_connections: MetricHandle,
    rps_samples: Mutex<RpsAgg>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        let registry = MetricsRegistry::default();
        Self {
            http_reqs: registry.handle(MetricKind::Counter, "http_reqs"),
            http_req_duration: registry.handle(MetricKind::Trend, "http_req_duration"),
            http_req_failed: registry.handle(MetricKind::Rate, "http_req_failed"),
            response_time: registry.handle(MetricKind::Trend, "response_time"),
            success: registry.handle(MetricKind::Rate, "success"),
            errors: registry.handle(MetricKind::Rate, "errors"),
            messages_sent: registry.handle(MetricKind::Counter, "messages_sent"),
            messages_failed: registry.handle(MetricKind::Counter, "messages_failed"),
            data_received: registry.handle(MetricKind::Counter, "data_received"),
            data_sent: registry.handle(MetricKind::Counter, "data_sent"),
            iterations: registry.handle(MetricKind::Counter, "iterations"),
            iteration_duration: registry.handle(MetricKind::Trend, "iteration_duration"),
            active_connections: registry.handle(MetricKind::Gauge, "active_connections"),
            rps_samples: Mutex::new(RpsAgg::default()),
            registry,
        }
    }
}

impl RunMetrics {
    pub fn record(&self, sample: &MetricSample) {
        let ms = sample.duration.as_secs_f64() * 1000.0;
        let failed = sample.outcome == Outcome::Failure;

        self.http_reqs.increment(1);
        self.http_req_duration.observe(ms);
        self.response_time.observe(ms);
        self.http_req_failed.add_bool(failed);
        self.success.add_bool(!failed);
        self.errors.add_bool(failed);

        if sample.scenario == ScenarioKind::SendMessage {
            if failed {
                self.messages_failed.increment(1);
            } else {
                self.messages_sent.increment(1);
            }
        }

        self.data_sent.increment(sample.bytes_sent);
        self.data_received.increment(sample.bytes_received);
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        self.iterations.increment(1);
        self.iteration_duration.observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Marks a request as in flight until the returned guard drops.
    pub fn connection_guard(&self) -> GaugeGuard {
        self.active_connections.acquire()
    }

    pub fn record_rps_sample(&self, rps_now: f64) {
        let mut agg = self.rps_samples.lock().unwrap_or_else(|p| p.into_inner());
        agg.record(rps_now);
    }

    pub fn requests_total(&self) -> u64 {
        self.http_reqs.counter_value()
    }

    pub fn failed_total(&self) -> u64 {
        self.http_req_failed.rate_counts().1
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations.counter_value()
    }

    pub fn bytes_total(&self) -> u64 {
        self.data_received
            .counter_value()
            .saturating_add(self.data_sent.counter_value())
    }

    pub fn series(&self) -> Vec<MetricSeriesSummary> {
        self.registry.summarize()
    }

    pub fn aggregate(&self, elapsed: Duration) -> AggregateReport {
        let total_requests = self.http_reqs.counter_value();
        let failed_requests = self.http_req_failed.rate_counts().1;
        let latency = self.http_req_duration.trend_stats().unwrap_or_default();

        let secs = elapsed.as_secs_f64().max(1e-9);
        let (req_per_sec_avg, req_per_sec_stdev, req_per_sec_max) = {
            let agg = self.rps_samples.lock().unwrap_or_else(|p| p.into_inner());
            agg.summary()
        };

        AggregateReport {
            total_requests,
            failed_requests,
            request_rate: total_requests as f64 / secs,
            latency_avg_ms: latency.avg,
            latency_min_ms: latency.min,
            latency_max_ms: latency.max,
            latency_p50_ms: latency.p50,
            latency_p95_ms: latency.p95,
            latency_p99_ms: latency.p99,
            success_rate: rate_of(&self.success),
            error_rate: rate_of(&self.errors),
            messages_sent: self.messages_sent.counter_value(),
            messages_failed: self.messages_failed.counter_value(),
            bytes_received: self.data_received.counter_value(),
            bytes_sent: self.data_sent.counter_value(),
            iterations: self.iterations.counter_value(),
            run_duration: elapsed,
            req_per_sec_avg,
            req_per_sec_stdev,
            req_per_sec_max,
        }
    }
}

fn rate_of(handle: &MetricHandle) -> f64 {
    let (total, trues) = handle.rate_counts();
    if total == 0 {
        0.0
    } else {
        trues as f64 / total as f64
    }
}

/// Aggregated view of a finished run. Latency fields are milliseconds and
/// fall back to zero when no samples were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub request_rate: f64,
    pub latency_avg_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub iterations: u64,
    pub run_duration: Duration,
    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct RpsAgg {
    count: u64,
    mean: f64,
    m2: f64,
    max: f64,
}

impl RpsAgg {
    // Welford's online variance, so samples need not be retained.
    fn record(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }

        self.count = self.count.saturating_add(1);
        let delta = sample - self.mean;
        self.mean += delta / (self.count as f64);
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
        self.max = self.max.max(sample);
    }

    fn summary(&self) -> (f64, f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0, 0.0);
        }

        let stdev = if self.count >= 2 {
            (self.m2 / ((self.count - 1) as f64)).sqrt()
        } else {
            0.0
        };
        (self.mean, stdev, self.max)
    }
}
