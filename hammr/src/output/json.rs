use std::io::Write as _;
use std::sync::Arc;

use hammr_core::runner::{
    MetricSeriesSummary, MetricValues, ProgressFn, ProgressSnapshot, Verdict,
};
use serde::Serialize;

use super::{OutputFormatter, RunOutcome};
use crate::cli::RunArgs;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, args: &RunArgs) {
        let line = JsonConfigLine {
            kind: "config",
            base_url: &args.base_url,
            conversation_id: &args.conversation_id,
            vus: args.vus,
            duration_secs: args.iterations.is_none().then(|| args.duration.as_secs_f64()),
            iterations: args.iterations,
            think_time_min_secs: args.think_time_min.as_secs_f64(),
            think_time_max_secs: args.think_time_max.as_secs_f64(),
        };
        emit_json_line(&line);
    }

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome) -> anyhow::Result<()> {
        let doc = summary_document(outcome);
        emit_json_line(&doc);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonConfigLine<'a> {
    kind: &'static str,
    base_url: &'a str,
    conversation_id: &'a str,
    vus: u64,
    duration_secs: Option<f64>,
    iterations: Option<u64>,
    think_time_min_secs: f64,
    think_time_max_secs: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub interval_secs: f64,
    pub vus: u64,

    pub requests_per_sec: f64,
    pub iterations_per_sec: f64,
    pub bytes_per_sec: u64,

    pub total_requests: u64,
    pub total_failed: u64,
    pub total_iterations: u64,
}

fn build_progress_line(u: &ProgressSnapshot) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        interval_secs: u.interval.as_secs_f64(),
        vus: u.vus,

        requests_per_sec: u.rps_now,
        iterations_per_sec: u.iterations_per_sec_now,
        bytes_per_sec: u.bytes_per_sec_now,

        total_requests: u.requests_total,
        total_failed: u.failed_total,
        total_iterations: u.iterations_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryDocument {
    pub kind: &'static str,
    pub totals: JsonTotals,
    pub latency_ms: JsonLatency,
    pub rates: JsonRates,
    pub passed: bool,
    pub verdicts: Vec<JsonVerdict>,
    pub metrics: Vec<JsonMetricSeries>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonTotals {
    pub virtual_users: u64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub iterations_total: u64,
    pub messages_sent_total: u64,
    pub messages_failed_total: u64,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,
    pub run_duration_secs: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatency {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRates {
    pub request_rate: f64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonVerdict {
    pub criterion: String,
    pub metric: String,
    pub comparator: String,
    pub bound: f64,
    pub severity: String,
    pub observed: f64,
    pub passed: bool,
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetricSeries {
    pub name: String,
    pub kind: String,
    #[serde(flatten)]
    pub values: JsonMetricValues,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum JsonMetricValues {
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

/// The JSON shape shared by `--output json` stdout and the summary file.
pub(crate) fn summary_document(outcome: &RunOutcome) -> JsonSummaryDocument {
    let report = &outcome.summary.report;

    JsonSummaryDocument {
        kind: "summary",
        totals: JsonTotals {
            virtual_users: outcome.vus,
            requests_total: report.total_requests,
            failed_requests_total: report.failed_requests,
            iterations_total: report.iterations,
            messages_sent_total: report.messages_sent,
            messages_failed_total: report.messages_failed,
            bytes_received_total: report.bytes_received,
            bytes_sent_total: report.bytes_sent,
            run_duration_secs: report.run_duration.as_secs_f64(),
        },
        latency_ms: JsonLatency {
            avg: report.latency_avg_ms,
            min: report.latency_min_ms,
            max: report.latency_max_ms,
            p50: report.latency_p50_ms,
            p95: report.latency_p95_ms,
            p99: report.latency_p99_ms,
        },
        rates: JsonRates {
            request_rate: report.request_rate,
            success_rate: report.success_rate,
            error_rate: report.error_rate,
            req_per_sec_avg: report.req_per_sec_avg,
            req_per_sec_stdev: report.req_per_sec_stdev,
            req_per_sec_max: report.req_per_sec_max,
        },
        passed: outcome.assessment.passed,
        verdicts: outcome
            .assessment
            .verdicts
            .iter()
            .map(build_verdict)
            .collect(),
        metrics: outcome
            .summary
            .metrics
            .iter()
            .map(build_metric_series)
            .collect(),
    }
}

fn build_verdict(v: &Verdict) -> JsonVerdict {
    let c = &v.criterion;
    JsonVerdict {
        criterion: format!("{} {} {}", c.metric, c.comparator, c.bound),
        metric: c.metric.to_string(),
        comparator: c.comparator.to_string(),
        bound: c.bound,
        severity: c.severity.to_string(),
        observed: v.observed,
        passed: v.passed,
        tier: v.tier.to_string(),
    }
}

fn build_metric_series(series: &MetricSeriesSummary) -> JsonMetricSeries {
    let values = match &series.values {
        MetricValues::Counter { value } => JsonMetricValues::Counter { value: *value },
        MetricValues::Gauge { value, peak } => JsonMetricValues::Gauge {
            value: *value,
            peak: *peak,
        },
        MetricValues::Rate { total, trues, rate } => JsonMetricValues::Rate {
            total: *total,
            trues: *trues,
            rate: *rate,
        },
        MetricValues::Trend {
            count,
            min,
            max,
            avg,
            p50,
            p90,
            p95,
            p99,
        } => JsonMetricValues::Trend {
            count: *count,
            min: *min,
            max: *max,
            avg: *avg,
            p50: *p50,
            p90: *p90,
            p95: *p95,
            p99: *p99,
        },
    };

    JsonMetricSeries {
        name: series.name.clone(),
        kind: series.kind.to_string(),
        values,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
