use std::fmt::Write as _;

use hammr_core::runner::{AggregateReport, Assessment, MetricSelector, Tier};

const INNER_WIDTH: usize = 76;

/// Renders the final box report. Pure string building so it can be tested
/// without touching stdout.
pub(crate) fn render(report: &AggregateReport, assessment: &Assessment, vus: u64) -> String {
    let mut out = String::new();

    border(&mut out, '╔', '╗');
    writeln!(&mut out, "║{:^INNER_WIDTH$}║", "PERFORMANCE TEST RESULTS").ok();
    border(&mut out, '╠', '╣');

    kv(&mut out, "Virtual Users:", &vus.to_string());
    kv(&mut out, "Total Requests:", &report.total_requests.to_string());
    kv(
        &mut out,
        "Request Rate:",
        &format!("{:.2} req/s", report.request_rate),
    );
    kv(
        &mut out,
        "Failed Requests:",
        &report.failed_requests.to_string(),
    );

    section(&mut out, "RESPONSE TIME METRICS");
    kv(&mut out, "Average:", &format!("{:.2} ms", report.latency_avg_ms));
    kv(&mut out, "Minimum:", &format!("{:.2} ms", report.latency_min_ms));
    kv(&mut out, "Maximum:", &format!("{:.2} ms", report.latency_max_ms));
    kv(
        &mut out,
        "50th Percentile (Median):",
        &format!("{:.2} ms", report.latency_p50_ms),
    );
    kv(
        &mut out,
        "95th Percentile:",
        &format!("{:.2} ms", report.latency_p95_ms),
    );
    kv(
        &mut out,
        "99th Percentile:",
        &format!("{:.2} ms", report.latency_p99_ms),
    );

    section(&mut out, "SUCCESS/ERROR RATES");
    kv(
        &mut out,
        "Success Rate:",
        &format!("{:.2}%", report.success_rate * 100.0),
    );
    kv(
        &mut out,
        "Error Rate:",
        &format!("{:.2}%", report.error_rate * 100.0),
    );
    kv(&mut out, "Messages Sent:", &report.messages_sent.to_string());
    kv(
        &mut out,
        "Messages Failed:",
        &report.messages_failed.to_string(),
    );

    section(&mut out, "DATA TRANSFER");
    kv(&mut out, "Data Received:", &format_mb(report.bytes_received));
    kv(&mut out, "Data Sent:", &format_mb(report.bytes_sent));

    section(&mut out, "ASSESSMENT");
    for line in assessment_lines(report) {
        writeln!(&mut out, "║ {line:<75}║").ok();
    }

    border(&mut out, '╚', '╝');

    out.push('\n');
    if assessment.passed {
        out.push_str("✓ OVERALL: ALL PERFORMANCE CRITERIA MET!\n");
    } else {
        out.push_str("✗ OVERALL: SOME PERFORMANCE CRITERIA NOT MET\n");
    }

    out
}

fn border(out: &mut String, left: char, right: char) {
    out.push(left);
    for _ in 0..INNER_WIDTH {
        out.push('═');
    }
    out.push(right);
    out.push('\n');
}

fn section(out: &mut String, title: &str) {
    border(out, '╠', '╣');
    writeln!(out, "║ {title:<75}║").ok();
    border(out, '╠', '╣');
}

fn kv(out: &mut String, label: &str, value: &str) {
    writeln!(out, "║ {label:<28}{value:<47}║").ok();
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", (bytes as f64) / 1024.0 / 1024.0)
}

fn assessment_lines(report: &AggregateReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);

    let avg = MetricSelector::AvgLatencyMs.tier(report.latency_avg_ms);
    lines.push(assessment_line(
        avg,
        match avg {
            Tier::Excellent => "Excellent average response time (< 100ms)",
            Tier::Good => "Good average response time (< 200ms)",
            Tier::Acceptable => "Acceptable average response time (< 500ms)",
            Tier::Poor => "Poor average response time (> 500ms)",
        },
    ));

    let p95 = MetricSelector::P95LatencyMs.tier(report.latency_p95_ms);
    lines.push(assessment_line(
        p95,
        match p95 {
            Tier::Excellent | Tier::Good => "Excellent 95th percentile (< 500ms)",
            Tier::Acceptable => "Acceptable 95th percentile (< 1s)",
            Tier::Poor => "Poor 95th percentile (> 1s)",
        },
    ));

    let errors = MetricSelector::ErrorRate.tier(report.error_rate);
    lines.push(assessment_line(
        errors,
        match errors {
            Tier::Excellent | Tier::Good => "Excellent error rate (< 1%)",
            Tier::Acceptable => "Acceptable error rate (< 5%)",
            Tier::Poor => "High error rate (> 5%)",
        },
    ));

    let throughput = MetricSelector::RequestRate.tier(report.request_rate);
    lines.push(assessment_line(
        throughput,
        match throughput {
            Tier::Excellent => "High throughput (> 100 req/s)",
            Tier::Good => "Good throughput (> 50 req/s)",
            Tier::Acceptable => "Moderate throughput (> 10 req/s)",
            Tier::Poor => "Low throughput (< 10 req/s)",
        },
    ));

    lines
}

fn assessment_line(tier: Tier, phrase: &str) -> String {
    format!("{} {phrase}", tier.marker())
}
