use super::stats::AggregateReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl Tier {
    pub fn marker(self) -> char {
        match self {
            Tier::Excellent | Tier::Good => '✓',
            Tier::Acceptable => '!',
            Tier::Poor => '✗',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Required,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparator {
    pub fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::Lt => observed < bound,
            Comparator::Lte => observed <= bound,
            Comparator::Gt => observed > bound,
            Comparator::Gte => observed >= bound,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MetricSelector {
    AvgLatencyMs,
    P95LatencyMs,
    P99LatencyMs,
    ErrorRate,
    SuccessRate,
    RequestRate,
}

impl MetricSelector {
    pub fn observed(self, report: &AggregateReport) -> f64 {
        match self {
            MetricSelector::AvgLatencyMs => report.latency_avg_ms,
            MetricSelector::P95LatencyMs => report.latency_p95_ms,
            MetricSelector::P99LatencyMs => report.latency_p99_ms,
            MetricSelector::ErrorRate => report.error_rate,
            MetricSelector::SuccessRate => report.success_rate,
            MetricSelector::RequestRate => report.request_rate,
        }
    }

    /// Grades an observed value on this metric's ladder. Bounds are checked
    /// in order, so a value lands in the first tier it satisfies.
    pub fn tier(self, observed: f64) -> Tier {
        match self {
            MetricSelector::AvgLatencyMs => {
                if observed < 100.0 {
                    Tier::Excellent
                } else if observed < 200.0 {
                    Tier::Good
                } else if observed < 500.0 {
                    Tier::Acceptable
                } else {
                    Tier::Poor
                }
            }
            MetricSelector::P95LatencyMs | MetricSelector::P99LatencyMs => {
                if observed < 500.0 {
                    Tier::Excellent
                } else if observed < 1000.0 {
                    Tier::Acceptable
                } else {
                    Tier::Poor
                }
            }
            MetricSelector::ErrorRate => {
                if observed < 0.01 {
                    Tier::Excellent
                } else if observed < 0.05 {
                    Tier::Acceptable
                } else {
                    Tier::Poor
                }
            }
            MetricSelector::SuccessRate => {
                if observed > 0.99 {
                    Tier::Excellent
                } else if observed > 0.95 {
                    Tier::Acceptable
                } else {
                    Tier::Poor
                }
            }
            MetricSelector::RequestRate => {
                if observed > 100.0 {
                    Tier::Excellent
                } else if observed > 50.0 {
                    Tier::Good
                } else if observed > 10.0 {
                    Tier::Acceptable
                } else {
                    Tier::Poor
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCriterion {
    pub metric: MetricSelector,
    pub comparator: Comparator,
    pub bound: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub criterion: ThresholdCriterion,
    pub observed: f64,
    pub passed: bool,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub verdicts: Vec<Verdict>,
    pub passed: bool,
}

/// Evaluates every criterion against the report. The overall result is the
/// conjunction of the required criteria; informational ones are graded but
/// cannot fail the run.
pub fn assess(report: &AggregateReport, criteria: &[ThresholdCriterion]) -> Assessment {
    let verdicts: Vec<Verdict> = criteria
        .iter()
        .map(|criterion| {
            let observed = criterion.metric.observed(report);
            Verdict {
                criterion: *criterion,
                observed,
                passed: criterion.comparator.holds(observed, criterion.bound),
                tier: criterion.metric.tier(observed),
            }
        })
        .collect();

    let passed = verdicts
        .iter()
        .filter(|v| v.criterion.severity == Severity::Required)
        .all(|v| v.passed);

    Assessment { verdicts, passed }
}

pub fn default_criteria() -> Vec<ThresholdCriterion> {
    fn criterion(
        metric: MetricSelector,
        comparator: Comparator,
        bound: f64,
        severity: Severity,
    ) -> ThresholdCriterion {
        ThresholdCriterion {
            metric,
            comparator,
            bound,
            severity,
        }
    }

    vec![
        criterion(
            MetricSelector::AvgLatencyMs,
            Comparator::Lt,
            200.0,
            Severity::Informational,
        ),
        criterion(
            MetricSelector::AvgLatencyMs,
            Comparator::Lt,
            500.0,
            Severity::Required,
        ),
        criterion(
            MetricSelector::P95LatencyMs,
            Comparator::Lt,
            500.0,
            Severity::Informational,
        ),
        criterion(
            MetricSelector::P95LatencyMs,
            Comparator::Lt,
            1000.0,
            Severity::Required,
        ),
        criterion(
            MetricSelector::P99LatencyMs,
            Comparator::Lt,
            1000.0,
            Severity::Informational,
        ),
        criterion(
            MetricSelector::ErrorRate,
            Comparator::Lt,
            0.05,
            Severity::Required,
        ),
        criterion(
            MetricSelector::SuccessRate,
            Comparator::Gt,
            0.95,
            Severity::Informational,
        ),
        criterion(
            MetricSelector::RequestRate,
            Comparator::Gt,
            10.0,
            Severity::Required,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report() -> AggregateReport {
        AggregateReport {
            total_requests: 1_000,
            failed_requests: 0,
            request_rate: 50.0,
            latency_avg_ms: 80.0,
            latency_min_ms: 5.0,
            latency_max_ms: 400.0,
            latency_p50_ms: 70.0,
            latency_p95_ms: 200.0,
            latency_p99_ms: 350.0,
            success_rate: 1.0,
            error_rate: 0.0,
            messages_sent: 800,
            messages_failed: 0,
            bytes_received: 1 << 20,
            bytes_sent: 1 << 18,
            iterations: 1_000,
            run_duration: Duration::from_secs(20),
            req_per_sec_avg: 50.0,
            req_per_sec_stdev: 2.0,
            req_per_sec_max: 55.0,
        }
    }

    #[test]
    fn average_latency_ladder_uses_first_matching_bound() {
        let avg = MetricSelector::AvgLatencyMs;
        assert_eq!(avg.tier(90.0), Tier::Excellent);
        assert_eq!(avg.tier(100.0), Tier::Good);
        assert_eq!(avg.tier(250.0), Tier::Acceptable);
        assert_eq!(avg.tier(600.0), Tier::Poor);
    }

    #[test]
    fn percentile_and_rate_ladders() {
        let p95 = MetricSelector::P95LatencyMs;
        assert_eq!(p95.tier(400.0), Tier::Excellent);
        assert_eq!(p95.tier(800.0), Tier::Acceptable);
        assert_eq!(p95.tier(1200.0), Tier::Poor);

        let err = MetricSelector::ErrorRate;
        assert_eq!(err.tier(0.005), Tier::Excellent);
        assert_eq!(err.tier(0.03), Tier::Acceptable);
        assert_eq!(err.tier(0.10), Tier::Poor);

        let rate = MetricSelector::RequestRate;
        assert_eq!(rate.tier(150.0), Tier::Excellent);
        assert_eq!(rate.tier(60.0), Tier::Good);
        assert_eq!(rate.tier(20.0), Tier::Acceptable);
        assert_eq!(rate.tier(5.0), Tier::Poor);
    }

    #[test]
    fn comparators_observe_strictness() {
        assert!(Comparator::Lt.holds(1.0, 2.0));
        assert!(!Comparator::Lt.holds(2.0, 2.0));
        assert!(Comparator::Lte.holds(2.0, 2.0));
        assert!(Comparator::Gt.holds(3.0, 2.0));
        assert!(!Comparator::Gt.holds(2.0, 2.0));
        assert!(Comparator::Gte.holds(2.0, 2.0));
    }

    #[test]
    fn only_required_criteria_drive_the_overall_verdict() {
        let mut degraded = report();
        degraded.latency_avg_ms = 250.0;

        let assessment = assess(&degraded, &default_criteria());
        assert!(assessment.passed);

        let informational_miss = assessment
            .verdicts
            .iter()
            .find(|v| {
                v.criterion.metric == MetricSelector::AvgLatencyMs
                    && v.criterion.severity == Severity::Informational
            })
            .map(|v| v.passed);
        assert_eq!(informational_miss, Some(false));
    }

    #[test]
    fn failing_a_required_criterion_fails_the_run() {
        let mut degraded = report();
        degraded.latency_avg_ms = 600.0;

        let assessment = assess(&degraded, &default_criteria());
        assert!(!assessment.passed);

        let required_avg = assessment
            .verdicts
            .iter()
            .find(|v| {
                v.criterion.metric == MetricSelector::AvgLatencyMs
                    && v.criterion.severity == Severity::Required
            })
            .map(|v| (v.passed, v.tier));
        assert_eq!(required_avg, Some((false, Tier::Poor)));
    }

    #[test]
    fn healthy_report_passes_the_default_gate() {
        let assessment = assess(&report(), &default_criteria());
        assert!(assessment.passed);
        assert!(assessment.verdicts.iter().all(|v| v.passed));
    }
}
