use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Barrier;
use tokio::time::MissedTickBehavior;

use crate::HttpClient;

use super::error::{Error, Result};
use super::gate::IterationGate;
use super::metrics::MetricSeriesSummary;
use super::progress::{ProgressFn, ProgressSnapshot};
use super::scenario::WeightTable;
use super::setup::IterationContext;
use super::stats::{AggregateReport, RunMetrics};
use super::vu::{StartSignal, ThinkTime, VuContext, vu_loop};

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub vus: u64,
    pub duration: Option<Duration>,
    pub iterations: Option<u64>,
    /// Extra time granted after the duration expires for in-flight
    /// iterations to finish before they are abandoned.
    pub graceful_stop: Duration,
    pub think_time: ThinkTime,
    pub scenarios: WeightTable,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            vus: 50,
            duration: Some(Duration::from_secs(300)),
            iterations: None,
            graceful_stop: Duration::from_secs(30),
            think_time: ThinkTime::default(),
            scenarios: WeightTable::default(),
        }
    }
}

impl LoadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vus == 0 {
            return Err(Error::InvalidVus);
        }
        if self.iterations == Some(0) {
            return Err(Error::InvalidIterations);
        }
        if self.duration.is_none() && self.iterations.is_none() {
            return Err(Error::MissingStopCondition);
        }
        if self.think_time.min > self.think_time.max {
            return Err(Error::InvalidThinkTime);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub report: AggregateReport,
    pub metrics: Vec<MetricSeriesSummary>,
}

/// Drives a full load run: spawn workers, hold them at a barrier, release
/// them together, and aggregate once they have quiesced.
pub async fn run_load(
    client: Arc<HttpClient>,
    target: IterationContext,
    config: LoadConfig,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    config.validate()?;

    let metrics = Arc::new(RunMetrics::default());
    let gate = Arc::new(IterationGate::new(config.iterations, config.duration));
    let start: Arc<StartSignal> = Arc::new(StartSignal::new());

    let total_vus = config.vus.min(usize::MAX as u64) as usize;
    let ready: Arc<Barrier> = Arc::new(Barrier::new(total_vus.saturating_add(1)));

    let mut handles = Vec::with_capacity(total_vus);
    for vu_id in 1..=config.vus {
        let ctx = VuContext {
            vu_id,
            client: client.clone(),
            metrics: metrics.clone(),
            target: target.clone(),
            scenarios: config.scenarios.clone(),
            think_time: config.think_time,
            gate: gate.clone(),
            ready: ready.clone(),
            start: start.clone(),
        };
        handles.push(tokio::spawn(vu_loop(ctx)));
    }

    // Hold every worker at the barrier so spawn cost stays out of the
    // measured window, then release them together.
    ready.wait().await;

    let started = Instant::now();
    gate.open_at(started);
    start.start();

    tracing::info!(
        vus = config.vus,
        duration = ?config.duration,
        iterations = ?config.iterations,
        "run started"
    );

    let ticker = spawn_ticker(metrics.clone(), progress, config.vus, started);

    let deadline = config
        .duration
        .map(|d| started + d + config.graceful_stop);
    let joined = drain_workers(&mut handles, deadline).await;

    ticker.abort();
    let _ = ticker.await;

    if joined? {
        tracing::warn!(
            graceful_stop = ?config.graceful_stop,
            "graceful stop expired; abandoned in-flight iterations"
        );
    }

    let summary = RunSummary {
        report: metrics.aggregate(started.elapsed()),
        metrics: metrics.series(),
    };

    tracing::info!(
        requests = summary.report.total_requests,
        failed = summary.report.failed_requests,
        iterations = summary.report.iterations,
        "run complete"
    );

    Ok(summary)
}

/// Joins every worker, bounded by the graceful-stop deadline when one is
/// set. Returns whether workers had to be abandoned.
async fn drain_workers(
    handles: &mut [tokio::task::JoinHandle<()>],
    deadline: Option<Instant>,
) -> Result<bool> {
    // Joined handles must not be polled again, so track how far we got.
    let mut drained = 0usize;

    let timed_out = match deadline {
        Some(at) => {
            let drain = async {
                while drained < handles.len() {
                    (&mut handles[drained]).await?;
                    drained += 1;
                }
                Ok::<(), Error>(())
            };
            match tokio::time::timeout_at(tokio::time::Instant::from_std(at), drain).await {
                Ok(joined) => {
                    joined?;
                    false
                }
                Err(_) => true,
            }
        }
        None => {
            while drained < handles.len() {
                (&mut handles[drained]).await?;
                drained += 1;
            }
            false
        }
    };

    if timed_out {
        for handle in handles[drained..].iter() {
            handle.abort();
        }
        for handle in handles[drained..].iter_mut() {
            let _ = handle.await;
        }
    }

    Ok(timed_out)
}

fn spawn_ticker(
    metrics: Arc<RunMetrics>,
    progress: Option<ProgressFn>,
    vus: u64,
    started: Instant,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let tick_every = Duration::from_secs(1);
        let mut interval = tokio::time::interval(tick_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so every delta
        // spans a full interval.
        interval.tick().await;

        let mut tick: u64 = 0;
        let mut last_at = Instant::now();
        let mut last_requests = metrics.requests_total();
        let mut last_iterations = metrics.iterations_total();
        let mut last_bytes = metrics.bytes_total();

        loop {
            interval.tick().await;

            tick = tick.saturating_add(1);
            let now = Instant::now();
            let dt = now.duration_since(last_at).as_secs_f64().max(1e-9);
            last_at = now;

            let requests_total = metrics.requests_total();
            let rps_now = requests_total.saturating_sub(last_requests) as f64 / dt;
            last_requests = requests_total;

            let iterations_total = metrics.iterations_total();
            let iterations_per_sec_now =
                iterations_total.saturating_sub(last_iterations) as f64 / dt;
            last_iterations = iterations_total;

            let bytes_total = metrics.bytes_total();
            let bytes_per_sec_now =
                (bytes_total.saturating_sub(last_bytes) as f64 / dt).round() as u64;
            last_bytes = bytes_total;

            metrics.record_rps_sample(rps_now);

            if let Some(progress) = &progress {
                (progress)(ProgressSnapshot {
                    tick,
                    elapsed: started.elapsed(),
                    interval: tick_every,
                    vus,
                    requests_total,
                    failed_total: metrics.failed_total(),
                    iterations_total,
                    rps_now,
                    iterations_per_sec_now,
                    bytes_per_sec_now,
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> IterationContext {
        IterationContext::new("http://localhost:1", "token", "1", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn zero_vus_is_rejected() {
        let config = LoadConfig {
            vus: 0,
            iterations: Some(1),
            ..LoadConfig::default()
        };
        let res = run_load(Arc::new(HttpClient::default()), target(), config, None).await;
        assert!(matches!(res, Err(Error::InvalidVus)));
    }

    #[tokio::test]
    async fn zero_iterations_is_rejected() {
        let config = LoadConfig {
            iterations: Some(0),
            ..LoadConfig::default()
        };
        let res = run_load(Arc::new(HttpClient::default()), target(), config, None).await;
        assert!(matches!(res, Err(Error::InvalidIterations)));
    }

    #[tokio::test]
    async fn a_stop_condition_is_required() {
        let config = LoadConfig {
            duration: None,
            iterations: None,
            ..LoadConfig::default()
        };
        let res = run_load(Arc::new(HttpClient::default()), target(), config, None).await;
        assert!(matches!(res, Err(Error::MissingStopCondition)));
    }

    #[tokio::test]
    async fn inverted_think_time_is_rejected() {
        let config = LoadConfig {
            iterations: Some(1),
            think_time: ThinkTime {
                min: Duration::from_secs(3),
                max: Duration::from_secs(1),
            },
            ..LoadConfig::default()
        };
        let res = run_load(Arc::new(HttpClient::default()), target(), config, None).await;
        assert!(matches!(res, Err(Error::InvalidThinkTime)));
    }
}
