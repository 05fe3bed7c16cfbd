use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Barrier, Notify};

use crate::HttpClient;

use super::exec;
use super::gate::IterationGate;
use super::scenario::WeightTable;
use super::setup::IterationContext;
use super::stats::RunMetrics;

#[derive(Debug)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        while !self.started.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Pause between iterations, drawn uniformly from `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

impl ThinkTime {
    pub fn is_zero(&self) -> bool {
        self.min.is_zero() && self.max.is_zero()
    }

    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        // An empty range collapses to the lower bound.
        if min_ms >= max_ms {
            return self.min;
        }
        Duration::from_millis(rand::random_range(min_ms..max_ms))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VuContext {
    pub vu_id: u64,
    pub client: Arc<HttpClient>,
    pub metrics: Arc<RunMetrics>,
    pub target: IterationContext,
    pub scenarios: WeightTable,
    pub think_time: ThinkTime,
    pub gate: Arc<IterationGate>,
    pub ready: Arc<Barrier>,
    pub start: Arc<StartSignal>,
}

/// One virtual user: wait for the synchronized start, then loop scenario
/// iterations until the gate refuses. An iteration is only counted once it
/// completes, think pause included.
pub(crate) async fn vu_loop(ctx: VuContext) {
    ctx.ready.wait().await;
    ctx.start.wait().await;

    let mut iteration: u64 = 0;
    while ctx.gate.next() {
        let started = Instant::now();

        let draw = rand::random_range(0.0..1.0);
        let kind = ctx.scenarios.select(draw);
        exec::run_scenario(
            kind,
            &ctx.client,
            &ctx.target,
            &ctx.metrics,
            ctx.vu_id,
            iteration,
        )
        .await;

        if !ctx.think_time.is_zero() {
            tokio::time::sleep(ctx.think_time.sample()).await;
        }

        ctx.metrics.record_iteration(started.elapsed());
        iteration += 1;
    }
}
