use std::sync::Arc;
use std::time::Duration;

/// Periodic observation of a run in flight, emitted once per ticker
/// interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub tick: u64,
    pub elapsed: Duration,
    pub interval: Duration,
    pub vus: u64,
    pub requests_total: u64,
    pub failed_total: u64,
    pub iterations_total: u64,
    pub rps_now: f64,
    pub iterations_per_sec_now: f64,
    /// Wire throughput over the last interval, sent and received combined.
    pub bytes_per_sec_now: u64,
}

pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync + 'static>;
