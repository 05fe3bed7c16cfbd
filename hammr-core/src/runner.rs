mod assess;
mod error;
mod exec;
mod gate;
mod metrics;
mod progress;
mod run;
mod scenario;
mod setup;
mod stats;
mod vu;

pub use assess::{
    Assessment, Comparator, MetricSelector, Severity, ThresholdCriterion, Tier, Verdict, assess,
    default_criteria,
};
pub use error::{Error, Result};
pub use gate::IterationGate;
pub use metrics::{
    GaugeGuard, MetricHandle, MetricKind, MetricSeriesSummary, MetricValues, MetricsRegistry,
    TrendStats,
};
pub use progress::{ProgressFn, ProgressSnapshot};
pub use run::{LoadConfig, RunSummary, run_load};
pub use scenario::{ScenarioKind, ScenarioWeight, WEIGHT_SUM_EPSILON, WeightError, WeightTable};
pub use setup::{Credentials, IterationContext, SetupError, authenticate};
pub use stats::{AggregateReport, MetricSample, Outcome, RunMetrics};
pub use vu::{StartSignal, ThinkTime};
