use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

mod duration;
mod format;
mod progress;
mod summary;

use duration::format_duration;
use format::{format_bytes, format_rate};
use progress::HumanProgress;
use summary::render;

use super::{OutputFormatter, RunOutcome};
use crate::cli::RunArgs;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new(total: Option<Duration>) -> Self {
        Self {
            progress: Arc::new(HumanProgress::new(total)),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, args: &RunArgs) {
        let rule = "=".repeat(80);
        println!("{rule}");
        println!("{:^80}", "CHAT API PERFORMANCE TEST");
        println!("{rule}");
        println!("Base URL:          {}", args.base_url);
        println!("Test User:         {}", args.username);
        println!("Conversation ID:   {}", args.conversation_id);
        println!("Virtual Users:     {}", args.vus);
        match args.iterations {
            Some(n) => println!("Iterations:        {n}"),
            None => println!("Duration:          {}", format_duration(args.duration)),
        }
        println!("{rule}");
        println!();
    }

    fn progress(&self) -> Option<hammr_core::runner::ProgressFn> {
        let progress = self.progress.clone();
        let prev_failed = Arc::new(AtomicU64::new(0));

        Some(Arc::new(move |u| {
            let failed_delta = u
                .failed_total
                .saturating_sub(prev_failed.swap(u.failed_total, Ordering::Relaxed));

            let message = format!(
                "vus={} elapsed={} rps={} iters/s={} tps={}/s errors={failed_delta}/{}",
                u.vus,
                format_duration(u.elapsed),
                format_rate(u.rps_now),
                format_rate(u.iterations_per_sec_now),
                format_bytes(u.bytes_per_sec_now),
                u.failed_total
            );

            progress.update(u.elapsed, message);
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome) -> anyhow::Result<()> {
        self.progress.finish();
        print!(
            "{}",
            render(&outcome.summary.report, &outcome.assessment, outcome.vus)
        );
        Ok(())
    }
}
