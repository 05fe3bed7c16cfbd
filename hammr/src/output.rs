use hammr_core::runner::{Assessment, ProgressFn, RunSummary};

use crate::cli::{OutputFormat, RunArgs};

mod human;
mod json;

pub(crate) use json::summary_document;

/// Everything the reporting phase consumes once the run has finished.
pub(crate) struct RunOutcome {
    pub summary: RunSummary,
    pub assessment: Assessment,
    pub vus: u64,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, args: &RunArgs);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, outcome: &RunOutcome) -> anyhow::Result<()>;
}

pub(crate) fn formatter(args: &RunArgs) -> Box<dyn OutputFormatter> {
    match args.output {
        OutputFormat::HumanReadable => {
            // An iteration cap makes the total duration unknowable up front,
            // so the progress bar degrades to a spinner.
            let total = args.iterations.is_none().then_some(args.duration);
            Box::new(human::HumanReadableOutput::new(total))
        }
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
