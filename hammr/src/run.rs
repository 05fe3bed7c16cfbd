use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use hammr_core::HttpClient;
use hammr_core::runner::{
    Credentials, IterationContext, LoadConfig, ThinkTime, WeightTable, assess, authenticate,
    default_criteria, run_load,
};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, RunOutcome};
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let config = load_config(&args);
    config
        .validate()
        .map_err(|err| RunError::InvalidInput(anyhow::Error::new(err)))?;

    let out = output::formatter(&args);
    out.print_header(&args);

    let client = Arc::new(HttpClient::new(Some(args.request_timeout)));
    let credentials = Credentials {
        username: args.username.clone(),
        password: args.password.clone(),
    };

    let token = authenticate(&client, &args.base_url, &credentials)
        .await
        .map_err(|err| {
            RunError::SetupFailed(anyhow::Error::new(err).context("login against target failed"))
        })?;

    let target = IterationContext::new(
        &args.base_url,
        &token,
        &args.conversation_id,
        args.request_timeout,
    );

    let summary = run_load(Arc::clone(&client), target, config, out.progress())
        .await
        .map_err(classify_run_error)?;

    let assessment = assess(&summary.report, &default_criteria());
    let outcome = RunOutcome {
        summary,
        assessment,
        vus: args.vus,
    };

    // The report always renders, even for a failing run; the verdict is
    // carried by the exit code.
    out.print_summary(&outcome).map_err(RunError::RuntimeError)?;

    if !args.no_summary_file {
        write_summary_file(&args, &outcome)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::from_assessment(&outcome.assessment))
}

fn load_config(args: &RunArgs) -> LoadConfig {
    LoadConfig {
        vus: args.vus,
        duration: args.iterations.is_none().then_some(args.duration),
        iterations: args.iterations,
        graceful_stop: args.graceful_stop,
        think_time: ThinkTime {
            min: args.think_time_min,
            max: args.think_time_max,
        },
        scenarios: WeightTable::default(),
    }
}

fn classify_run_error(err: hammr_core::runner::Error) -> RunError {
    use hammr_core::runner::Error as CoreError;

    let invalid = matches!(
        err,
        CoreError::InvalidVus
            | CoreError::InvalidIterations
            | CoreError::InvalidThinkTime
            | CoreError::MissingStopCondition
    );
    if invalid {
        RunError::InvalidInput(anyhow::Error::new(err))
    } else {
        RunError::RuntimeError(anyhow::Error::new(err).context("load run failed"))
    }
}

fn summary_path(args: &RunArgs) -> PathBuf {
    args.summary_out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("performance-test-{}vu-summary.json", args.vus)))
}

async fn write_summary_file(args: &RunArgs, outcome: &RunOutcome) -> anyhow::Result<()> {
    let path = summary_path(args);
    let doc = output::summary_document(outcome);
    let body = serde_json::to_vec_pretty(&doc).context("serialize summary document")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create summary dir: {}", parent.display()))?;
    }
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write summary file: {}", path.display()))?;

    tracing::info!(path = %path.display(), "summary file written");
    Ok(())
}
