use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    let unit = unit_str.trim();
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "us" | "usec" | "usecs" | "microsecond" | "microseconds" => {
            Ok(Duration::from_micros(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report with a live progress bar.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "hammr",
    author,
    version,
    about = "Load-test harness for the chat API",
    long_about = "hammr drives a chat API with a configurable number of virtual users.\n\nEach virtual user logs in once, then loops a weighted mix of chat operations (send message, list messages, list conversations, fetch one conversation) with think time between iterations, while latency, error-rate and throughput metrics are recorded.",
    after_help = "Examples:\n  hammr run --base-url http://localhost:8080\n  hammr run --vus 100 --duration 10m\n  hammr run --iterations 1000 --think-time-min 0s --think-time-max 0s --output json\n\nDocs: https://github.com/hammr-dev/hammr"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against a chat API
    #[command(
        long_about = "Log in against the target API, then run the configured number of virtual users until the duration elapses or the iteration budget is spent.\n\nThe run ends with a threshold assessment; exit code 10 means the run finished but missed at least one required threshold."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Base URL of the target API
    #[arg(long, env = "HAMMR_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Username to authenticate with
    #[arg(long, default_value = "user1")]
    pub username: String,

    /// Password to authenticate with
    #[arg(long, default_value = "password")]
    pub password: String,

    /// Conversation to exercise
    #[arg(long, default_value = "1")]
    pub conversation_id: String,

    /// Number of virtual users
    #[arg(long, default_value_t = 50)]
    pub vus: u64,

    /// Test duration (e.g. 10s, 250ms, 5m)
    #[arg(long, value_parser = parse_duration, default_value = "5m")]
    pub duration: Duration,

    /// Stop after this many iterations across all virtual users (overrides --duration)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Extra time in-flight iterations get to finish after the duration elapses
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub graceful_stop: Duration,

    /// Minimum think time between iterations
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub think_time_min: Duration,

    /// Maximum think time between iterations
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    pub think_time_max: Duration,

    /// Per-request timeout
    #[arg(long, value_parser = parse_duration, default_value = "10s")]
    pub request_timeout: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Where to write the JSON summary (defaults to performance-test-<vus>vu-summary.json)
    #[arg(long, value_name = "PATH")]
    pub summary_out: Option<PathBuf>,

    /// Skip writing the JSON summary file
    #[arg(long)]
    pub no_summary_file: bool,
}
