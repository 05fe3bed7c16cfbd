use std::process::Command;

use anyhow::Context as _;
use hammr_testserver::TestServer;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Totals {
    virtual_users: u64,
    requests_total: u64,
    failed_requests_total: u64,
    iterations_total: u64,
    messages_sent_total: u64,
    run_duration_secs: f64,
}

#[derive(Debug, Deserialize)]
struct Latency {
    avg: f64,
    p95: f64,
}

#[derive(Debug, Deserialize)]
struct VerdictLine {
    passed: bool,
}

#[derive(Debug, Deserialize)]
struct SummaryDocument {
    totals: Totals,
    latency_ms: Latency,
    passed: bool,
    verdicts: Vec<VerdictLine>,
}

#[derive(Debug, Deserialize)]
struct ConfigLine {
    vus: u64,
    duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProgressLine {
    tick: u64,
    elapsed_secs: f64,
    total_requests: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum JsonLine {
    #[serde(rename = "config")]
    Config(ConfigLine),

    #[serde(rename = "progress")]
    Progress(ProgressLine),

    #[serde(rename = "summary")]
    Summary(SummaryDocument),
}

#[tokio::test]
async fn summary_file_reflects_run_totals() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();

    let dir = tempfile::tempdir().context("create temp dir")?;
    let summary_path = dir.path().join("runs/summary.json");
    let summary_arg = summary_path.clone();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("4")
            .arg("--iterations")
            .arg("24")
            .arg("--think-time-min")
            .arg("0s")
            .arg("--think-time-max")
            .arg("0s")
            .arg("--summary-out")
            .arg(&summary_arg)
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    let messages_created = server.stats().messages_created();
    let server_seen = server.stats().messages_created()
        + server.stats().messages_listed()
        + server.stats().conversations_listed()
        + server.stats().conversations_fetched();
    server.shutdown().await;

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();

    anyhow::ensure!(
        out.status.success(),
        "hammr exited with {}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        out.status
    );

    let body = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("read summary file: {}", summary_path.display()))?;
    let doc: SummaryDocument = serde_json::from_str(&body)
        .with_context(|| format!("parse summary file:\n{body}"))?;

    anyhow::ensure!(
        doc.totals.virtual_users == 4,
        "expected 4 virtual users, got {}",
        doc.totals.virtual_users
    );
    anyhow::ensure!(
        doc.totals.iterations_total == 24,
        "expected 24 iterations, got {}",
        doc.totals.iterations_total
    );
    anyhow::ensure!(
        doc.totals.requests_total == 24 && doc.totals.failed_requests_total == 0,
        "unexpected request totals: {} total, {} failed\nstdout:\n{stdout}\nstderr:\n{stderr}",
        doc.totals.requests_total,
        doc.totals.failed_requests_total
    );
    anyhow::ensure!(
        doc.totals.requests_total == server_seen,
        "summary totals disagree with server counters: {} vs {server_seen}",
        doc.totals.requests_total
    );
    anyhow::ensure!(
        doc.totals.messages_sent_total == messages_created,
        "messages sent disagrees with server: {} vs {messages_created}",
        doc.totals.messages_sent_total
    );
    anyhow::ensure!(
        doc.totals.run_duration_secs > 0.0,
        "expected a positive run duration"
    );
    anyhow::ensure!(
        doc.latency_ms.avg > 0.0 && doc.latency_ms.p95 > 0.0,
        "implausible latency stats: avg={} p95={}",
        doc.latency_ms.avg,
        doc.latency_ms.p95
    );
    anyhow::ensure!(doc.passed, "expected a passing run against the local server");
    anyhow::ensure!(
        !doc.verdicts.is_empty() && doc.verdicts.iter().all(|v| v.passed),
        "expected every default criterion to pass\n{body}"
    );

    Ok(())
}

#[tokio::test]
async fn human_output_renders_banner_and_report() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("2")
            .arg("--iterations")
            .arg("10")
            .arg("--think-time-min")
            .arg("0s")
            .arg("--think-time-max")
            .arg("0s")
            .arg("--no-summary-file")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    server.shutdown().await;

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();

    anyhow::ensure!(
        out.status.success(),
        "hammr exited with {}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        out.status
    );
    anyhow::ensure!(
        stdout.contains("CHAT API PERFORMANCE TEST"),
        "missing banner\nstdout:\n{stdout}"
    );
    anyhow::ensure!(
        stdout.contains("PERFORMANCE TEST RESULTS"),
        "missing report box\nstdout:\n{stdout}"
    );
    anyhow::ensure!(
        stdout.contains("OVERALL: ALL PERFORMANCE CRITERIA MET!"),
        "missing overall verdict\nstdout:\n{stdout}"
    );

    Ok(())
}

#[tokio::test]
async fn json_duration_run_emits_ndjson() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("2")
            .arg("--duration")
            .arg("2s")
            .arg("--think-time-min")
            .arg("10ms")
            .arg("--think-time-max")
            .arg("20ms")
            .arg("--no-summary-file")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    server.shutdown().await;

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();

    anyhow::ensure!(
        out.status.success(),
        "hammr exited with {}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        out.status
    );

    let mut config: Option<ConfigLine> = None;
    let mut progress: Vec<ProgressLine> = Vec::new();
    let mut summary: Option<SummaryDocument> = None;

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: JsonLine = serde_json::from_str(line)
            .with_context(|| format!("failed to parse json line: {line}"))?;
        match parsed {
            JsonLine::Config(c) => {
                anyhow::ensure!(config.is_none(), "duplicate config line\nstdout:\n{stdout}");
                anyhow::ensure!(
                    progress.is_empty() && summary.is_none(),
                    "config line must come first\nstdout:\n{stdout}"
                );
                config = Some(c);
            }
            JsonLine::Progress(p) => progress.push(p),
            JsonLine::Summary(s) => {
                anyhow::ensure!(summary.is_none(), "duplicate summary line\nstdout:\n{stdout}");
                summary = Some(s);
            }
        }
    }

    let config = config.context("expected a config line")?;
    anyhow::ensure!(config.vus == 2, "unexpected vus in config: {}", config.vus);
    let duration_secs = config.duration_secs.context("expected duration in config")?;
    anyhow::ensure!(
        (duration_secs - 2.0).abs() < f64::EPSILON,
        "unexpected duration in config: {duration_secs}"
    );

    anyhow::ensure!(
        !progress.is_empty(),
        "expected at least one progress line\nstdout:\n{stdout}\nstderr:\n{stderr}"
    );
    let mut prev_tick = 0;
    let mut prev_total = 0;
    for p in &progress {
        anyhow::ensure!(
            p.tick > prev_tick && p.total_requests >= prev_total && p.elapsed_secs > 0.0,
            "progress lines out of order\nstdout:\n{stdout}"
        );
        prev_tick = p.tick;
        prev_total = p.total_requests;
    }

    let summary = summary.context("expected a summary line")?;
    anyhow::ensure!(
        summary.totals.requests_total >= prev_total,
        "summary totals behind last progress tick: {} < {prev_total}",
        summary.totals.requests_total
    );
    anyhow::ensure!(
        summary.totals.requests_total > 0 && summary.totals.iterations_total > 0,
        "expected a non-empty run\nstdout:\n{stdout}"
    );

    Ok(())
}
