use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use hammr_core::HttpClient;
use hammr_core::runner::{
    Credentials, IterationContext, LoadConfig, ProgressFn, ProgressSnapshot, ScenarioKind,
    ScenarioWeight, SetupError, ThinkTime, WeightTable, assess, authenticate, default_criteria,
    run_load,
};
use hammr_testserver::TestServer;

fn credentials() -> Credentials {
    Credentials {
        username: "user1".to_string(),
        password: "password".to_string(),
    }
}

async fn login_context(
    client: &HttpClient,
    server: &TestServer,
) -> anyhow::Result<IterationContext> {
    let token = authenticate(client, server.base_url(), &credentials())
        .await
        .context("login against test server")?;
    Ok(IterationContext::new(
        server.base_url(),
        &token,
        "1",
        Duration::from_secs(5),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn iteration_budget_produces_exact_totals() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let client = Arc::new(HttpClient::new(Some(Duration::from_secs(5))));
    let target = login_context(&client, &server).await?;

    let config = LoadConfig {
        vus: 4,
        duration: None,
        iterations: Some(24),
        graceful_stop: Duration::from_secs(5),
        think_time: ThinkTime {
            min: Duration::ZERO,
            max: Duration::ZERO,
        },
        ..LoadConfig::default()
    };

    let summary = run_load(Arc::clone(&client), target, config, None)
        .await
        .context("run load")?;
    let report = &summary.report;

    assert_eq!(report.iterations, 24);
    assert_eq!(report.total_requests, 24);
    assert_eq!(report.failed_requests, 0);
    assert!((report.success_rate - 1.0).abs() < f64::EPSILON);
    assert!(report.error_rate.abs() < f64::EPSILON);
    assert!(report.bytes_sent > 0);
    assert!(report.bytes_received > 0);
    assert!(report.latency_avg_ms > 0.0);
    assert!(report.latency_p95_ms >= report.latency_p50_ms);

    let stats = server.stats();
    assert_eq!(stats.logins(), 1);
    assert_eq!(stats.unauthorized(), 0);
    let server_seen = stats.messages_created()
        + stats.messages_listed()
        + stats.conversations_listed()
        + stats.conversations_fetched();
    assert_eq!(server_seen, 24);
    assert_eq!(report.messages_sent, stats.messages_created());

    let durations = summary
        .metrics
        .iter()
        .find(|series| series.name == "http_req_duration")
        .context("http_req_duration series in summary")?;
    match &durations.values {
        hammr_core::runner::MetricValues::Trend { count, .. } => assert_eq!(*count, 24),
        other => panic!("expected trend values, got {other:?}"),
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn message_create_faults_surface_as_errors() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.faults().set_fail_message_creates(true);

    let client = Arc::new(HttpClient::new(Some(Duration::from_secs(5))));
    let target = login_context(&client, &server).await?;

    let scenarios = WeightTable::new(vec![ScenarioWeight {
        kind: ScenarioKind::SendMessage,
        weight: 1.0,
    }])
    .context("single-scenario weight table")?;

    let config = LoadConfig {
        vus: 2,
        duration: None,
        iterations: Some(10),
        graceful_stop: Duration::from_secs(5),
        think_time: ThinkTime {
            min: Duration::ZERO,
            max: Duration::ZERO,
        },
        scenarios,
    };

    let summary = run_load(Arc::clone(&client), target, config, None)
        .await
        .context("run load")?;
    let report = &summary.report;

    assert_eq!(report.total_requests, 10);
    assert_eq!(report.failed_requests, 10);
    assert_eq!(report.messages_sent, 0);
    assert_eq!(report.messages_failed, 10);
    assert!((report.error_rate - 1.0).abs() < f64::EPSILON);
    assert!(report.success_rate.abs() < f64::EPSILON);
    assert_eq!(server.stats().messages_created(), 0);

    let assessment = assess(report, &default_criteria());
    assert!(!assessment.passed);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_login_reports_status() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.faults().set_reject_logins(true);

    let client = HttpClient::new(Some(Duration::from_secs(5)));
    let err = match authenticate(&client, server.base_url(), &credentials()).await {
        Ok(token) => panic!("expected rejected login, got token {token}"),
        Err(err) => err,
    };

    match err {
        SetupError::Rejected { status, .. } => assert_eq!(status, 401),
        other => panic!("expected rejected login, got {other}"),
    }

    assert_eq!(server.stats().logins(), 1);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn duration_budget_stops_the_run_and_ticks_progress() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let client = Arc::new(HttpClient::new(Some(Duration::from_secs(5))));
    let target = login_context(&client, &server).await?;

    let config = LoadConfig {
        vus: 2,
        duration: Some(Duration::from_millis(2200)),
        iterations: None,
        graceful_stop: Duration::from_secs(5),
        think_time: ThinkTime {
            min: Duration::ZERO,
            max: Duration::ZERO,
        },
        ..LoadConfig::default()
    };

    let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let progress: ProgressFn = Arc::new(move |snapshot: ProgressSnapshot| {
        sink.lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(snapshot);
    });

    let summary = run_load(Arc::clone(&client), target, config, Some(progress))
        .await
        .context("run load")?;
    let report = &summary.report;

    assert!(report.iterations > 0);
    assert!(report.run_duration >= Duration::from_millis(2200));
    assert_eq!(report.total_requests, report.iterations);

    let stats = server.stats();
    let server_seen = stats.messages_created()
        + stats.messages_listed()
        + stats.conversations_listed()
        + stats.conversations_fetched();
    assert_eq!(server_seen, report.total_requests);

    let snapshots = snapshots.lock().unwrap_or_else(|p| p.into_inner());
    assert!(
        !snapshots.is_empty(),
        "expected at least one progress tick for a 2.2s run"
    );
    let mut prev_tick = 0;
    for snapshot in snapshots.iter() {
        assert!(snapshot.tick > prev_tick);
        prev_tick = snapshot.tick;
        assert_eq!(snapshot.vus, 2);
        let interval = snapshot.interval.as_secs_f64();
        assert!(
            (0.5..=2.0).contains(&interval),
            "unexpected tick interval {interval}"
        );
    }

    server.shutdown().await;
    Ok(())
}
