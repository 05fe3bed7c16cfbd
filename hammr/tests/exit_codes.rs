use std::process::Command;

use anyhow::Context as _;
use hammr_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = Command::new(exe)
        .arg("run")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run hammr binary")?;

    anyhow::ensure!(
        status_code(out.status) == 30,
        "expected exit code 30, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[test]
fn zero_vus_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = Command::new(exe)
        .arg("run")
        .arg("--vus")
        .arg("0")
        .arg("--no-summary-file")
        .output()
        .context("run hammr binary")?;

    anyhow::ensure!(
        status_code(out.status) == 30,
        "expected exit code 30, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn rejected_login_exit_20() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.faults().set_reject_logins(true);
    let base_url = server.base_url().to_string();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--iterations")
            .arg("1")
            .arg("--no-summary-file")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 20,
        "expected exit code 20, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn criteria_failure_exit_10() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.faults().set_fail_message_creates(true);
    let base_url = server.base_url().to_string();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("4")
            .arg("--iterations")
            .arg("20")
            .arg("--think-time-min")
            .arg("0s")
            .arg("--think-time-max")
            .arg("0s")
            .arg("--no-summary-file")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 10,
        "expected exit code 10, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn healthy_run_exit_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();
    let exe = env!("CARGO_BIN_EXE_hammr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("4")
            .arg("--iterations")
            .arg("20")
            .arg("--think-time-min")
            .arg("0s")
            .arg("--think-time-max")
            .arg("0s")
            .arg("--no-summary-file")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run hammr binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 0,
        "expected exit code 0, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}
