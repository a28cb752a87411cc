use std::process::{Command, Output};

use anyhow::Context as _;
use botload_testserver::{Behavior, TestServer};
use serde_json::Value;

fn status_code(out: &Output) -> i32 {
    out.status.code().unwrap_or(-1)
}

fn botload() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_botload"));
    for var in [
        "BOTLOAD_CONFIG",
        "BOTLOAD_BOT_URL",
        "BOTLOAD_API_METHOD",
        "BOTLOAD_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn describe(out: &Output) -> String {
    format!(
        "exit code {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

async fn run_json(bot_url: String, extra: &'static [&'static str]) -> anyhow::Result<Output> {
    tokio::task::spawn_blocking(move || {
        botload()
            .args(["run", "--chat-id", "42", "--message", "hello"])
            .args(["--bot-url", &bot_url, "--delay", "0ms", "--output", "json"])
            .args(extra)
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run botload binary")
}

fn summary_line(out: &Output) -> anyhow::Result<Value> {
    let stdout = String::from_utf8_lossy(&out.stdout);
    let last = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .context("no output")?;
    let v: Value = serde_json::from_str(last).context("summary line is not JSON")?;
    anyhow::ensure!(v["kind"] == "summary", "last line is not a summary: {last}");
    Ok(v)
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = botload().arg("--help").output().context("run botload binary")?;
    anyhow::ensure!(status_code(&out) == 0, "{}", describe(&out));
    Ok(())
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = botload()
        .args(["run", "--chat-id", "1", "--message", "m", "--delay", "10x"])
        .output()
        .context("run botload binary")?;

    anyhow::ensure!(status_code(&out) == 30, "{}", describe(&out));
    Ok(())
}

#[test]
fn missing_bot_url_exits_30() -> anyhow::Result<()> {
    let out = botload()
        .args(["run", "--chat-id", "1", "--message", "m"])
        .output()
        .context("run botload binary")?;

    anyhow::ensure!(status_code(&out) == 30, "{}", describe(&out));
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("botUrl"),
        "{}",
        describe(&out)
    );
    Ok(())
}

#[test]
fn oversized_thread_count_exits_30() -> anyhow::Result<()> {
    let out = botload()
        .args(["run", "--chat-id", "1", "--message", "m"])
        .args(["--bot-url", "http://127.0.0.1:1/bot", "--threads", "4294967295"])
        .output()
        .context("run botload binary")?;

    anyhow::ensure!(status_code(&out) == 30, "{}", describe(&out));
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("threadCount"),
        "{}",
        describe(&out)
    );
    Ok(())
}

#[test]
fn unreadable_config_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("botload.yaml");
    std::fs::write(&path, "threadCount: lots\n").context("write config")?;

    let out = botload()
        .arg("--config")
        .arg(&path)
        .args(["run", "--chat-id", "1", "--message", "m"])
        .output()
        .context("run botload binary")?;

    anyhow::ensure!(status_code(&out) == 30, "{}", describe(&out));
    Ok(())
}

#[tokio::test]
async fn successful_run_exits_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let out = run_json(
        server.bot_url().to_string(),
        &["--threads", "2", "--requests", "3"],
    )
    .await?;
    let messages = server.stats().messages_total();
    server.shutdown().await;

    anyhow::ensure!(status_code(&out) == 0, "{}", describe(&out));
    anyhow::ensure!(messages == 6, "expected 6 messages, got {messages}");

    let summary = summary_line(&out)?;
    anyhow::ensure!(summary["status"] == "COMPLETED", "{summary}");
    anyhow::ensure!(summary["successfulRequests"] == 6, "{summary}");
    anyhow::ensure!(summary["failedRequests"] == 0, "{summary}");
    Ok(())
}

#[tokio::test]
async fn failed_requests_exit_10() -> anyhow::Result<()> {
    let server = TestServer::start_with(Behavior::failing_every(2))
        .await
        .context("start test server")?;

    let out = run_json(
        server.bot_url().to_string(),
        &["--threads", "1", "--requests", "4"],
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(status_code(&out) == 10, "{}", describe(&out));

    let summary = summary_line(&out)?;
    anyhow::ensure!(summary["successfulRequests"] == 2, "{summary}");
    anyhow::ensure!(summary["failedRequests"] == 2, "{summary}");
    anyhow::ensure!(
        summary["failures"].as_array().map(Vec::len) == Some(2),
        "{summary}"
    );
    Ok(())
}

#[tokio::test]
async fn config_file_supplies_defaults() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let dir = tempfile::tempdir().context("tempdir")?;
    let path = dir.path().join("botload.yaml");
    std::fs::write(
        &path,
        format!(
            "botUrl: {}\nthreadCount: 3\nrequestsPerThread: 2\ndelayBetweenRequests: 0ms\n",
            server.bot_url()
        ),
    )
    .context("write config")?;

    let out = tokio::task::spawn_blocking(move || {
        botload()
            .arg("--config")
            .arg(&path)
            .args(["run", "--chat-id", "7", "--message", "cfg", "--output", "json"])
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run botload binary")?;
    let messages = server.stats().messages_total();
    server.shutdown().await;

    anyhow::ensure!(status_code(&out) == 0, "{}", describe(&out));
    anyhow::ensure!(messages == 6, "expected 6 messages, got {messages}");

    let summary = summary_line(&out)?;
    anyhow::ensure!(summary["configuration"]["threadCount"] == 3, "{summary}");
    Ok(())
}
