use std::process::Command;

use anyhow::Context as _;
use llmbench_testserver::TestServer;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line {
    Progress {
        phase: String,
        completed: usize,
        total: usize,
        status: String,
    },
    Summary {
        total_requests: u64,
        success: u64,
        failure: u64,
        ttft_ms: Option<Stats>,
        latency_ms: Option<Stats>,
        throughput: Option<Throughput>,
        ttft_distribution_ms: Vec<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct Stats {
    p50: f64,
    p99: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct Throughput {
    unit: String,
    total: u64,
    per_sec: f64,
}

#[derive(Debug, Deserialize)]
struct Row {
    request_id: String,
    status: String,
    ttft_ms: Option<f64>,
    latency_ms: f64,
    out_tokens: Option<u64>,
    out_chars: u64,
    provider: String,
}

#[tokio::test]
async fn e2e_json_run_against_test_server() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let url = server.urls().chat_with("chunks=3&delay_ms=2");
    let tmp = tempfile::tempdir().context("create tempdir")?;
    let out_dir = tmp.path().join("run");
    let out_arg = out_dir.clone();

    let exe = env!("CARGO_BIN_EXE_llmbench");
    let output = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--url")
            .arg(&url)
            .arg("--model")
            .arg("mock/model")
            .arg("--token")
            .arg("sk-test")
            .arg("--concurrency")
            .arg("2")
            .arg("--total-requests")
            .arg("6")
            .arg("--warmup")
            .arg("2")
            .arg("--output")
            .arg("json")
            .arg("--out")
            .arg(&out_arg)
            .output()
    })
    .await
    .context("join llmbench")?
    .context("run llmbench")?;

    let seen = server.stats().requests_total();
    let bearer = server.stats().saw_bearer_token();
    server.shutdown().await;

    anyhow::ensure!(
        output.status.success(),
        "llmbench exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    anyhow::ensure!(seen == 8, "server saw {seen} requests");
    anyhow::ensure!(bearer == 8, "bearer token sent {bearer} times");

    let stdout = String::from_utf8(output.stdout).context("stdout utf8")?;
    let lines = stdout
        .lines()
        .map(|l| serde_json::from_str::<Line>(l).with_context(|| format!("parse line: {l}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let progress: Vec<_> = lines
        .iter()
        .filter_map(|l| match l {
            Line::Progress {
                phase,
                completed,
                total,
                status,
            } => Some((phase.as_str(), *completed, *total, status.as_str())),
            Line::Summary { .. } => None,
        })
        .collect();
    anyhow::ensure!(progress.len() == 8, "progress lines: {progress:?}");
    anyhow::ensure!(
        progress.iter().filter(|p| p.0 == "warmup").count() == 2,
        "progress lines: {progress:?}"
    );
    anyhow::ensure!(
        progress.iter().all(|p| p.3 == "ok"),
        "progress lines: {progress:?}"
    );
    anyhow::ensure!(
        progress.last().is_some_and(|p| p.0 == "measured" && p.1 == 6 && p.2 == 6),
        "progress lines: {progress:?}"
    );

    let Some(Line::Summary {
        total_requests,
        success,
        failure,
        ttft_ms,
        latency_ms,
        throughput,
        ttft_distribution_ms,
    }) = lines.last()
    else {
        anyhow::bail!("last line is not a summary: {stdout}");
    };
    anyhow::ensure!(*total_requests == 6 && *success == 6 && *failure == 0);

    let ttft = ttft_ms.as_ref().context("ttft missing")?;
    let latency = latency_ms.as_ref().context("latency missing")?;
    anyhow::ensure!(ttft.min <= ttft.p50 && ttft.p50 <= ttft.p99 && ttft.p99 <= ttft.max);
    anyhow::ensure!(ttft.p50 <= latency.p50);
    anyhow::ensure!(ttft_distribution_ms.len() == 6);

    let throughput = throughput.as_ref().context("throughput missing")?;
    anyhow::ensure!(throughput.unit == "tokens", "unit {}", throughput.unit);
    anyhow::ensure!(throughput.total == 18, "total {}", throughput.total);
    anyhow::ensure!(throughput.per_sec > 0.0);

    let results = std::fs::read_to_string(out_dir.join("results.jsonl")).context("read results")?;
    let rows = results
        .lines()
        .map(|l| serde_json::from_str::<Row>(l).with_context(|| format!("parse row: {l}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    anyhow::ensure!(rows.len() == 6, "rows: {rows:?}");

    let mut ids: Vec<_> = rows.iter().map(|r| r.request_id.as_str()).collect();
    ids.sort_unstable();
    anyhow::ensure!(
        ids == ["req-3", "req-4", "req-5", "req-6", "req-7", "req-8"],
        "ids: {ids:?}"
    );
    for row in &rows {
        anyhow::ensure!(row.status == "ok" && row.provider == "openai", "row: {row:?}");
        anyhow::ensure!(row.out_tokens == Some(3), "row: {row:?}");
        anyhow::ensure!(row.out_chars == "tok0 tok1 tok2 ".len() as u64, "row: {row:?}");
        let ttft = row.ttft_ms.context("row ttft missing")?;
        anyhow::ensure!(ttft <= row.latency_ms, "row: {row:?}");
    }

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out_dir.join("summary.json")).context("read summary")?)
            .context("parse summary")?;
    anyhow::ensure!(summary["model"] == "mock/model");
    anyhow::ensure!(summary["provider"] == "openai");
    anyhow::ensure!(summary["success"] == 6);

    Ok(())
}

#[tokio::test]
async fn e2e_human_output_and_chars_mode() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let url = server.urls().chat_with("chunks=2");
    let tmp = tempfile::tempdir().context("create tempdir")?;
    let workload = tmp.path().join("prompts.txt");
    std::fs::write(&workload, "first prompt\n\nsecond prompt\n").context("write workload")?;
    let out_dir = tmp.path().join("run");
    let out_arg = out_dir.clone();

    let exe = env!("CARGO_BIN_EXE_llmbench");
    let output = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg("--url")
            .arg(&url)
            .arg("--model")
            .arg("m")
            .arg("--total-requests")
            .arg("3")
            .arg("--token-mode")
            .arg("chars")
            .arg("--workload-file")
            .arg(&workload)
            .arg("--out")
            .arg(&out_arg)
            .output()
    })
    .await
    .context("join llmbench")?
    .context("run llmbench")?;

    server.shutdown().await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::ensure!(output.status.success(), "status {}: {stdout}", output.status);
    anyhow::ensure!(stdout.contains("target: "), "stdout: {stdout}");
    anyhow::ensure!(
        stdout.contains("requests: 3 (ok 3, failed 0, success rate 100.0%)"),
        "stdout: {stdout}"
    );
    anyhow::ensure!(stdout.contains("chars total"), "stdout: {stdout}");

    let results = std::fs::read_to_string(out_dir.join("results.jsonl")).context("read results")?;
    anyhow::ensure!(results.lines().count() == 3, "results: {results}");
    Ok(())
}
