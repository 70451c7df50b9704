use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context as _;
use llmbench_core::{BenchmarkReport, RequestResult};

use super::report::{ReportJson, ResultRow};

pub(crate) const RESULTS_FILE: &str = "results.jsonl";
pub(crate) const SUMMARY_FILE: &str = "summary.json";

/// `output/<model>_<YYYYmmdd_HHMMSS>` (UTC).
pub(crate) fn default_out_dir(model: &str, now: SystemTime) -> PathBuf {
    Path::new("output").join(format!("{}_{}", sanitize_model(model), compact_timestamp(now)))
}

pub(crate) fn sanitize_model(model: &str) -> String {
    model
        .chars()
        .map(|c| match c {
            '/' | ':' | ' ' => '_',
            c => c,
        })
        .collect()
}

fn compact_timestamp(now: SystemTime) -> String {
    // "2024-01-02T03:04:05Z" -> "20240102_030405"
    humantime::format_rfc3339_seconds(now)
        .to_string()
        .chars()
        .filter_map(|c| match c {
            '-' | ':' | 'Z' => None,
            'T' => Some('_'),
            c => Some(c),
        })
        .collect()
}

pub(crate) async fn create_out_dir(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create output directory {}", dir.display()))
}

pub(crate) fn render_results(results: &[RequestResult], provider: &str) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(results.len() * 256);
    for r in results {
        serde_json::to_writer(&mut buf, &ResultRow::new(r, provider))
            .context("serialize result row")?;
        buf.push(b'\n');
    }
    Ok(buf)
}

pub(crate) async fn write_results(
    dir: &Path,
    results: &[RequestResult],
    provider: &str,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(RESULTS_FILE);
    let buf = render_results(results, provider)?;
    tokio::fs::write(&path, buf)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub(crate) async fn write_summary(dir: &Path, report: &BenchmarkReport) -> anyhow::Result<PathBuf> {
    let path = dir.join(SUMMARY_FILE);
    let mut buf =
        serde_json::to_vec_pretty(&ReportJson::new(report)).context("serialize summary")?;
    buf.push(b'\n');
    tokio::fs::write(&path, buf)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn model_names_are_path_safe() {
        assert_eq!(sanitize_model("meta/llama-3:8b instruct"), "meta_llama-3_8b_instruct");
        assert_eq!(sanitize_model("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn default_dir_uses_compact_utc_timestamp() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            default_out_dir("org/model", now),
            Path::new("output").join("org_model_20231114_221320")
        );
    }

    #[tokio::test]
    async fn writes_both_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir().context("tempdir")?;
        let out = dir.path().join("nested").join("run");
        create_out_dir(&out).await?;

        let report = llmbench_core::stats::aggregate(
            &[],
            Duration::ZERO,
            &llmbench_core::stats::AggregateOptions {
                provider: "openai".to_string(),
                model: "m".to_string(),
                started_at: SystemTime::UNIX_EPOCH,
                token_mode: llmbench_core::TokenMode::Usage,
                top_n: 10,
            },
        );

        let results_path = write_results(&out, &[], "openai").await?;
        let summary_path = write_summary(&out, &report).await?;

        let results = std::fs::read_to_string(results_path).context("read results")?;
        anyhow::ensure!(results.is_empty(), "unexpected rows: {results}");

        let summary: serde_json::Value =
            serde_json::from_slice(&std::fs::read(summary_path).context("read summary")?)
                .context("parse summary")?;
        assert_eq!(summary["model"], "m");
        assert_eq!(summary["total_requests"], 0);
        assert_eq!(summary["started_at"], "1970-01-01T00:00:00.000Z");
        Ok(())
    }
}
