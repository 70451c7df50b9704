use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use llmbench_core::{BenchmarkReport, ProgressFn, ProgressUpdate};
use serde::Serialize;

use super::report::ReportJson;
use super::{OutputFormatter, RunHeader};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _header: &RunHeader<'_>) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u: ProgressUpdate<'_>| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, report: &BenchmarkReport, out_dir: &Path) -> anyhow::Result<()> {
        let line = JsonSummaryLine {
            kind: "summary",
            out_dir: out_dir.display().to_string(),
            report: ReportJson::new(report),
        };
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine<'a> {
    pub kind: &'static str,
    pub phase: &'static str,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub elapsed_ms: u64,

    pub request_id: &'a str,
    pub status: &'static str,
    pub latency_ms: f64,
    pub ttft_ms: Option<f64>,
}

fn build_progress_line<'a>(u: &ProgressUpdate<'a>) -> JsonProgressLine<'a> {
    let r = u.result;
    JsonProgressLine {
        kind: "progress",
        phase: u.phase.into(),
        completed: u.completed,
        total: u.total,
        failed: u.failed,
        elapsed_ms: u.elapsed.as_millis() as u64,
        request_id: &r.id,
        status: r.status.into(),
        latency_ms: llmbench_core::stats::millis(r.latency()),
        ttft_ms: r.ttft().map(llmbench_core::stats::millis),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub out_dir: String,
    #[serde(flatten)]
    pub report: ReportJson<'a>,
}

fn emit_json_line<T: Serialize>(line: &T) {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    if serde_json::to_writer(&mut lock, line).is_ok() {
        let _ = writeln!(lock);
    }
}
