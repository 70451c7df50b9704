use std::path::Path;
use std::sync::Arc;

use llmbench_core::{BenchmarkReport, ProgressFn, ProgressUpdate};

mod format;
mod progress;
mod summary;

use format::format_rate;
use progress::HumanProgress;

use super::{OutputFormatter, RunHeader};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, h: &RunHeader<'_>) {
        println!("target: {} model={} provider={}", h.url, h.model, h.provider);
        println!("workload: {}", h.workload);
        let rate = h
            .cfg
            .rate
            .map_or_else(|| "unlimited".to_string(), |r| format!("{r}/s"));
        println!(
            "requests: total={} warmup={} concurrency={} rate={} timeout={:?}",
            h.cfg.total_requests, h.cfg.warmup, h.cfg.concurrency, rate, h.cfg.timeout
        );
        println!("output: {}", h.out_dir.display());
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u: ProgressUpdate<'_>| {
            let secs = u.elapsed.as_secs_f64();
            let rps = if secs > 0.0 {
                u.completed as f64 / secs
            } else {
                0.0
            };
            let message = format!(
                "{}/{} failed {} | {} req/s",
                u.completed,
                u.total,
                u.failed,
                format_rate(rps)
            );
            progress.update(u.phase, u.completed, u.total, message);
        }))
    }

    fn print_summary(&self, report: &BenchmarkReport, out_dir: &Path) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", summary::render(report, out_dir));
        Ok(())
    }
}
