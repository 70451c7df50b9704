use std::path::Path;

use llmbench_core::{BenchConfig, BenchmarkReport, ProgressFn};

use crate::cli::OutputFormat;

pub(crate) mod files;
mod human;
mod json;
pub(crate) mod report;

/// What is about to run, for the formatter's header.
pub(crate) struct RunHeader<'a> {
    pub url: &'a str,
    pub model: &'a str,
    pub provider: &'a str,
    pub workload: &'a str,
    pub cfg: &'a BenchConfig,
    pub out_dir: &'a Path,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader<'_>);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, report: &BenchmarkReport, out_dir: &Path) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
