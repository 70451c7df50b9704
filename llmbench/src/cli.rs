use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use llmbench_core::TokenMode;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 60s, 500ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 60s, 500ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 60s, 500ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 60s, 500ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress and summary.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TokenModeArg {
    /// Count tokens from the server's usage report, falling back to characters.
    Usage,
    /// Count output characters.
    Chars,
    /// Do not compute throughput.
    Disabled,
}

impl From<TokenModeArg> for TokenMode {
    fn from(value: TokenModeArg) -> Self {
        match value {
            TokenModeArg::Usage => TokenMode::Usage,
            TokenModeArg::Chars => TokenMode::Chars,
            TokenModeArg::Disabled => TokenMode::Disabled,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "llmbench",
    author,
    version,
    about = "Streaming benchmark for OpenAI-compatible LLM endpoints",
    long_about = "llmbench sends streaming chat completion requests to an LLM endpoint and measures time to first token, end-to-end latency and output throughput.\n\nEach measured request is written to results.jsonl and the aggregate report to summary.json in the output directory.",
    after_help = "Examples:\n  llmbench run --url http://localhost:8000/v1/chat/completions --model llama3\n  llmbench run --url $URL --model gpt-4o-mini --concurrency 8 --total-requests 200 --warmup 8\n  llmbench run --url $URL --model m --rps 2.5 --workload-file prompts.jsonl --output json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a benchmark against a streaming chat completions endpoint
    Run(RunArgs),

    /// List the available provider dialects
    Providers,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Chat completions endpoint URL
    #[arg(long, env = "LLMBENCH_URL")]
    pub url: String,

    /// Model name sent with every request
    #[arg(long, env = "LLMBENCH_MODEL")]
    pub model: String,

    /// Bearer token for the Authorization header
    #[arg(long, env = "LLMBENCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Provider dialect (see `llmbench providers`)
    #[arg(long, default_value = "openai")]
    pub provider: String,

    /// Number of requests in flight at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Number of measured requests
    #[arg(long, default_value_t = 10)]
    pub total_requests: usize,

    /// Target request starts per second (default: as fast as concurrency allows)
    #[arg(long)]
    pub rps: Option<f64>,

    /// Requests sent before measuring and excluded from the report
    #[arg(long, default_value_t = 0)]
    pub warmup: usize,

    /// Default max_tokens for items that do not set one
    #[arg(long, default_value_t = 256)]
    pub max_tokens: u32,

    /// How output throughput is counted
    #[arg(long, value_enum, default_value_t = TokenModeArg::Usage)]
    pub token_mode: TokenModeArg,

    /// Per-request timeout (e.g. 60s, 500ms, 1m)
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub timeout: Duration,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// PEM CA bundle to trust for https targets
    #[arg(long, value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// Workload file: one prompt per line, or JSONL with id/prompt/messages/max_tokens
    #[arg(long, value_name = "PATH")]
    pub workload_file: Option<PathBuf>,

    /// Output directory (default: output/<model>_<timestamp>)
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Number of error kinds listed in the report
    #[arg(long, default_value_t = 10)]
    pub top_errors: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Enable debug logging on stderr (overridden by RUST_LOG)
    #[arg(long, short)]
    pub verbose: bool,
}
