use std::time::{Duration, Instant, SystemTime};

/// Cap for every raw text sample kept on a result or report.
pub const SAMPLE_LIMIT: usize = 64 * 1024;

const TRUNCATED_MARKER: &str = "...(truncated)";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Ok,
    HttpError,
    Timeout,
    ParseError,
}

/// How output volume is counted for throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TokenMode {
    /// API-reported `completion_tokens`, falling back to characters when unavailable.
    #[default]
    Usage,
    Chars,
    Disabled,
}

/// Unit a throughput figure was actually computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ThroughputUnit {
    Tokens,
    Chars,
}

/// One executed request. Built once by the executor and never mutated.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub id: String,
    pub status: RequestStatus,
    /// Wall-clock time the request started.
    pub started_at: SystemTime,
    pub start: Instant,
    pub first_content: Option<Instant>,
    pub end: Instant,
    pub out_tokens: Option<u64>,
    pub out_chars: u64,
    pub error: Option<String>,
    pub first_content_raw: Option<String>,
    pub final_frame_raw: Option<String>,
}

impl RequestResult {
    pub fn is_success(&self) -> bool {
        self.status == RequestStatus::Ok
    }

    pub fn latency(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }

    pub fn ttft(&self) -> Option<Duration> {
        self.first_content
            .map(|t| t.saturating_duration_since(self.start))
    }

    pub fn decode_time(&self) -> Option<Duration> {
        self.first_content
            .map(|t| self.end.saturating_duration_since(t))
    }

    pub fn first_content_at(&self) -> Option<SystemTime> {
        self.ttft().map(|ttft| self.started_at + ttft)
    }

    pub fn ended_at(&self) -> SystemTime {
        self.started_at + self.latency()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationStats {
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub unit: ThroughputUnit,
    pub total_units: u64,
    /// Output units over measured wall time.
    pub per_sec: f64,
    /// Mean of per-request `units / decode time`.
    pub generation_per_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorStat {
    pub status: RequestStatus,
    pub message: Option<String>,
    pub count: u64,
}

impl ErrorStat {
    /// `"<status>: <message>"`, or the bare status without a message.
    pub fn key(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {message}", self.status),
            None => self.status.to_string(),
        }
    }
}

/// Aggregate of one measured run.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub provider: String,
    pub model: String,
    pub started_at: SystemTime,
    pub wall_time: Duration,

    pub total_requests: u64,
    pub success: u64,
    pub failure: u64,
    pub success_rate: f64,

    pub ttft: Option<DurationStats>,
    pub latency: Option<DurationStats>,

    pub token_mode: TokenMode,
    pub throughput: Option<Throughput>,
    pub rps: f64,

    pub errors: Vec<ErrorStat>,

    pub first_content_sample: Option<String>,
    pub final_frame_sample: Option<String>,

    pub ttft_distribution_ms: Vec<f64>,
    pub latency_distribution_ms: Vec<f64>,
}

impl BenchmarkReport {
    /// Mode throughput was actually counted in: usage mode that fell back to characters reports
    /// [`TokenMode::Chars`].
    pub fn effective_token_mode(&self) -> TokenMode {
        match (self.token_mode, &self.throughput) {
            (TokenMode::Usage, Some(t)) if t.unit == ThroughputUnit::Chars => TokenMode::Chars,
            (mode, _) => mode,
        }
    }
}

/// Bound `raw` to [`SAMPLE_LIMIT`] bytes, marking the cut.
pub fn truncate_sample(raw: &str) -> String {
    if raw.len() <= SAMPLE_LIMIT {
        return raw.to_string();
    }

    let mut cut = SAMPLE_LIMIT - TRUNCATED_MARKER.len();
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + TRUNCATED_MARKER.len());
    out.push_str(&raw[..cut]);
    out.push_str(TRUNCATED_MARKER);
    out
}
