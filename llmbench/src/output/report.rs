//! Serialized shapes shared by `summary.json`, `results.jsonl` and the NDJSON summary line.

use std::time::SystemTime;

use llmbench_core::stats::millis;
use llmbench_core::{BenchmarkReport, DurationStats, ErrorStat, RequestResult, Throughput};
use serde::Serialize;

pub(crate) fn rfc3339(t: SystemTime) -> String {
    humantime::format_rfc3339_millis(t).to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportJson<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub started_at: String,
    pub wall_time_ms: f64,

    pub total_requests: u64,
    pub success: u64,
    pub failure: u64,
    pub success_rate: f64,

    pub ttft_ms: Option<DurationStatsJson>,
    pub latency_ms: Option<DurationStatsJson>,

    pub token_mode: String,
    /// `chars` when usage counting fell back to characters.
    pub effective_token_mode: String,
    pub throughput: Option<ThroughputJson>,
    pub rps: f64,

    pub errors: Vec<ErrorJson<'a>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_content_sample: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_frame_sample: Option<&'a str>,

    pub ttft_distribution_ms: &'a [f64],
    pub latency_distribution_ms: &'a [f64],
}

impl<'a> ReportJson<'a> {
    pub(crate) fn new(r: &'a BenchmarkReport) -> Self {
        Self {
            provider: &r.provider,
            model: &r.model,
            started_at: rfc3339(r.started_at),
            wall_time_ms: millis(r.wall_time),
            total_requests: r.total_requests,
            success: r.success,
            failure: r.failure,
            success_rate: r.success_rate,
            ttft_ms: r.ttft.as_ref().map(DurationStatsJson::from),
            latency_ms: r.latency.as_ref().map(DurationStatsJson::from),
            token_mode: r.token_mode.to_string(),
            effective_token_mode: r.effective_token_mode().to_string(),
            throughput: r.throughput.as_ref().map(ThroughputJson::from),
            rps: r.rps,
            errors: r.errors.iter().map(ErrorJson::from).collect(),
            first_content_sample: r.first_content_sample.as_deref(),
            final_frame_sample: r.final_frame_sample.as_deref(),
            ttft_distribution_ms: &r.ttft_distribution_ms,
            latency_distribution_ms: &r.latency_distribution_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DurationStatsJson {
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

impl From<&DurationStats> for DurationStatsJson {
    fn from(s: &DurationStats) -> Self {
        Self {
            avg: s.avg_ms,
            p50: s.p50_ms,
            p95: s.p95_ms,
            p99: s.p99_ms,
            min: s.min_ms,
            max: s.max_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ThroughputJson {
    pub unit: &'static str,
    pub total: u64,
    pub per_sec: f64,
    pub generation_per_sec: Option<f64>,
}

impl From<&Throughput> for ThroughputJson {
    fn from(t: &Throughput) -> Self {
        Self {
            unit: t.unit.into(),
            total: t.total_units,
            per_sec: t.per_sec,
            generation_per_sec: t.generation_per_sec,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorJson<'a> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    pub count: u64,
}

impl<'a> From<&'a ErrorStat> for ErrorJson<'a> {
    fn from(e: &'a ErrorStat) -> Self {
        Self {
            status: e.status.into(),
            message: e.message.as_deref(),
            count: e.count,
        }
    }
}

/// One `results.jsonl` row.
#[derive(Debug, Serialize)]
pub(crate) struct ResultRow<'a> {
    pub request_id: &'a str,
    pub status: &'static str,
    pub ttft_ms: Option<f64>,
    pub latency_ms: f64,
    pub decode_ms: Option<f64>,
    pub out_tokens: Option<u64>,
    pub out_chars: u64,
    pub start_ts: String,
    pub first_content_ts: Option<String>,
    pub end_ts: String,
    pub provider: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<&'a str>,
}

impl<'a> ResultRow<'a> {
    pub(crate) fn new(r: &'a RequestResult, provider: &'a str) -> Self {
        Self {
            request_id: &r.id,
            status: r.status.into(),
            ttft_ms: r.ttft().map(millis),
            latency_ms: millis(r.latency()),
            decode_ms: r.decode_time().map(millis),
            out_tokens: r.out_tokens,
            out_chars: r.out_chars,
            start_ts: rfc3339(r.started_at),
            first_content_ts: r.first_content_at().map(rfc3339),
            end_ts: rfc3339(r.ended_at()),
            provider,
            err: r.error.as_deref(),
        }
    }
}
