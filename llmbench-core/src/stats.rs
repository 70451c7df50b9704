//! Reduction of raw results into a [`BenchmarkReport`].

use std::time::{Duration, SystemTime};

use crate::result::{
    BenchmarkReport, DurationStats, ErrorStat, RequestResult, Throughput, ThroughputUnit,
    TokenMode,
};

/// Linear interpolation at fractional rank `p/100 * (n-1)` over ascending `sorted`.
///
/// Returns `None` for an empty slice. `p` is clamped to `0..=100`.
pub fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = lower + 1;
    if upper > last {
        return Some(sorted[last]);
    }

    let weight = rank - lower as f64;
    let lo = sorted[lower].as_nanos() as f64;
    let hi = sorted[upper].as_nanos() as f64;
    Some(Duration::from_nanos((lo * (1.0 - weight) + hi * weight).round() as u64))
}

pub fn average(values: &[Duration]) -> Option<Duration> {
    if values.is_empty() {
        return None;
    }
    let total: u128 = values.iter().map(Duration::as_nanos).sum();
    let avg = total / values.len() as u128;
    Some(Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX)))
}

pub fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Summary of an unsorted sample; `None` when empty.
pub fn summarize(values: &[Duration]) -> Option<DurationStats> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let avg = average(&sorted)?;
    let at = |p| percentile(&sorted, p).map(millis).unwrap_or_default();
    Some(DurationStats {
        avg_ms: millis(avg),
        p50_ms: at(50.0),
        p95_ms: at(95.0),
        p99_ms: at(99.0),
        min_ms: at(0.0),
        max_ms: at(100.0),
    })
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub provider: String,
    pub model: String,
    pub started_at: SystemTime,
    pub token_mode: TokenMode,
    pub top_n: usize,
}

/// Build the report for one measured result set.
///
/// `results` may be in any order. Never fails: with zero successes the duration summaries are
/// `None`, and a zero `wall_time` yields zero rates.
pub fn aggregate(
    results: &[RequestResult],
    wall_time: Duration,
    opts: &AggregateOptions,
) -> BenchmarkReport {
    let successes: Vec<&RequestResult> = results.iter().filter(|r| r.is_success()).collect();

    let total = results.len() as u64;
    let success = successes.len() as u64;
    let success_rate = if total == 0 {
        0.0
    } else {
        success as f64 / total as f64
    };

    let ttfts: Vec<Duration> = successes.iter().filter_map(|r| r.ttft()).collect();
    let latencies: Vec<Duration> = successes.iter().map(|r| r.latency()).collect();

    let wall_secs = wall_time.as_secs_f64();
    let rps = if wall_secs > 0.0 {
        success as f64 / wall_secs
    } else {
        0.0
    };

    let first_sampled = successes.iter().find(|r| r.first_content_raw.is_some());
    let final_sampled = successes.iter().find(|r| r.final_frame_raw.is_some());

    BenchmarkReport {
        provider: opts.provider.clone(),
        model: opts.model.clone(),
        started_at: opts.started_at,
        wall_time,
        total_requests: total,
        success,
        failure: total - success,
        success_rate,
        ttft: summarize(&ttfts),
        latency: summarize(&latencies),
        token_mode: opts.token_mode,
        throughput: throughput(&successes, wall_secs, opts.token_mode),
        rps,
        errors: error_breakdown(results, opts.top_n),
        first_content_sample: first_sampled.and_then(|r| r.first_content_raw.clone()),
        final_frame_sample: final_sampled.and_then(|r| r.final_frame_raw.clone()),
        ttft_distribution_ms: ttfts.iter().copied().map(millis).collect(),
        latency_distribution_ms: latencies.iter().copied().map(millis).collect(),
    }
}

fn throughput(successes: &[&RequestResult], wall_secs: f64, mode: TokenMode) -> Option<Throughput> {
    let unit = match mode {
        TokenMode::Disabled => return None,
        TokenMode::Chars => ThroughputUnit::Chars,
        TokenMode::Usage => {
            let all_reported = !successes.is_empty()
                && successes.iter().all(|r| r.out_tokens.is_some());
            let any_tokens = successes.iter().any(|r| r.out_tokens.unwrap_or(0) > 0);
            if all_reported && any_tokens {
                ThroughputUnit::Tokens
            } else {
                if !successes.is_empty() {
                    tracing::warn!("usage not reported for every request, counting characters");
                }
                ThroughputUnit::Chars
            }
        }
    };

    let units = |r: &RequestResult| match unit {
        ThroughputUnit::Tokens => r.out_tokens.unwrap_or(0),
        ThroughputUnit::Chars => r.out_chars,
    };

    let total_units: u64 = successes.iter().map(|&r| units(r)).sum();
    let per_sec = if wall_secs > 0.0 {
        total_units as f64 / wall_secs
    } else {
        0.0
    };

    let rates: Vec<f64> = successes
        .iter()
        .filter_map(|&r| {
            let decode = r.decode_time()?.as_secs_f64();
            (decode > 0.0).then(|| units(r) as f64 / decode)
        })
        .collect();
    let generation_per_sec =
        (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);

    Some(Throughput {
        unit,
        total_units,
        per_sec,
        generation_per_sec,
    })
}

/// Failures grouped by `(status, message)`, most frequent first. Ties keep first-seen order.
pub fn error_breakdown(results: &[RequestResult], top_n: usize) -> Vec<ErrorStat> {
    let mut stats: Vec<ErrorStat> = Vec::new();
    for r in results.iter().filter(|r| !r.is_success()) {
        match stats
            .iter_mut()
            .find(|s| s.status == r.status && s.message == r.error)
        {
            Some(stat) => stat.count += 1,
            None => stats.push(ErrorStat {
                status: r.status,
                message: r.error.clone(),
                count: 1,
            }),
        }
    }

    stats.sort_by(|a, b| b.count.cmp(&a.count));
    stats.truncate(top_n);
    stats
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::result::RequestStatus;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn result(status: RequestStatus, ttft_ms: Option<u64>, latency_ms: u64) -> RequestResult {
        let start = Instant::now();
        RequestResult {
            id: "req".to_string(),
            status,
            started_at: SystemTime::now(),
            start,
            first_content: ttft_ms.map(|t| start + ms(t)),
            end: start + ms(latency_ms),
            out_tokens: None,
            out_chars: 0,
            error: None,
            first_content_raw: None,
            final_frame_raw: None,
        }
    }

    fn ok(ttft_ms: u64, latency_ms: u64, chars: u64, tokens: Option<u64>) -> RequestResult {
        RequestResult {
            out_chars: chars,
            out_tokens: tokens,
            ..result(RequestStatus::Ok, Some(ttft_ms), latency_ms)
        }
    }

    fn failed(status: RequestStatus, message: &str) -> RequestResult {
        RequestResult {
            error: Some(message.to_string()),
            ..result(status, None, 10)
        }
    }

    fn opts(mode: TokenMode) -> AggregateOptions {
        AggregateOptions {
            provider: "openai".to_string(),
            model: "m".to_string(),
            started_at: SystemTime::now(),
            token_mode: mode,
            top_n: 10,
        }
    }

    #[test]
    fn percentile_of_three() {
        let sorted = [ms(100), ms(200), ms(300)];
        assert_eq!(percentile(&sorted, 50.0), Some(ms(200)));
        assert_eq!(percentile(&sorted, 0.0), Some(ms(100)));
        assert_eq!(percentile(&sorted, 100.0), Some(ms(300)));
        assert_eq!(percentile(&sorted, 75.0), Some(ms(250)));
        assert_eq!(average(&sorted), Some(ms(200)));
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [ms(10), ms(20), ms(30), ms(40)];
        // rank = 0.95 * 3 = 2.85
        assert_eq!(percentile(&sorted, 95.0), Some(Duration::from_micros(38_500)));
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[ms(7)], 99.0), Some(ms(7)));
    }

    #[test]
    fn percentiles_are_monotonic() {
        let mut values: Vec<Duration> = (0..97u64).map(|i| ms((i * 37) % 101)).collect();
        values.sort_unstable();

        let mut prev = Duration::ZERO;
        for p in 0..=100 {
            let v = percentile(&values, f64::from(p)).unwrap_or_default();
            assert!(v >= prev, "p{p} went backwards");
            prev = v;
        }
        assert_eq!(percentile(&values, 100.0), values.last().copied());
    }

    #[test]
    fn aggregates_latency_scenario() {
        let results = vec![ok(30, 300, 3, None), ok(10, 100, 1, None), ok(20, 200, 2, None)];
        let report = aggregate(&results, Duration::from_secs(1), &opts(TokenMode::Chars));

        let latency = report.latency.unwrap_or_else(|| panic!("latency missing"));
        assert_eq!(latency.avg_ms, 200.0);
        assert_eq!(latency.p50_ms, 200.0);
        assert!(latency.p50_ms <= latency.p95_ms && latency.p95_ms <= latency.p99_ms);
        assert_eq!(latency.max_ms, 300.0);

        assert_eq!(report.total_requests, 3);
        assert_eq!(report.success, 3);
        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.rps, 3.0);

        let tp = report.throughput.unwrap_or_else(|| panic!("throughput missing"));
        assert_eq!(tp.unit, ThroughputUnit::Chars);
        assert_eq!(tp.total_units, 6);
        assert_eq!(tp.per_sec, 6.0);
    }

    #[test]
    fn all_timeouts_still_report() {
        let results: Vec<_> = (0..4)
            .map(|_| failed(RequestStatus::Timeout, "request timeout"))
            .collect();
        let report = aggregate(&results, Duration::from_secs(2), &opts(TokenMode::Usage));

        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.failure, 4);
        assert!(report.ttft.is_none());
        assert!(report.latency.is_none());
        assert_eq!(
            report.errors,
            vec![ErrorStat {
                status: RequestStatus::Timeout,
                message: Some("request timeout".to_string()),
                count: 4,
            }]
        );
    }

    #[test]
    fn usage_mode_falls_back_to_chars() {
        let results = vec![ok(10, 100, 50, None), ok(10, 100, 70, None)];
        let report = aggregate(&results, Duration::from_secs(2), &opts(TokenMode::Usage));

        let tp = report.throughput.unwrap_or_else(|| panic!("throughput missing"));
        assert_eq!(report.token_mode, TokenMode::Usage);
        assert_eq!(tp.unit, ThroughputUnit::Chars);
        assert_eq!(tp.total_units, 120);
        assert_eq!(tp.per_sec, 60.0);
    }

    #[test]
    fn partial_usage_is_not_mixed() {
        let results = vec![ok(10, 100, 50, Some(12)), ok(10, 100, 70, None)];
        let report = aggregate(&results, Duration::from_secs(1), &opts(TokenMode::Usage));
        let tp = report.throughput.unwrap_or_else(|| panic!("throughput missing"));
        assert_eq!(tp.unit, ThroughputUnit::Chars);
        assert_eq!(tp.total_units, 120);
    }

    #[test]
    fn usage_mode_counts_tokens() {
        let results = vec![ok(100, 600, 50, Some(10)), ok(100, 300, 70, Some(20))];
        let report = aggregate(&results, Duration::from_secs(2), &opts(TokenMode::Usage));

        let tp = report.throughput.unwrap_or_else(|| panic!("throughput missing"));
        assert_eq!(tp.unit, ThroughputUnit::Tokens);
        assert_eq!(tp.total_units, 30);
        assert_eq!(tp.per_sec, 15.0);
        // 10 tokens / 0.5s and 20 tokens / 0.2s
        let generation = tp.generation_per_sec.unwrap_or_default();
        assert!((generation - 60.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_mode_has_no_throughput() {
        let results = vec![ok(10, 100, 5, Some(5))];
        let report = aggregate(&results, Duration::from_secs(1), &opts(TokenMode::Disabled));
        assert!(report.throughput.is_none());
    }

    #[test]
    fn zero_wall_time_yields_zero_rates() {
        let results = vec![ok(10, 100, 5, None)];
        let report = aggregate(&results, Duration::ZERO, &opts(TokenMode::Chars));
        assert_eq!(report.rps, 0.0);
        assert_eq!(
            report.throughput.map(|t| t.per_sec),
            Some(0.0)
        );
    }

    #[test]
    fn empty_result_set() {
        let report = aggregate(&[], Duration::from_secs(1), &opts(TokenMode::Usage));
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn error_breakdown_ranks_by_count_then_first_seen() {
        let results = vec![
            failed(RequestStatus::HttpError, "HTTP 500: a"),
            failed(RequestStatus::ParseError, "no content received"),
            failed(RequestStatus::Timeout, "request timeout"),
            failed(RequestStatus::Timeout, "request timeout"),
            failed(RequestStatus::HttpError, "HTTP 503: b"),
            ok(1, 2, 1, None),
        ];

        let stats = error_breakdown(&results, 3);
        let keys: Vec<_> = stats.iter().map(ErrorStat::key).collect();
        assert_eq!(
            keys,
            vec![
                "timeout: request timeout",
                "http_error: HTTP 500: a",
                "parse_error: no content received",
            ]
        );
    }

    #[test]
    fn samples_come_from_first_success() {
        let mut first = ok(10, 100, 1, None);
        first.first_content_raw = Some("first".to_string());
        first.final_frame_raw = Some("[DONE]".to_string());
        let mut second = ok(10, 100, 1, None);
        second.first_content_raw = Some("second".to_string());

        let report = aggregate(
            &[failed(RequestStatus::HttpError, "x"), first, second],
            Duration::from_secs(1),
            &opts(TokenMode::Chars),
        );
        assert_eq!(report.first_content_sample.as_deref(), Some("first"));
        assert_eq!(report.final_frame_sample.as_deref(), Some("[DONE]"));
    }

    #[test]
    fn ttft_never_exceeds_latency() {
        let results = vec![ok(10, 100, 1, None), ok(90, 90, 1, None)];
        for r in &results {
            let ttft = r.ttft().unwrap_or_default();
            assert!(ttft <= r.latency());
            assert_eq!(r.decode_time(), Some(r.latency() - ttft));
        }
    }
}
