use std::fmt::Write as _;
use std::path::Path;

use llmbench_core::{BenchmarkReport, DurationStats};

use super::format::{format_ms, format_percent};

pub(crate) fn render(report: &BenchmarkReport, out_dir: &Path) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  requests: {} (ok {}, failed {}, success rate {})",
        report.total_requests,
        report.success,
        report.failure,
        format_percent(report.success_rate)
    )
    .ok();
    writeln!(
        &mut out,
        "  wall time: {}  rps: {:.2}",
        format_ms(llmbench_core::stats::millis(report.wall_time)),
        report.rps
    )
    .ok();

    render_durations(&mut out, "ttft", report.ttft.as_ref());
    render_durations(&mut out, "latency", report.latency.as_ref());

    match &report.throughput {
        Some(t) => {
            writeln!(
                &mut out,
                "  throughput: {:.2} {}/s ({} {} total)",
                t.per_sec, t.unit, t.total_units, t.unit
            )
            .ok();
            if let Some(g) = t.generation_per_sec {
                writeln!(&mut out, "  generation: {g:.2} {}/s per request", t.unit).ok();
            }
        }
        None => {
            writeln!(&mut out, "  throughput: n/a (token mode {})", report.token_mode).ok();
        }
    }

    if !report.errors.is_empty() {
        out.push_str("  errors:\n");
        for e in &report.errors {
            writeln!(&mut out, "    {:>6}  {}", e.count, e.key()).ok();
        }
    }

    writeln!(&mut out, "  output: {}", out_dir.display()).ok();
    out
}

fn render_durations(out: &mut String, name: &str, stats: Option<&DurationStats>) {
    match stats {
        Some(s) => {
            writeln!(
                out,
                "  {name} = avg={} p50={} p95={} p99={} min={} max={}",
                format_ms(s.avg_ms),
                format_ms(s.p50_ms),
                format_ms(s.p95_ms),
                format_ms(s.p99_ms),
                format_ms(s.min_ms),
                format_ms(s.max_ms)
            )
            .ok();
        }
        None => {
            writeln!(out, "  {name}: n/a").ok();
        }
    }
}
