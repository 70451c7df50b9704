use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::{Mutex, mpsc};

use super::{ArrivalPacer, BenchConfig, Phase, ProgressFn, ProgressUpdate, Result};
use crate::executor::execute;
use crate::result::{BenchmarkReport, RequestResult};
use crate::stats::{AggregateOptions, aggregate};
use crate::transport::Transport;
use crate::workload::{WorkloadItem, expand_cyclic};

/// Raw results of one batch in completion order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<RequestResult>,
    /// Last result received minus first dispatch.
    pub wall_time: Duration,
    pub started_at: SystemTime,
}

#[derive(Debug)]
pub struct BenchmarkRun {
    pub report: BenchmarkReport,
    /// Measured results only; warmup results are never kept.
    pub results: Vec<RequestResult>,
}

/// Run `items` through `cfg.concurrency` workers, optionally paced to `cfg.rate`.
///
/// Every item produces exactly one result. Request failures are part of the outcome; only task
/// failures are returned as errors.
pub async fn run_batch<T: Transport>(
    transport: &Arc<T>,
    items: Vec<WorkloadItem>,
    cfg: &BenchConfig,
    phase: Phase,
    progress: Option<&ProgressFn>,
) -> Result<BatchOutcome> {
    cfg.validate()?;

    let total = items.len();
    let concurrency = cfg.concurrency;
    let timeout = cfg.timeout;

    let (job_tx, job_rx) = mpsc::channel::<WorkloadItem>(concurrency);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<RequestResult>();

    let mut workers = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let transport = transport.clone();
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let next = { job_rx.lock().await.recv().await };
                let Some(item) = next else {
                    break;
                };
                let result = execute(transport.as_ref(), &item, timeout).await;
                if result_tx.send(result).is_err() {
                    break;
                }
            }
        }));
    }
    // Only workers hold the queue ends, so a dead pool closes both channels.
    drop(job_rx);
    drop(result_tx);

    let started_at = SystemTime::now();
    let start = Instant::now();
    let rate = cfg.rate;
    let dispatcher = tokio::spawn(async move {
        let mut pacer =
            rate.and_then(|r| ArrivalPacer::new(r, tokio::time::Instant::from_std(start)));
        for item in items {
            if let Some(pacer) = pacer.as_mut() {
                pacer.wait().await;
            }
            if job_tx.send(item).await.is_err() {
                break;
            }
        }
    });

    let mut results = Vec::with_capacity(total);
    let mut failed = 0usize;
    let mut last = start;
    while let Some(result) = result_rx.recv().await {
        last = Instant::now();
        if !result.is_success() {
            failed += 1;
        }
        if let Some(progress) = progress {
            progress(ProgressUpdate {
                phase,
                completed: results.len() + 1,
                total,
                failed,
                elapsed: last.saturating_duration_since(start),
                result: &result,
            });
        }
        results.push(result);
    }

    dispatcher.await?;
    for worker in workers {
        worker.await?;
    }

    Ok(BatchOutcome {
        results,
        wall_time: last.saturating_duration_since(start),
        started_at,
    })
}

/// Warm up, then run and aggregate the measured batch.
///
/// `items` is replayed cyclically when it holds fewer than `warmup + total_requests` entries.
pub async fn run_benchmark<T: Transport>(
    transport: Arc<T>,
    items: Vec<WorkloadItem>,
    cfg: &BenchConfig,
    progress: Option<ProgressFn>,
) -> Result<BenchmarkRun> {
    cfg.validate()?;

    let mut items = expand_cyclic(items, cfg.items_needed())?;
    let measured = items.split_off(cfg.warmup);
    let warmup = items;

    if !warmup.is_empty() {
        tracing::info!(requests = warmup.len(), "warmup started");
        let outcome = run_batch(&transport, warmup, cfg, Phase::Warmup, progress.as_ref()).await?;
        tracing::info!(
            requests = outcome.results.len(),
            wall_ms = outcome.wall_time.as_millis() as u64,
            "warmup finished"
        );
    }

    tracing::info!(
        requests = measured.len(),
        concurrency = cfg.concurrency,
        rate = cfg.rate,
        "benchmark started"
    );
    let outcome = run_batch(&transport, measured, cfg, Phase::Measured, progress.as_ref()).await?;

    let report = aggregate(
        &outcome.results,
        outcome.wall_time,
        &AggregateOptions {
            provider: transport.dialect().name().to_string(),
            model: transport.model().to_string(),
            started_at: outcome.started_at,
            token_mode: cfg.token_mode,
            top_n: cfg.top_n,
        },
    );
    tracing::info!(
        success = report.success,
        failure = report.failure,
        wall_ms = report.wall_time.as_millis() as u64,
        "benchmark finished"
    );

    Ok(BenchmarkRun {
        report,
        results: outcome.results,
    })
}
