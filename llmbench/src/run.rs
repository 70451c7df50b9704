use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context as _;
use llmbench_core::workload::{DefaultSource, FileSource};
use llmbench_core::{
    BenchConfig, DialectRegistry, HttpTransport, Target, WorkloadItem, WorkloadSource,
    run_benchmark, runner,
};
use llmbench_http::{ClientOptions, TlsOptions};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, RunHeader, files};
use crate::run_error::RunError;

fn bench_config(args: &RunArgs) -> BenchConfig {
    BenchConfig {
        concurrency: args.concurrency,
        total_requests: args.total_requests,
        warmup: args.warmup,
        rate: args.rps,
        timeout: args.timeout,
        token_mode: args.token_mode.into(),
        top_n: args.top_errors,
    }
}

fn load_workload(
    args: &RunArgs,
    cfg: &BenchConfig,
) -> anyhow::Result<(Vec<WorkloadItem>, String)> {
    let max_tokens = Some(args.max_tokens);
    match &args.workload_file {
        Some(path) => {
            let items = FileSource::new(path, max_tokens)
                .load()
                .context("load workload file")?;
            Ok((items, path.display().to_string()))
        }
        None => {
            let items = DefaultSource {
                count: cfg.items_needed(),
                max_tokens,
            }
            .load()
            .context("generate default workload")?;
            Ok((items, "built-in prompts".to_string()))
        }
    }
}

fn classify(err: runner::Error) -> RunError {
    if matches!(err, runner::Error::Join(_)) {
        RunError::RuntimeError(err.into())
    } else {
        RunError::InvalidInput(anyhow::Error::new(err).context("invalid benchmark config"))
    }
}

pub(crate) async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let cfg = bench_config(&args);
    cfg.validate().map_err(classify)?;

    let dialect = DialectRegistry::builtin()
        .get(&args.provider)
        .map_err(|e| RunError::InvalidInput(e.into()))?;

    let (items, workload) = load_workload(&args, &cfg).map_err(RunError::InvalidInput)?;

    let client_opts = ClientOptions {
        tls: TlsOptions {
            insecure: args.insecure,
            ca_cert_path: args.ca_cert.clone(),
        },
        ..ClientOptions::default()
    };
    let target = Target {
        url: args.url.clone(),
        model: args.model.clone(),
        token: args.token.clone(),
        default_max_tokens: Some(args.max_tokens),
    };
    let provider = dialect.name();
    let transport = HttpTransport::new(target, dialect.clone(), &client_opts)
        .context("create http client")
        .map_err(RunError::InvalidInput)?;

    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| files::default_out_dir(&args.model, SystemTime::now()));
    files::create_out_dir(&out_dir)
        .await
        .map_err(RunError::RuntimeError)?;

    let formatter = output::formatter(args.output);
    formatter.print_header(&RunHeader {
        url: &args.url,
        model: &args.model,
        provider,
        workload: &workload,
        cfg: &cfg,
        out_dir: &out_dir,
    });

    let run = run_benchmark(Arc::new(transport), items, &cfg, formatter.progress())
        .await
        .map_err(classify)?;

    files::write_results(&out_dir, &run.results, provider)
        .await
        .map_err(RunError::RuntimeError)?;
    files::write_summary(&out_dir, &run.report)
        .await
        .map_err(RunError::RuntimeError)?;

    formatter
        .print_summary(&run.report, &out_dir)
        .map_err(RunError::RuntimeError)?;

    let code = ExitCode::from_outcome(run.report.total_requests, run.report.success);
    if code == ExitCode::AllRequestsFailed {
        tracing::warn!(total = run.report.total_requests, "every measured request failed");
    }
    Ok(code)
}
