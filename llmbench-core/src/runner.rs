//! The dispatch engine: bounded-concurrency execution of a workload batch.

mod config;
mod error;
mod pacer;
mod progress;
mod run;

pub use config::BenchConfig;
pub use error::{Error, Result};
pub use pacer::{ArrivalPacer, rate_period};
pub use progress::{Phase, ProgressFn, ProgressUpdate};
pub use run::{BatchOutcome, BenchmarkRun, run_batch, run_benchmark};
