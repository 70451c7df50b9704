#![forbid(unsafe_code)]

pub mod dialect;
pub mod event;
pub mod executor;
pub mod result;
pub mod runner;
pub mod sse;
pub mod stats;
pub mod transport;
pub mod workload;

pub use dialect::{Dialect, DialectRegistry, EventNormalizer};
pub use event::{StreamEvent, TokenUsage};
pub use result::{
    BenchmarkReport, DurationStats, ErrorStat, RequestResult, RequestStatus, Throughput,
    ThroughputUnit, TokenMode,
};
pub use runner::{BenchConfig, Phase, ProgressFn, ProgressUpdate, run_benchmark};
pub use transport::{HttpTransport, Target, Transport, TransportError};
pub use workload::{WorkloadItem, WorkloadSource};
