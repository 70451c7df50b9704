pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Workload(#[from] crate::workload::Error),

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("`total_requests` must be a positive integer")]
    InvalidTotalRequests,

    #[error(
        "`rate` must be a positive number of requests per second with a nonzero dispatch period (got {0})"
    )]
    InvalidRate(f64),

    #[error("`timeout` must be a positive duration of at most 24h")]
    InvalidTimeout,
}
