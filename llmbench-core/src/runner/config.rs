use std::time::Duration;

use super::pacer::rate_period;
use super::{Error, Result};
use crate::executor::MAX_TIMEOUT;
use crate::result::TokenMode;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Number of requests in flight at once.
    pub concurrency: usize,
    /// Measured requests.
    pub total_requests: usize,
    /// Requests run before measuring and then discarded.
    pub warmup: usize,
    /// Target dispatch rate in requests per second; `None` dispatches as fast as workers drain.
    pub rate: Option<f64>,
    /// Per-request deadline, covering connect through end of stream.
    pub timeout: Duration,
    pub token_mode: TokenMode,
    /// Size of the ranked error table.
    pub top_n: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            total_requests: 10,
            warmup: 0,
            rate: None,
            timeout: Duration::from_secs(60),
            token_mode: TokenMode::Usage,
            top_n: 10,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        if self.total_requests == 0 {
            return Err(Error::InvalidTotalRequests);
        }
        if let Some(rate) = self.rate
            && rate_period(rate).is_none()
        {
            return Err(Error::InvalidRate(rate));
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(Error::InvalidTimeout);
        }
        Ok(())
    }

    /// Items needed for warmup plus the measured phase.
    pub fn items_needed(&self) -> usize {
        self.warmup.saturating_add(self.total_requests)
    }
}
