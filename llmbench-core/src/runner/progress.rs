use std::time::Duration;

use crate::result::RequestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Warmup,
    Measured,
}

/// Emitted once per completed request.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate<'a> {
    pub phase: Phase,
    /// Results received so far in this phase, including this one.
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    /// Time since the phase's first dispatch.
    pub elapsed: Duration,
    pub result: &'a RequestResult,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate<'_>) + Send + Sync + 'static>;
