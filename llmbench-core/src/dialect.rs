//! API dialects: how a workload item becomes an HTTP request and how decoded frames become
//! [`StreamEvent`]s.

pub mod openai;
mod registry;

use std::fmt;

use llmbench_http::HttpRequest;

use crate::event::StreamEvent;
use crate::sse::SseFrame;
use crate::transport::Target;
use crate::workload::WorkloadItem;

pub use registry::{DialectFactory, DialectRegistry, UnknownDialect};

#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    #[error("no messages provided")]
    NoMessages,

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-request interpreter of decoded frames.
///
/// Implementations must not fail on malformed payloads; such frames are skipped.
pub trait EventNormalizer: Send {
    /// Translate one frame into zero or more events, appended to `out`.
    fn normalize(&mut self, frame: &SseFrame, out: &mut Vec<StreamEvent>);

    /// Called once when the byte stream ends.
    fn finish(&mut self, out: &mut Vec<StreamEvent>);
}

pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn build_request(
        &self,
        target: &Target,
        item: &WorkloadItem,
    ) -> Result<HttpRequest, DialectError>;

    /// Fresh normalizer state for one request.
    fn normalizer(&self) -> Box<dyn EventNormalizer>;
}
