//! Execution of a single timed request.

use std::time::{Duration, Instant, SystemTime};

use tokio::time::timeout_at;

use crate::event::{EventStream, StreamEvent};
use crate::result::{RequestResult, RequestStatus, truncate_sample};
use crate::transport::Transport;
use crate::workload::WorkloadItem;

const TIMEOUT_MESSAGE: &str = "request timeout";
const NO_CONTENT_MESSAGE: &str = "no content received";

/// Longest accepted per-request deadline. Longer values are clamped.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

struct Recorder {
    id: String,
    started_at: SystemTime,
    start: Instant,
    first_content: Option<Instant>,
    first_content_raw: Option<String>,
    out_chars: u64,
    out_tokens: Option<u64>,
}

impl Recorder {
    fn finish(
        self,
        status: RequestStatus,
        error: Option<String>,
        final_frame_raw: Option<String>,
    ) -> RequestResult {
        RequestResult {
            id: self.id,
            status,
            started_at: self.started_at,
            start: self.start,
            first_content: self.first_content,
            end: Instant::now(),
            out_tokens: self.out_tokens,
            out_chars: self.out_chars,
            error,
            first_content_raw: self.first_content_raw,
            final_frame_raw,
        }
    }

    fn fail(self, status: RequestStatus, error: impl Into<String>) -> RequestResult {
        self.finish(status, Some(error.into()), None)
    }
}

/// Run `item` once and classify the outcome.
///
/// Always produces a result; request failures are never returned as errors and never retried.
/// `timeout` bounds everything from connecting to the last byte of the stream.
pub async fn execute<T>(transport: &T, item: &WorkloadItem, timeout: Duration) -> RequestResult
where
    T: Transport,
{
    let mut rec = Recorder {
        id: item.id.clone(),
        started_at: SystemTime::now(),
        start: Instant::now(),
        first_content: None,
        first_content_raw: None,
        out_chars: 0,
        out_tokens: None,
    };
    let deadline = tokio::time::Instant::from_std(rec.start) + timeout.min(MAX_TIMEOUT);

    let stream = match timeout_at(deadline, transport.open(item)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            tracing::debug!(
                id = %item.id,
                kind = err.kind(),
                error = %err,
                "request failed to open"
            );
            return rec.fail(RequestStatus::HttpError, err.to_string());
        }
        Err(_) => return rec.fail(RequestStatus::Timeout, TIMEOUT_MESSAGE),
    };

    let mut events = EventStream::new(stream, transport.dialect().normalizer());
    let mut stream_error = None;
    let mut timed_out = false;

    loop {
        let event = match timeout_at(deadline, events.next_event()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                timed_out = true;
                break;
            }
        };

        match event {
            StreamEvent::Content { text, raw } => {
                if rec.first_content.is_none() {
                    rec.first_content = Some(Instant::now());
                    rec.first_content_raw = Some(truncate_sample(&raw));
                }
                rec.out_chars += text.chars().count() as u64;
            }
            StreamEvent::Usage(usage) => rec.out_tokens = Some(usage.completion_tokens),
            StreamEvent::Error(message) => {
                stream_error = Some(message);
                break;
            }
            StreamEvent::End { .. } | StreamEvent::Meta => {}
        }
    }

    let final_frame_raw = events.last_frame().map(truncate_sample);
    drop(events);

    let (status, error) = match (stream_error, timed_out) {
        (Some(message), _) => (RequestStatus::ParseError, Some(message)),
        (None, true) => (RequestStatus::Timeout, Some(TIMEOUT_MESSAGE.to_string())),
        (None, false) if rec.first_content.is_some() => (RequestStatus::Ok, None),
        (None, false) => (
            RequestStatus::ParseError,
            Some(NO_CONTENT_MESSAGE.to_string()),
        ),
    };

    let result = rec.finish(status, error, final_frame_raw);
    tracing::debug!(
        id = %result.id,
        status = %result.status,
        latency_ms = result.latency().as_millis() as u64,
        out_chars = result.out_chars,
        "request finished"
    );
    result
}
