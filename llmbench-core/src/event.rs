use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufRead;

use crate::dialect::EventNormalizer;
use crate::sse::SseDecoder;

/// Token accounting reported by the API itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Dialect-independent event produced while a single request streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A visible generated text increment and the raw data of the frame carrying it.
    Content { text: String, raw: String },
    Usage(TokenUsage),
    /// Generation finished. Nothing follows an `End`.
    End { raw: Option<String> },
    /// Terminal failure of the stream itself. Nothing follows an `Error`.
    Error(String),
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StreamEventKind {
    Content,
    Usage,
    End,
    Error,
    Meta,
}

impl StreamEvent {
    pub fn kind(&self) -> StreamEventKind {
        match self {
            Self::Content { .. } => StreamEventKind::Content,
            Self::Usage(_) => StreamEventKind::Usage,
            Self::End { .. } => StreamEventKind::End,
            Self::Error(_) => StreamEventKind::Error,
            Self::Meta => StreamEventKind::Meta,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error(_))
    }
}

/// Decoder and normalizer glued into one pull-based event source.
///
/// Once a terminal event has been returned, `next_event` keeps returning `None` and the underlying
/// reader is not polled again.
pub struct EventStream<R> {
    decoder: SseDecoder<R>,
    normalizer: Box<dyn EventNormalizer>,
    pending: VecDeque<StreamEvent>,
    scratch: Vec<StreamEvent>,
    last_frame: Option<String>,
    exhausted: bool,
    terminated: bool,
}

impl<R> EventStream<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, normalizer: Box<dyn EventNormalizer>) -> Self {
        Self {
            decoder: SseDecoder::new(reader),
            normalizer,
            pending: VecDeque::new(),
            scratch: Vec::new(),
            last_frame: None,
            exhausted: false,
            terminated: false,
        }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if self.terminated {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.terminated = true;
                    self.pending.clear();
                }
                return Some(event);
            }
            if self.exhausted {
                return None;
            }

            match self.decoder.next().await {
                Ok(Some(frame)) => {
                    self.normalizer.normalize(&frame, &mut self.scratch);
                    self.pending.extend(self.scratch.drain(..));
                    self.last_frame = Some(frame.data);
                }
                Ok(None) => {
                    self.exhausted = true;
                    self.normalizer.finish(&mut self.scratch);
                    self.pending.extend(self.scratch.drain(..));
                }
                Err(err) => {
                    self.exhausted = true;
                    self.pending
                        .push_back(StreamEvent::Error(format!("stream read failed: {err}")));
                }
            }
        }
    }

    /// Raw data of the most recently decoded frame.
    pub fn last_frame(&self) -> Option<&str> {
        self.last_frame.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::openai::OpenAiNormalizer;

    fn stream(input: &'static [u8]) -> EventStream<&'static [u8]> {
        EventStream::new(input, Box::new(OpenAiNormalizer::default()))
    }

    async fn collect(mut events: EventStream<&'static [u8]>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Some(event) = events.next_event().await {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn nothing_follows_end() {
        let events = collect(stream(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
              data: [DONE]\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ))
        .await;

        let kinds: Vec<_> = events.iter().map(StreamEvent::kind).collect();
        assert_eq!(kinds, vec![StreamEventKind::Content, StreamEventKind::End]);
    }

    #[tokio::test]
    async fn eof_without_sentinel_still_ends() {
        let events =
            collect(stream(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n")).await;
        assert_eq!(events.last().map(StreamEvent::kind), Some(StreamEventKind::End));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn tracks_last_frame() {
        let mut events = stream(b"data: {\"choices\":[]}\n\ndata: [DONE]\n\n");
        while events.next_event().await.is_some() {}
        assert_eq!(events.last_frame(), Some("[DONE]"));
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(StreamEventKind::Content.to_string(), "content");
        assert_eq!(StreamEvent::Error("x".into()).kind().to_string(), "error");
    }
}
