use std::borrow::Cow;

use bytes::Bytes;
use llmbench_http::HttpRequest;
use serde::{Deserialize, Serialize};

use super::{Dialect, DialectError, EventNormalizer};
use crate::event::{StreamEvent, TokenUsage};
use crate::sse::SseFrame;
use crate::transport::Target;
use crate::workload::{ChatMessage, WorkloadItem};

pub const NAME: &str = "openai";

const DONE_SENTINEL: &str = "[DONE]";

/// OpenAI-compatible `/v1/chat/completions` streaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDialect;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Cow<'a, [ChatMessage]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

impl Dialect for OpenAiDialect {
    fn name(&self) -> &'static str {
        NAME
    }

    fn build_request(
        &self,
        target: &Target,
        item: &WorkloadItem,
    ) -> Result<HttpRequest, DialectError> {
        let messages = item.to_messages();
        if messages.is_empty() {
            return Err(DialectError::NoMessages);
        }

        let body = ChatRequest {
            model: &target.model,
            messages,
            max_tokens: item.max_tokens.or(target.default_max_tokens),
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        };
        let body = serde_json::to_vec(&body)?;

        let mut req = HttpRequest::post(&target.url, Bytes::from(body))
            .header("content-type", "application/json")
            .header("accept", "text/event-stream");
        if let Some(token) = target.token.as_deref()
            && !token.is_empty()
        {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        Ok(req)
    }

    fn normalizer(&self) -> Box<dyn EventNormalizer> {
        Box::new(OpenAiNormalizer::default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Normalizer state for one streamed chat completion.
///
/// `finish_reason` is not treated as the end of the stream: servers send the usage chunk after it,
/// and only `[DONE]` or the end of the body terminates.
#[derive(Debug, Default)]
pub struct OpenAiNormalizer {
    last_usage: Option<TokenUsage>,
    ended: bool,
}

impl EventNormalizer for OpenAiNormalizer {
    fn normalize(&mut self, frame: &SseFrame, out: &mut Vec<StreamEvent>) {
        if self.ended {
            return;
        }

        if frame.data == DONE_SENTINEL {
            if let Some(usage) = self.last_usage {
                out.push(StreamEvent::Usage(usage));
            }
            out.push(StreamEvent::End {
                raw: Some(frame.data.clone()),
            });
            self.ended = true;
            return;
        }

        let chunk: ChatChunk = match serde_json::from_str(&frame.data) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::trace!(error = %err, "skipping undecodable frame");
                return;
            }
        };

        if let Some(usage) = chunk.usage {
            self.last_usage = Some(usage);
            out.push(StreamEvent::Usage(usage));
        }

        for choice in chunk.choices.unwrap_or_default() {
            if let Some(text) = choice.delta.and_then(|d| d.content)
                && !text.is_empty()
            {
                out.push(StreamEvent::Content {
                    text,
                    raw: frame.data.clone(),
                });
            }
        }
    }

    fn finish(&mut self, out: &mut Vec<StreamEvent>) {
        if !self.ended {
            self.ended = true;
            out.push(StreamEvent::End { raw: None });
        }
    }
}
