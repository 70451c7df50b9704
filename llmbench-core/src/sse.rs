//! Incremental `text/event-stream` decoding.
//!
//! The decoder only knows the line grammar (fields, comments, blank-line boundaries). It does not
//! interpret payloads; recognizing sentinels such as `[DONE]` is left to a dialect normalizer.

use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

/// One decoded event block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    /// All `data:` lines of the block joined with `\n`.
    pub data: String,
    pub retry: Option<u64>,
}

impl SseFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Serialize the frame back into wire form, terminated by a blank line.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 16);
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        if let Some(retry) = self.retry {
            out.push_str(&format!("retry: {retry}\n"));
        }

        let header_only = self.data.is_empty() && (self.id.is_some() || self.event.is_some());
        if !header_only {
            for line in self.data.split('\n') {
                out.push_str("data: ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, Default)]
struct PendingFrame {
    id: Option<String>,
    event: Option<String>,
    data: String,
    has_data: bool,
    retry: Option<u64>,
}

impl PendingFrame {
    fn apply(&mut self, field: &str, value: &str) {
        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn take(&mut self) -> Option<SseFrame> {
        let pending = std::mem::take(self);
        if !pending.has_data && pending.id.is_none() && pending.event.is_none() {
            return None;
        }

        Some(SseFrame {
            id: pending.id,
            event: pending.event,
            data: pending.data,
            retry: pending.retry,
        })
    }
}

/// Pull-based decoder over a buffered byte source.
///
/// Lines are read with `read_until`, so a single field may be arbitrarily long.
#[derive(Debug)]
pub struct SseDecoder<R> {
    reader: R,
    line: Vec<u8>,
    finished: bool,
}

impl<R> SseDecoder<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            finished: false,
        }
    }

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A trailing frame without a terminating
    /// blank line is still returned once before that.
    pub async fn next(&mut self) -> std::io::Result<Option<SseFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut pending = PendingFrame::default();
        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            if n == 0 {
                self.finished = true;
                return Ok(pending.take());
            }

            let raw = trim_line_ending(&self.line);
            if raw.is_empty() {
                match pending.take() {
                    Some(frame) => return Ok(Some(frame)),
                    None => continue,
                }
            }

            // Comment / keep-alive.
            if raw[0] == b':' {
                continue;
            }

            let line = String::from_utf8_lossy(raw);
            match line.find(':') {
                Some(idx) => {
                    let value = &line[idx + 1..];
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    pending.apply(&line[..idx], value);
                }
                None => pending.apply(&line, ""),
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode every frame from `reader`.
pub async fn read_all<R>(reader: R) -> std::io::Result<Vec<SseFrame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut decoder = SseDecoder::new(reader);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next().await? {
        frames.push(frame);
    }
    Ok(frames)
}

/// Parse a single, already delimited event block.
///
/// Unlike [`SseDecoder`], lines without a colon are ignored here.
pub fn parse_block(block: &str) -> SseFrame {
    let mut pending = PendingFrame::default();
    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some(idx) = line.find(':') else {
            continue;
        };
        let value = &line[idx + 1..];
        pending.apply(&line[..idx], value.strip_prefix(' ').unwrap_or(value));
    }
    pending.take().unwrap_or_default()
}
