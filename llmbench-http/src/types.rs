use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt as _;
use http_body_util::BodyExt as _;
use hyper::body::Incoming;
use tokio::io::AsyncBufRead;
use tokio_util::io::StreamReader;

use super::Result;

/// Buffered byte reader over a live response body.
pub type BodyReader = Pin<Box<dyn AsyncBufRead + Send>>;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: http::Method::GET,
            url: url.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn post(url: &str, body: Bytes) -> Self {
        Self {
            method: http::Method::POST,
            url: url.to_string(),
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// A response whose head has arrived but whose body is still streaming.
#[derive(Debug)]
pub struct HttpStreamResponse {
    pub status: u16,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    body: Incoming,
}

impl HttpStreamResponse {
    pub(crate) fn new(status: u16, headers: Vec<(String, String)>, body: Incoming) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Read at most `limit` bytes of the body and drop the rest.
    pub async fn read_limited(self, limit: usize) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while buf.len() < limit {
            let Some(frame) = body.frame().await else {
                break;
            };
            if let Ok(data) = frame?.into_data() {
                let take = data.len().min(limit - buf.len());
                buf.extend_from_slice(&data[..take]);
            }
        }
        Ok(buf.freeze())
    }

    /// Turn the body into an incremental reader. Bytes are surfaced as they arrive.
    pub fn into_reader(self) -> BodyReader {
        let stream = self.body.into_data_stream().map_err(std::io::Error::other);
        Box::pin(StreamReader::new(stream))
    }
}
