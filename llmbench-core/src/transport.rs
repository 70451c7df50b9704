use std::future::Future;
use std::sync::Arc;

use llmbench_http::{BodyReader, ClientOptions, HttpClient};

use crate::dialect::{Dialect, DialectError};
use crate::result::SAMPLE_LIMIT;
use crate::workload::WorkloadItem;

/// Live response body handed to the stream decoder.
pub type ByteStream = BodyReader;

/// Where requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub model: String,
    pub token: Option<String>,
    pub default_max_tokens: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] llmbench_http::Error),

    #[error(transparent)]
    Request(#[from] DialectError),
}

impl TransportError {
    /// Stable snake_case label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Http(e) => e.transport_error_kind().into(),
            Self::Request(_) => "request_body",
        }
    }
}

/// Opens one streaming request per workload item.
///
/// The caller owns the deadline: dropping the returned future (or the stream) cancels the request.
pub trait Transport: Send + Sync + 'static {
    fn dialect(&self) -> &dyn Dialect;

    fn model(&self) -> &str;

    fn open(
        &self,
        item: &WorkloadItem,
    ) -> impl Future<Output = Result<ByteStream, TransportError>> + Send;
}

/// HTTP(S) transport speaking one dialect against one target.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
    dialect: Arc<dyn Dialect>,
    target: Target,
}

impl HttpTransport {
    pub fn new(
        target: Target,
        dialect: Arc<dyn Dialect>,
        options: &ClientOptions,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: HttpClient::new(options)?,
            dialect,
            target,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Transport for HttpTransport {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    fn model(&self) -> &str {
        &self.target.model
    }

    async fn open(&self, item: &WorkloadItem) -> Result<ByteStream, TransportError> {
        let req = self.dialect.build_request(&self.target, item)?;
        let res = self.client.send(req).await?;

        if !res.is_success() {
            let status = res.status;
            let body = match res.read_limited(SAMPLE_LIMIT).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => format!("<body unavailable: {err}>"),
            };
            tracing::debug!(id = %item.id, status, "non-success status");
            return Err(TransportError::Status {
                status,
                body: body.trim_end().to_string(),
            });
        }

        Ok(res.into_reader())
    }
}
