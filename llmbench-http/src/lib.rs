#![forbid(unsafe_code)]

mod client;
mod error;
mod tls;
mod types;
mod util;

pub use client::{ClientOptions, HttpClient};
pub use error::{Error, HttpTransportErrorKind, Result};
pub use tls::TlsOptions;
pub use types::{BodyReader, HttpRequest, HttpStreamResponse};
