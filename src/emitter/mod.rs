//! One-shot response framing
//!
//! Each request ends in exactly one [`Response`]: the canonical document with
//! status 200, or a plain-text diagnostic with an error status. Responses are
//! fully buffered so `Content-Length` is always exact, and sending consumes
//! both the response and the [`ResponseEmitter`], so a second response for
//! the same request cannot be written.


use crate::accumulator::AccumulatorError;
use crate::document::CanonicalDocument;
use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Error status and message for a request that produced no document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    status: StatusCode,
    message: String,
}

impl Diagnostic {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&AccumulatorError> for Diagnostic {
    fn from(err: &AccumulatorError) -> Self {
        let status = if err.is_contract_violation() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_REQUEST
        };
        to_error(status, err.to_string())
    }
}

/// Builds a diagnostic. Statuses outside 4xx/5xx become 500.
pub fn to_error(code: StatusCode, message: impl Into<String>) -> Diagnostic {
    let status = if code.is_client_error() || code.is_server_error() {
        code
    } else {
        warn!(status = code.as_u16(), "Non-error status for diagnostic, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Diagnostic {
        status,
        message: message.into(),
    }
}

/// A complete, framed HTTP/1.1 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
    close: bool,
}

impl Response {
    /// 200 response carrying `document` as `application/json`
    pub fn document(document: CanonicalDocument) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: JSON_CONTENT_TYPE,
            body: document.into_bytes(),
            close: false,
        }
    }

    /// Error response carrying the diagnostic message as plain text
    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Self {
            status: diagnostic.status,
            content_type: TEXT_CONTENT_TYPE,
            body: Bytes::from(diagnostic.message),
            close: false,
        }
    }

    /// Marks the connection to be closed after this response.
    pub fn with_close(mut self, close: bool) -> Self {
        self.close = close;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn closes_connection(&self) -> bool {
        self.close
    }

    /// Serializes status line, headers and body into one buffer.
    pub fn to_bytes(&self) -> Bytes {
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        put_header(&mut out, CONTENT_TYPE.as_str(), self.content_type);
        put_header(&mut out, CONTENT_LENGTH.as_str(), &self.body.len().to_string());
        if self.close {
            put_header(&mut out, CONNECTION.as_str(), "close");
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}

/// Writes the single response for one request
pub struct ResponseEmitter<'a, W> {
    writer: &'a mut W,
}

impl<'a, W> ResponseEmitter<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    /// Writes and flushes `response`.
    pub async fn send(self, response: Response) -> std::io::Result<()> {
        let bytes = response.to_bytes();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        debug!(
            status = response.status.as_u16(),
            body_len = response.body.len(),
            close = response.close,
            "Response sent"
        );
        Ok(())
    }
}
