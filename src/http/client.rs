use crate::document::{ParsedDocument, parse};
use crate::{EchoError, Result};
use bytes::{Buf, Bytes, BytesMut};
use http::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Configuration for echo clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Read timeout for operations
    pub read_timeout: Duration,
    /// Write timeout for operations
    pub write_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum response size to prevent memory exhaustion
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_response_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// One HTTP response as read off the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, Bytes)>,
    pub body: Bytes,
}

impl RawResponse {
    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Client for talking to an echo backend with raw, possibly malformed,
/// request bytes
///
/// # Examples
///
/// ```no_run
/// use reqecho::http::EchoClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = EchoClient::connect("127.0.0.1:8080".parse()?).await?;
///     let document = client
///         .echo(b"GET /foo?bar=baz HTTP/1.1\r\nHost: example.com\r\n\r\n")
///         .await?;
///     assert_eq!(&document.uri[..], b"/foo?bar=baz");
///     Ok(())
/// }
/// ```
pub struct EchoClient {
    stream: TcpStream,
    buf: BytesMut,
    config: ClientConfig,
}

impl EchoClient {
    /// Connect to a server with custom configuration
    pub async fn connect_with_config(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| EchoError::Timeout("Connection timeout".to_string()))??;
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(8192),
            config,
        })
    }

    /// Connect with default configuration
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    /// Writes `request` verbatim without waiting for a response.
    pub async fn send(&mut self, request: &[u8]) -> Result<()> {
        timeout(self.config.write_timeout, async {
            self.stream.write_all(request).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| EchoError::Timeout("Write timeout".to_string()))??;
        Ok(())
    }

    /// Writes `request` verbatim and reads one response.
    pub async fn send_raw(&mut self, request: &[u8]) -> Result<RawResponse> {
        self.send(request).await?;
        self.read_response().await
    }

    /// Sends `request` and decodes the canonical document from a 200 response.
    pub async fn echo(&mut self, request: &[u8]) -> Result<ParsedDocument> {
        let response = self.send_raw(request).await?;
        if response.status != StatusCode::OK {
            return Err(EchoError::UnexpectedStatus {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(parse(&response.body)?)
    }

    /// Reads the next response, framed by `Content-Length` or by connection
    /// close when the header is absent.
    pub async fn read_response(&mut self) -> Result<RawResponse> {
        let (head_len, status, headers, content_length) = loop {
            let mut slots = [httparse::EMPTY_HEADER; 64];
            let mut response = httparse::Response::new(&mut slots);
            match response.parse(&self.buf) {
                Ok(httparse::Status::Complete(n)) => {
                    let status = StatusCode::from_u16(response.code.unwrap_or(0))
                        .map_err(|e| EchoError::InvalidResponse(e.to_string()))?;
                    let headers: Vec<(String, Bytes)> = response
                        .headers
                        .iter()
                        .map(|h| (h.name.to_string(), Bytes::copy_from_slice(h.value)))
                        .collect();
                    let content_length = headers
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .map(|(_, value)| {
                            std::str::from_utf8(value)
                                .ok()
                                .and_then(|v| v.trim().parse::<usize>().ok())
                                .ok_or_else(|| {
                                    EchoError::InvalidResponse("bad content-length".to_string())
                                })
                        })
                        .transpose()?;
                    break (n, status, headers, content_length);
                }
                Ok(httparse::Status::Partial) => {
                    if self.fill().await? == 0 {
                        return Err(EchoError::InvalidResponse(
                            "connection closed before response head".to_string(),
                        ));
                    }
                }
                Err(e) => return Err(EchoError::InvalidResponse(e.to_string())),
            }
        };
        self.buf.advance(head_len);

        let body = match content_length {
            Some(len) => {
                if len > self.config.max_response_size {
                    return Err(EchoError::InvalidResponse(format!(
                        "Response too large: {} bytes, max allowed: {}",
                        len, self.config.max_response_size
                    )));
                }
                while self.buf.len() < len {
                    if self.fill().await? == 0 {
                        return Err(EchoError::InvalidResponse(
                            "connection closed before response body".to_string(),
                        ));
                    }
                }
                self.buf.split_to(len).freeze()
            }
            None => {
                while self.fill().await? != 0 {}
                self.buf.split().freeze()
            }
        };

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Whether the server has closed the connection, waiting at most `wait`.
    pub async fn is_closed(&mut self, wait: Duration) -> Result<bool> {
        match timeout(wait, self.stream.read_buf(&mut self.buf)).await {
            Ok(Ok(0)) => Ok(true),
            Ok(Ok(_)) => Ok(false),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        if self.buf.len() > self.config.max_response_size {
            return Err(EchoError::InvalidResponse(format!(
                "Response too large: more than {} bytes",
                self.config.max_response_size
            )));
        }
        let n = timeout(self.config.read_timeout, self.stream.read_buf(&mut self.buf))
            .await
            .map_err(|_| EchoError::Timeout("Read timeout".to_string()))??;
        Ok(n)
    }
}
