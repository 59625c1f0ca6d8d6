use super::codec::{self, CodecError, RequestCodec};
use super::config::HttpConfig;
use crate::accumulator::{RequestAccumulator, RequestEvent};
use crate::common::EchoServerTrait;
use crate::document::render;
use crate::emitter::{Diagnostic, Response, ResponseEmitter, to_error};
use crate::security::ConnectionTracker;
use crate::{EchoError, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, time::timeout};
use tokio_util::codec::Decoder;
use tracing::{Instrument, debug, error, info, warn};

/// HTTP echo server answering every request with its canonical document
///
/// # Examples
///
/// ```no_run
/// use reqecho::common::EchoServerTrait;
/// use reqecho::http::{HttpConfig, HttpEchoServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = HttpConfig::builder()
///         .bind_addr("127.0.0.1:8080".parse()?)
///         .max_body_length(1024 * 1024)
///         .build()?;
///
///     let server = HttpEchoServer::new(config);
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpEchoServer {
    config: Arc<HttpConfig>,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
}

/// Where the connection loop stands with respect to the current request
#[derive(Debug)]
enum InFlight {
    Idle,
    Accumulating {
        accumulator: RequestAccumulator,
        keep_alive: bool,
    },
    /// Already answered with a diagnostic; remaining events of the message are
    /// dropped
    Draining,
}

/// What the connection loop does after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Continue,
    Close,
}

/// A request answered with a diagnostic instead of a document
struct Rejection {
    diagnostic: Diagnostic,
    keep_alive: bool,
    /// Whether the codec has already delivered the end of the message
    message_done: bool,
}

impl Rejection {
    fn new(diagnostic: Diagnostic, keep_alive: bool, message_done: bool) -> Self {
        Self {
            diagnostic,
            keep_alive,
            message_done,
        }
    }
}

impl HttpEchoServer {
    pub fn new(config: HttpConfig) -> Self {
        let (shutdown_signal, _) = tokio::sync::broadcast::channel(1);
        Self {
            config: Arc::new(config),
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "HTTP echo server listening");

        let tracker = ConnectionTracker::new(self.config.max_connections);
        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let Some(guard) = tracker.try_acquire() else {
                                warn!(%addr, limit = self.config.max_connections, "Connection rejected: limit reached");
                                continue;
                            };
                            let current = guard.active();
                            info!(%addr, current, "Accepted connection");

                            let config = Arc::clone(&self.config);
                            let span = tracing::info_span!("connection", %addr);
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, addr, config).await {
                                    error!(%addr, error = %e, "Error handling connection");
                                }
                                drop(guard);
                                info!(%addr, "Connection closed");
                            }.instrument(span));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("HTTP echo server stopped");
        Ok(())
    }

    /// Serves every request on one connection in order
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        config: Arc<HttpConfig>,
    ) -> Result<()> {
        let mut codec = RequestCodec::new(config.max_head_size);
        let mut buf = BytesMut::with_capacity(config.buffer_size);
        let mut in_flight = InFlight::Idle;

        loop {
            loop {
                let event = match codec.decode(&mut buf) {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(e) => {
                        Self::reject_malformed(&mut stream, addr, &config, &mut in_flight, e).await?;
                        return Ok(());
                    }
                };
                match Self::on_event(&mut stream, addr, &config, &mut in_flight, event).await? {
                    Next::Continue => {}
                    Next::Close => return Ok(()),
                }
            }

            let read_result = timeout(config.read_timeout, stream.read_buf(&mut buf)).await;
            match read_result {
                Ok(Ok(0)) => {
                    match codec.decode_eof(&mut buf) {
                        Ok(None) if matches!(in_flight, InFlight::Idle) => {
                            debug!(%addr, "Client closed connection");
                        }
                        _ => {
                            Self::abort(&mut in_flight);
                            warn!(%addr, buffered = buf.len(), "Client closed connection mid-request");
                        }
                    }
                    return Ok(());
                }
                Ok(Ok(n)) => {
                    debug!(%addr, size = n, "Received data");
                }
                Ok(Err(e)) => {
                    Self::abort(&mut in_flight);
                    return Err(e.into());
                }
                Err(_) => {
                    Self::abort(&mut in_flight);
                    warn!(%addr, "Read timeout");
                    return Ok(());
                }
            }
        }
    }

    async fn on_event<W>(
        stream: &mut W,
        addr: SocketAddr,
        config: &HttpConfig,
        in_flight: &mut InFlight,
        event: RequestEvent,
    ) -> Result<Next>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = match (std::mem::replace(in_flight, InFlight::Idle), event) {
            (InFlight::Idle, RequestEvent::Head(head)) => {
                let keep_alive = codec::keep_alive(&head);
                let mut accumulator = RequestAccumulator::new(config.accumulator.clone());
                match accumulator.on_headers(head) {
                    Ok(()) => {
                        *in_flight = InFlight::Accumulating {
                            accumulator,
                            keep_alive,
                        };
                        return Ok(Next::Continue);
                    }
                    Err(e) => Err(Rejection::new(Diagnostic::from(&e), keep_alive, false)),
                }
            }
            (
                InFlight::Accumulating {
                    mut accumulator,
                    keep_alive,
                },
                RequestEvent::Body(chunk),
            ) => match accumulator.append(&chunk) {
                Ok(()) => {
                    *in_flight = InFlight::Accumulating {
                        accumulator,
                        keep_alive,
                    };
                    return Ok(Next::Continue);
                }
                Err(e) => Err(Rejection::new(Diagnostic::from(&e), keep_alive, false)),
            },
            (
                InFlight::Accumulating {
                    mut accumulator,
                    keep_alive,
                },
                RequestEvent::End,
            ) => match accumulator.on_complete() {
                Ok(request) => Ok((render(&request), keep_alive)),
                Err(e) => Err(Rejection::new(Diagnostic::from(&e), keep_alive, true)),
            },
            (InFlight::Draining, RequestEvent::Body(_)) => {
                *in_flight = InFlight::Draining;
                return Ok(Next::Continue);
            }
            (InFlight::Draining, RequestEvent::End) => return Ok(Next::Continue),
            (mut state, event) => {
                // The codec always emits Head, Body*, End; anything else is a bug
                error!(%addr, event = ?event, "Request event out of order");
                Self::abort(&mut state);
                Err(Rejection::new(
                    to_error(StatusCode::INTERNAL_SERVER_ERROR, "request event out of order"),
                    false,
                    true,
                ))
            }
        };

        match outcome {
            Ok((document, keep_alive)) => {
                info!(%addr, size = document.len(), "Echoed request");
                let response = Response::document(document).with_close(!keep_alive);
                Self::send(stream, config, response).await?;
                Ok(if keep_alive { Next::Continue } else { Next::Close })
            }
            Err(rejection) => {
                let diagnostic = rejection.diagnostic;
                warn!(%addr, status = diagnostic.status().as_u16(), reason = diagnostic.message(), "Rejected request");
                let close = config.close_after_error || !rejection.keep_alive;
                let response = Response::diagnostic(diagnostic).with_close(close);
                Self::send(stream, config, response).await?;
                if close {
                    return Ok(Next::Close);
                }
                // Once End has been consumed the next event starts a new request
                if !rejection.message_done {
                    *in_flight = InFlight::Draining;
                }
                Ok(Next::Continue)
            }
        }
    }

    /// Answers a request the codec could not frame. The core never saw it.
    async fn reject_malformed<W>(
        stream: &mut W,
        addr: SocketAddr,
        config: &HttpConfig,
        in_flight: &mut InFlight,
        err: CodecError,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        warn!(%addr, error = %err, "Malformed request");
        let already_answered = matches!(in_flight, InFlight::Draining);
        Self::abort(in_flight);
        if already_answered {
            return Ok(());
        }
        let response =
            Response::diagnostic(to_error(StatusCode::BAD_REQUEST, err.to_string())).with_close(true);
        Self::send(stream, config, response).await
    }

    async fn send<W>(stream: &mut W, config: &HttpConfig, response: Response) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        timeout(config.write_timeout, ResponseEmitter::new(stream).send(response))
            .await
            .map_err(|_| EchoError::Timeout("Write timeout".to_string()))??;
        Ok(())
    }

    fn abort(in_flight: &mut InFlight) {
        if let InFlight::Accumulating { mut accumulator, .. } =
            std::mem::replace(in_flight, InFlight::Idle)
        {
            accumulator.on_abort();
        }
    }
}

#[async_trait]
impl EchoServerTrait for HttpEchoServer {
    /// Binds the configured address and serves until shutdown
    async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| EchoError::Config(format!("Failed to bind HTTP listener: {e}")))?;
        self.serve(listener).await
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
