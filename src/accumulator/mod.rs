//! Per-request accumulation state machine
//!
//! A [`RequestAccumulator`] is created when the transport has parsed a request
//! head and is fed the rest of the message as events:
//!
//! ```text
//! Init --on_headers--> HeadersReceived --append--> BodyStreaming --on_complete--> BodyComplete
//!   \                        |                          |
//!    `------------------- any failure, on_abort -------------------------------> Error
//! ```
//!
//! Every transport adapter drives the same transitions, whether its engine
//! hands over the whole request at once or streams head, body and completion
//! separately.

pub mod config;


use crate::security::{SizeError, SizeValidator};
use crate::store::{BodyStore, StoreError};
use bytes::{Bytes, BytesMut};
use std::fmt;
use tracing::{debug, error, trace, warn};

pub use config::AccumulatorConfig;

/// HTTP protocol version as a major.minor pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: HttpVersion = HttpVersion { major: 1, minor: 0 };
    pub const HTTP_11: HttpVersion = HttpVersion { major: 1, minor: 1 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// Formats as the protocol token, e.g. `HTTP/1.1`. Versions from 2 onwards
/// have no minor component on the wire and render as `HTTP/2`, `HTTP/3`.
impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major >= 2 && self.minor == 0 {
            write!(f, "HTTP/{}", self.major)
        } else {
            write!(f, "HTTP/{}.{}", self.major, self.minor)
        }
    }
}

/// One header line exactly as the engine delivered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parsed request line and headers handed over by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Bytes,
    /// Request target up to, not including, the first `?`
    pub path: Bytes,
    /// Everything after the first `?`, if the target had one
    pub query: Option<Bytes>,
    pub version: HttpVersion,
    /// Header lines in arrival order, duplicates included
    pub headers: Vec<HeaderField>,
}

/// Fully assembled request, ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: Bytes,
    /// Path joined with `?` and the query when the query is non-empty
    pub uri: Bytes,
    pub version: HttpVersion,
    pub headers: Vec<HeaderField>,
    pub body: Bytes,
}

/// Transition events a transport feeds into an accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    Head(RequestHead),
    Body(Bytes),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Init,
    HeadersReceived,
    BodyStreaming,
    BodyComplete,
    Error,
}

/// Which request field tripped a length limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Method,
    Uri,
    HeaderName,
    HeaderValue,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Method => "method",
            Field::Uri => "uri",
            Field::HeaderName => "header name",
            Field::HeaderValue => "header value",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccumulatorError {
    #[error("{field} too large: {actual} bytes, maximum allowed: {max} bytes")]
    FieldTooLarge {
        field: Field,
        actual: usize,
        max: usize,
    },

    #[error("body too large: {actual} bytes, maximum allowed: {max} bytes")]
    BodyTooLarge { actual: usize, max: usize },

    #[error("body storage failed: {0}")]
    Store(#[from] StoreError),

    /// The transport drove the accumulator out of order: an event after
    /// completion, a second completion, or body before head.
    #[error("invalid transition: {event} in state {state:?}")]
    InvalidTransition {
        event: &'static str,
        state: AccumulatorState,
    },
}

impl AccumulatorError {
    /// Whether this error is a misuse by the caller rather than a property of
    /// the request
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AccumulatorError::InvalidTransition { .. })
    }
}

#[derive(Debug)]
struct Head {
    method: Bytes,
    uri: Bytes,
    version: HttpVersion,
    headers: Vec<HeaderField>,
}

/// Assembles one request from transport events
///
/// One instance per in-flight request; never shared across requests.
///
/// ```
/// use bytes::Bytes;
/// use reqecho::accumulator::{
///     AccumulatorConfig, AccumulatorState, HeaderField, HttpVersion, RequestAccumulator,
///     RequestHead,
/// };
///
/// let mut acc = RequestAccumulator::new(AccumulatorConfig::default());
/// acc.on_headers(RequestHead {
///     method: Bytes::from_static(b"POST"),
///     path: Bytes::from_static(b"/upload"),
///     query: Some(Bytes::from_static(b"id=7")),
///     version: HttpVersion::HTTP_11,
///     headers: vec![HeaderField::new("Host", "example.com")],
/// })
/// .unwrap();
/// acc.append(b"hello ").unwrap();
/// acc.append(b"world").unwrap();
///
/// let request = acc.on_complete().unwrap();
/// assert_eq!(acc.state(), AccumulatorState::BodyComplete);
/// assert_eq!(&request.uri[..], b"/upload?id=7");
/// assert_eq!(&request.body[..], b"hello world");
/// ```
pub struct RequestAccumulator {
    config: AccumulatorConfig,
    fields: SizeValidator,
    body_limit: SizeValidator,
    state: AccumulatorState,
    head: Option<Head>,
    store: Option<Box<dyn BodyStore>>,
}

impl fmt::Debug for RequestAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAccumulator")
            .field("state", &self.state)
            .field("head", &self.head)
            .field("body_len", &self.body_len())
            .finish()
    }
}

impl RequestAccumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            fields: SizeValidator::new(config.max_field_length),
            body_limit: SizeValidator::new(config.max_body_length),
            config,
            state: AccumulatorState::Init,
            head: None,
            store: None,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Body bytes accumulated so far
    pub fn body_len(&self) -> usize {
        self.store.as_ref().map_or(0, |store| store.len())
    }

    /// Applies one transport event. Returns the finished request on `End`.
    pub fn apply(&mut self, event: RequestEvent) -> Result<Option<RawRequest>, AccumulatorError> {
        match event {
            RequestEvent::Head(head) => self.on_headers(head).map(|()| None),
            RequestEvent::Body(chunk) => self.append(&chunk).map(|()| None),
            RequestEvent::End => self.on_complete().map(Some),
        }
    }

    /// Records the request line and headers.
    ///
    /// Joins path and query into the URI here, once: `?` + query is appended
    /// only when the query is non-empty.
    pub fn on_headers(&mut self, head: RequestHead) -> Result<(), AccumulatorError> {
        if self.state != AccumulatorState::Init {
            return Err(self.violation("on_headers"));
        }

        let uri = join_uri(&head.path, head.query.as_deref());
        let checked = self
            .check_field(Field::Method, head.method.len())
            .and_then(|()| self.check_field(Field::Uri, uri.len()))
            .and_then(|()| {
                head.headers.iter().try_for_each(|header| {
                    self.check_field(Field::HeaderName, header.name.len())?;
                    self.check_field(Field::HeaderValue, header.value.len())
                })
            });
        if let Err(e) = checked {
            return Err(self.fail(e));
        }

        trace!(
            method = %String::from_utf8_lossy(&head.method),
            uri_len = uri.len(),
            headers = head.headers.len(),
            "Headers received"
        );
        self.head = Some(Head {
            method: head.method,
            uri,
            version: head.version,
            headers: head.headers,
        });
        self.store = Some(
            self.config
                .storage
                .create(self.config.growth_increment, self.config.max_body_length),
        );
        self.state = AccumulatorState::HeadersReceived;
        Ok(())
    }

    /// Appends a body chunk. An empty chunk changes nothing.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), AccumulatorError> {
        match self.state {
            AccumulatorState::HeadersReceived | AccumulatorState::BodyStreaming => {}
            _ => return Err(self.violation("append")),
        }
        if chunk.is_empty() {
            return Ok(());
        }

        let Some(store) = self.store.as_mut() else {
            return Err(self.violation("append"));
        };
        let total = store.len().saturating_add(chunk.len());
        if let Err(SizeError::TooLarge { actual, max }) = self.body_limit.validate_size(total) {
            return Err(self.fail(AccumulatorError::BodyTooLarge { actual, max }));
        }
        if let Err(e) = store.append(chunk) {
            return Err(self.fail(e.into()));
        }

        self.state = AccumulatorState::BodyStreaming;
        Ok(())
    }

    /// Freezes the body and returns the assembled request.
    ///
    /// Valid exactly once, after the head. Any later event is an
    /// [`AccumulatorError::InvalidTransition`].
    pub fn on_complete(&mut self) -> Result<RawRequest, AccumulatorError> {
        match self.state {
            AccumulatorState::HeadersReceived | AccumulatorState::BodyStreaming => {}
            _ => return Err(self.violation("on_complete")),
        }
        let (Some(head), Some(store)) = (self.head.take(), self.store.take()) else {
            return Err(self.violation("on_complete"));
        };

        let body = match store.materialize() {
            Ok(body) => body,
            Err(e) => return Err(self.fail(e.into())),
        };

        debug!(body_len = body.len(), headers = head.headers.len(), "Request complete");
        self.state = AccumulatorState::BodyComplete;
        Ok(RawRequest {
            method: head.method,
            uri: head.uri,
            version: head.version,
            headers: head.headers,
            body,
        })
    }

    /// Discards everything accumulated so far. No document is ever produced
    /// from an aborted request.
    pub fn on_abort(&mut self) {
        if self.state != AccumulatorState::BodyComplete {
            debug!(state = ?self.state, body_len = self.body_len(), "Request aborted");
            self.head = None;
            self.store = None;
            self.state = AccumulatorState::Error;
        }
    }

    fn check_field(&self, field: Field, len: usize) -> Result<(), AccumulatorError> {
        self.fields
            .validate_size(len)
            .map_err(|SizeError::TooLarge { actual, max }| AccumulatorError::FieldTooLarge {
                field,
                actual,
                max,
            })
    }

    fn fail(&mut self, err: AccumulatorError) -> AccumulatorError {
        warn!(state = ?self.state, error = %err, "Rejecting request");
        self.head = None;
        self.store = None;
        self.state = AccumulatorState::Error;
        err
    }

    fn violation(&self, event: &'static str) -> AccumulatorError {
        error!(event, state = ?self.state, "Accumulator driven out of order");
        AccumulatorError::InvalidTransition {
            event,
            state: self.state,
        }
    }
}

fn join_uri(path: &Bytes, query: Option<&[u8]>) -> Bytes {
    match query {
        Some(query) if !query.is_empty() => {
            let mut uri = BytesMut::with_capacity(path.len() + 1 + query.len());
            uri.extend_from_slice(path);
            uri.extend_from_slice(b"?");
            uri.extend_from_slice(query);
            uri.freeze()
        }
        _ => path.clone(),
    }
}
