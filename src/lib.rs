use thiserror::Error;

/// Error types for the reqecho library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket errors (bind, connect, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The transport could not frame a request
    #[error("Codec error: {0}")]
    Codec(#[from] http::CodecError),

    /// A request was rejected while being accumulated
    #[error("Request error: {0}")]
    Accumulator(#[from] accumulator::AccumulatorError),

    /// A canonical document could not be decoded
    #[error("Document error: {0}")]
    Document(#[from] document::DocumentError),

    /// The peer sent something that is not a usable HTTP response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The server answered with something other than 200
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Result type for the reqecho library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod accumulator;
pub mod common;
pub mod document;
pub mod emitter;
pub mod encoding;
pub mod http;
pub mod security;
pub mod store;

// Re-export main types for convenience
pub use accumulator::{
    AccumulatorConfig, AccumulatorError, AccumulatorState, RawRequest, RequestAccumulator,
    RequestEvent, RequestHead,
};
pub use common::EchoServerTrait;
pub use document::{CanonicalDocument, ParsedDocument, render};
pub use emitter::{Response, ResponseEmitter};
pub use http::{EchoClient, HttpConfig, HttpEchoServer};
pub use store::StorageStrategy;
