//! HTTP/1.x transport adapter
//!
//! Frames connection bytes into request events with [`RequestCodec`], drives a
//! [`RequestAccumulator`](crate::accumulator::RequestAccumulator) per request
//! and answers through the [`ResponseEmitter`](crate::emitter::ResponseEmitter).
//! [`EchoClient`] is the matching client for tests and diagnostics.

pub mod client;
pub mod codec;
pub mod config;
pub mod server;


pub use client::{ClientConfig, EchoClient, RawResponse};
pub use codec::{CodecError, RequestCodec};
pub use config::{HttpConfig, HttpConfigBuilder};
pub use server::HttpEchoServer;
