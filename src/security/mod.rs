//! Resource limits: field and body size checks, connection admission

pub mod limits;

pub use limits::{ConnectionGuard, ConnectionMetrics, ConnectionTracker, SizeError, SizeValidator};
