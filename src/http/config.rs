use crate::accumulator::AccumulatorConfig;
use crate::store::StorageStrategy;
use crate::{EchoError, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the HTTP echo server
///
/// # Examples
///
/// ```rust
/// use reqecho::accumulator::AccumulatorConfig;
/// use reqecho::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     max_connections: 100,
///     buffer_size: 8192,
///     read_timeout: Duration::from_secs(30),
///     write_timeout: Duration::from_secs(30),
///     max_head_size: 64 * 1024,
///     close_after_error: true,
///     accumulator: AccumulatorConfig::default(),
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Read buffer size per connection
    pub buffer_size: usize,
    /// Read timeout for connections
    pub read_timeout: Duration,
    /// Write timeout for connections
    pub write_timeout: Duration,
    /// Largest accepted request line plus headers
    pub max_head_size: usize,
    /// Close the connection after answering a rejected request instead of
    /// draining the rest of the message and serving the next one
    pub close_after_error: bool,
    /// Per-request limits and body storage
    pub accumulator: AccumulatorConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 100,
            buffer_size: 8192, // Larger buffer for HTTP requests
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_head_size: 64 * 1024,
            close_after_error: true,
            accumulator: AccumulatorConfig::default(),
        }
    }
}

impl HttpConfig {
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::new()
    }

    /// Checks that every limit leaves room for at least one request.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(EchoError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(EchoError::Config(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.max_head_size == 0 {
            return Err(EchoError::Config(
                "max_head_size must be greater than zero".to_string(),
            ));
        }
        self.accumulator.validate()
    }
}

/// Builder for server configuration
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn max_head_size(mut self, size: usize) -> Self {
        self.config.max_head_size = size;
        self
    }

    pub fn close_after_error(mut self, close: bool) -> Self {
        self.config.close_after_error = close;
        self
    }

    pub fn max_field_length(mut self, len: usize) -> Self {
        self.config.accumulator.max_field_length = len;
        self
    }

    pub fn max_body_length(mut self, len: usize) -> Self {
        self.config.accumulator.max_body_length = len;
        self
    }

    pub fn growth_increment(mut self, increment: usize) -> Self {
        self.config.accumulator.growth_increment = increment;
        self
    }

    pub fn storage(mut self, storage: StorageStrategy) -> Self {
        self.config.accumulator.storage = storage;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<HttpConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for HttpConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
