use crate::store::StorageStrategy;
use crate::store::memory::DEFAULT_GROWTH_INCREMENT;

/// Limits and storage settings for request accumulation
///
/// # Examples
///
/// ```
/// use reqecho::accumulator::AccumulatorConfig;
/// use reqecho::store::StorageStrategy;
///
/// let config = AccumulatorConfig {
///     max_field_length: 4096,
///     max_body_length: 1024 * 1024,
///     growth_increment: 64 * 1024,
///     storage: StorageStrategy::Spill { threshold: 256 * 1024 },
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorConfig {
    /// Longest accepted method, URI, header name or header value
    pub max_field_length: usize,
    /// Largest accepted body
    pub max_body_length: usize,
    /// Allocation granularity of in-memory body buffers
    pub growth_increment: usize,
    /// Where body bytes are kept while the request streams in
    pub storage: StorageStrategy,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_field_length: 8 * 1024,
            max_body_length: 16 * 1024 * 1024, // 16MB
            growth_increment: DEFAULT_GROWTH_INCREMENT,
            storage: StorageStrategy::Memory,
        }
    }
}

impl AccumulatorConfig {
    /// Rejects settings that would make every request fail.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_field_length == 0 {
            return Err(crate::EchoError::Config(
                "max_field_length must be greater than zero".to_string(),
            ));
        }
        if self.max_body_length == 0 {
            return Err(crate::EchoError::Config(
                "max_body_length must be greater than zero".to_string(),
            ));
        }
        if self.growth_increment == 0 {
            return Err(crate::EchoError::Config(
                "growth_increment must be greater than zero".to_string(),
            ));
        }
        if let StorageStrategy::Spill { threshold } = self.storage {
            if threshold > self.max_body_length {
                return Err(crate::EchoError::Config(format!(
                    "spill threshold {} exceeds max_body_length {}",
                    threshold, self.max_body_length
                )));
            }
        }
        Ok(())
    }
}
