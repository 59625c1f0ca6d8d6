use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Connection tracking and admission control
///
/// Hands out at most `max_connections` guards at a time. A guard is owned so it
/// can move into the task serving the connection; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionTracker {
    active_connections: Arc<AtomicUsize>,
    total_connections: AtomicU64,
    connection_semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
            total_connections: AtomicU64::new(0),
            connection_semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Claims a connection slot, or `None` when the limit is reached.
    pub fn try_acquire(&self) -> Option<ConnectionGuard> {
        let permit = Arc::clone(&self.connection_semaphore)
            .try_acquire_owned()
            .ok()?;

        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total_connections.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            active_connections = active,
            total_connections = total,
            "Connection acquired"
        );

        Some(ConnectionGuard {
            _permit: permit,
            active_connections: Arc::clone(&self.active_connections),
            start_time: Instant::now(),
        })
    }

    /// Get current metrics
    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            active_connections: self.active_connections.load(Ordering::SeqCst),
            total_connections: self.total_connections.load(Ordering::SeqCst),
            available_slots: self.connection_semaphore.available_permits(),
            max_connections: self.max_connections,
        }
    }
}

/// RAII guard for one admitted connection
#[derive(Debug)]
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    active_connections: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ConnectionGuard {
    /// Active connections including this one
    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_connections.fetch_sub(1, Ordering::SeqCst) - 1;
        let duration = self.start_time.elapsed();

        tracing::debug!(
            active_connections = active,
            connection_duration_ms = duration.as_millis(),
            "Connection released"
        );
    }
}

/// Connection metrics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetrics {
    pub active_connections: usize,
    pub total_connections: u64,
    pub available_slots: usize,
    pub max_connections: usize,
}

/// Upper bound check for a field or body length
#[derive(Debug, Clone, Copy)]
pub struct SizeValidator {
    max_size: usize,
}

impl SizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn validate_size(&self, size: usize) -> Result<(), SizeError> {
        if size > self.max_size {
            Err(SizeError::TooLarge {
                actual: size,
                max: self.max_size,
            })
        } else {
            Ok(())
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("{actual} bytes exceeds the maximum of {max} bytes")]
    TooLarge { actual: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracker() {
        let tracker = ConnectionTracker::new(2);

        // Acquire two connections
        let guard1 = tracker.try_acquire().unwrap();
        let _guard2 = tracker.try_acquire().unwrap();
        assert_eq!(guard1.active(), 2);

        // Third connection is refused
        assert!(tracker.try_acquire().is_none());

        // Drop one guard and try again
        drop(guard1);
        let _guard3 = tracker.try_acquire().unwrap();

        let metrics = tracker.metrics();
        assert_eq!(metrics.active_connections, 2);
        assert_eq!(metrics.total_connections, 3);
        assert_eq!(metrics.available_slots, 0);
        assert_eq!(metrics.max_connections, 2);
    }

    #[tokio::test]
    async fn test_guard_released_from_another_task() {
        let tracker = ConnectionTracker::new(1);
        let guard = tracker.try_acquire().unwrap();

        tokio::spawn(async move { drop(guard) }).await.unwrap();

        assert_eq!(tracker.metrics().active_connections, 0);
        assert!(tracker.try_acquire().is_some());
    }

    #[test]
    fn test_size_validator() {
        let validator = SizeValidator::new(100);

        assert!(validator.validate_size(50).is_ok());
        assert!(validator.validate_size(100).is_ok());
        assert_eq!(
            validator.validate_size(101),
            Err(SizeError::TooLarge { actual: 101, max: 100 })
        );
        assert_eq!(validator.max_size(), 100);
    }
}
