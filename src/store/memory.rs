use super::{BodyStore, StoreError};
use bytes::Bytes;
use tracing::trace;

/// Default allocation granularity for in-memory bodies (64 KiB)
pub const DEFAULT_GROWTH_INCREMENT: usize = 64 * 1024;

/// Growable in-memory body buffer
///
/// Capacity grows in multiples of `growth_increment` and at least doubles on
/// every reallocation, so appends are amortized O(1) whether the body arrives
/// as one chunk or thousands. Capacity is never reserved past `limit` unless a
/// single append needs it.
///
/// ```
/// use reqecho::store::{BodyStore, MemoryStore};
///
/// let mut store = MemoryStore::new(16, 1024);
/// store.append(b"hello ").unwrap();
/// store.append(b"world").unwrap();
/// assert_eq!(store.len(), 11);
/// assert_eq!(&Box::new(store).materialize().unwrap()[..], b"hello world");
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    buf: Vec<u8>,
    growth_increment: usize,
    limit: usize,
}

impl MemoryStore {
    pub fn new(growth_increment: usize, limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            growth_increment: growth_increment.max(1),
            limit,
        }
    }

    /// Currently reserved capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Takes the buffered bytes out of the store, leaving it empty.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    fn next_capacity(&self, required: usize) -> usize {
        let doubled = self.buf.capacity().saturating_mul(2);
        let target = required.max(doubled).min(self.limit.max(required));
        let rounded = target
            .div_ceil(self.growth_increment)
            .saturating_mul(self.growth_increment);
        rounded.min(self.limit.max(required))
    }

    pub(super) fn grow(&mut self, required: usize) -> Result<(), StoreError> {
        let new_capacity = self.next_capacity(required);
        let additional = new_capacity - self.buf.len();
        self.buf
            .try_reserve_exact(additional)
            .map_err(|_| StoreError::Allocation {
                requested: new_capacity,
                held: self.buf.len(),
            })?;
        trace!(
            len = self.buf.len(),
            capacity = self.buf.capacity(),
            "Grew body buffer"
        );
        Ok(())
    }
}

impl BodyStore for MemoryStore {
    fn append(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let required = self
            .buf
            .len()
            .checked_add(chunk.len())
            .ok_or(StoreError::Allocation {
                requested: usize::MAX,
                held: self.buf.len(),
            })?;
        if required > self.buf.capacity() {
            self.grow(required)?;
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn materialize(self: Box<Self>) -> Result<Bytes, StoreError> {
        Ok(Bytes::from(self.buf))
    }
}
