//! Body storage backends
//!
//! A request body arrives as zero or more chunks of unknown total size. The
//! accumulator pushes each chunk into a [`BodyStore`] and materializes the
//! whole body once at end of message. Which backend holds the bytes in the
//! meantime is a configuration choice; the rest of the pipeline only sees
//! `append`, `len` and `materialize`.

pub mod memory;
pub mod spill;


use bytes::Bytes;

pub use memory::MemoryStore;
pub use spill::SpillStore;

/// Errors raised by a body store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not obtain more space. Fails only the current request.
    #[error("allocation of {requested} bytes failed with {held} bytes already stored")]
    Allocation { requested: usize, held: usize },

    /// The spill file could not be created, written or read back
    #[error("spill file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only byte storage for one request body
pub trait BodyStore: Send {
    /// Appends `chunk` after all previously written bytes.
    fn append(&mut self, chunk: &[u8]) -> Result<(), StoreError>;

    /// Number of bytes written so far
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the store and returns every written byte in order.
    fn materialize(self: Box<Self>) -> Result<Bytes, StoreError>;
}

/// Selects the backend used for request bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageStrategy {
    /// Keep the whole body in a growable heap buffer
    #[default]
    Memory,
    /// Buffer in memory up to `threshold` bytes, then move to an anonymous
    /// temporary file
    Spill { threshold: usize },
}

impl StorageStrategy {
    /// Creates an empty store for one request.
    ///
    /// `growth_increment` is the allocation granularity of in-memory buffers and
    /// `limit` the largest body the store will ever be asked to hold.
    pub fn create(self, growth_increment: usize, limit: usize) -> Box<dyn BodyStore> {
        match self {
            StorageStrategy::Memory => Box::new(MemoryStore::new(growth_increment, limit)),
            StorageStrategy::Spill { threshold } => {
                Box::new(SpillStore::new(threshold, growth_increment))
            }
        }
    }
}
