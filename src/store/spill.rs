use super::memory::MemoryStore;
use super::{BodyStore, StoreError};
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// Body store that moves to an anonymous temporary file past a threshold
///
/// Bodies up to `threshold` bytes stay in memory. The first append that would
/// cross it writes everything buffered so far to a temp file and every later
/// chunk goes straight to disk. The file is unlinked on creation and removed by
/// the OS when the store is dropped, including on abort.
///
/// Disk writes and the final read-back are blocking calls. On a multi-threaded
/// tokio runtime they run under [`tokio::task::block_in_place`] so other tasks
/// move off the worker; on a current-thread runtime or outside tokio they
/// block the caller.
#[derive(Debug)]
pub struct SpillStore {
    memory: MemoryStore,
    file: Option<File>,
    threshold: usize,
    len: usize,
}

impl SpillStore {
    pub fn new(threshold: usize, growth_increment: usize) -> Self {
        Self {
            memory: MemoryStore::new(growth_increment, threshold),
            file: None,
            threshold,
            len: 0,
        }
    }

    /// Whether the body has been moved to disk
    pub fn is_spilled(&self) -> bool {
        self.file.is_some()
    }

    fn spill(&mut self) -> Result<(), StoreError> {
        let buffered = self.memory.take();
        let file = blocking(|| -> std::io::Result<File> {
            let mut file = tempfile::tempfile()?;
            file.write_all(&buffered)?;
            Ok(file)
        })?;
        debug!(len = self.len, threshold = self.threshold, "Spilled body to temp file");
        self.file = Some(file);
        Ok(())
    }
}

impl BodyStore for SpillStore {
    fn append(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        if chunk.is_empty() {
            return Ok(());
        }
        if self.file.is_none() {
            if self.len + chunk.len() <= self.threshold {
                self.memory.append(chunk)?;
                self.len += chunk.len();
                return Ok(());
            }
            self.spill()?;
        }
        if let Some(file) = self.file.as_mut() {
            blocking(|| file.write_all(chunk))?;
        }
        self.len += chunk.len();
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn materialize(self: Box<Self>) -> Result<Bytes, StoreError> {
        let Some(mut file) = self.file else {
            return Box::new(self.memory).materialize();
        };
        let len = self.len;
        let body = blocking(move || -> Result<Vec<u8>, StoreError> {
            file.seek(SeekFrom::Start(0))?;
            let mut body = Vec::new();
            body.try_reserve_exact(len)
                .map_err(|_| StoreError::Allocation {
                    requested: len,
                    held: 0,
                })?;
            file.read_to_end(&mut body)?;
            Ok(body)
        })?;
        Ok(Bytes::from(body))
    }
}

/// Runs blocking file I/O without stalling a multi-threaded runtime worker.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
