use std::hash::Hash;
use tracing::debug;
use crate::core::collection::IndexedCollection;
use crate::core::concurrent::ConcurrentIndexedCollection;
use crate::core::error::Result;
use crate::core::transaction::TransactionalIndexedCollection;

/// Anything a batch of objects can be added to in one call
pub trait BatchTarget<O> {
    fn add_batch(&mut self, batch: Vec<O>) -> Result<bool>;
}

impl<O: Eq + Hash + 'static> BatchTarget<O> for &mut IndexedCollection<O> {
    fn add_batch(&mut self, batch: Vec<O>) -> Result<bool> {
        self.add_all(batch)
    }
}

impl<O: Eq + Hash + Send + Sync + 'static> BatchTarget<O> for &ConcurrentIndexedCollection<O> {
    fn add_batch(&mut self, batch: Vec<O>) -> Result<bool> {
        self.add_all(batch)
    }
}

impl<O: Eq + Hash + 'static> BatchTarget<O> for &TransactionalIndexedCollection<O> {
    fn add_batch(&mut self, batch: Vec<O>) -> Result<bool> {
        self.add_all(batch)
    }
}

/// Batch writer for bulk loading.
///
/// Buffers objects and adds them `batch_size` at a time, so a loader pays the per-batch
/// cost (a lock, or a version copy) once per batch instead of once per object.
pub struct BatchWriter<O, T: BatchTarget<O>> {
    target: T,
    buffer: Vec<O>,
    batch_size: usize,
    loaded: usize,
}

impl<O, T: BatchTarget<O>> BatchWriter<O, T> {
    pub fn new(target: T, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BatchWriter {
            target,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            loaded: 0,
        }
    }

    pub fn add(&mut self, object: O) -> Result<()> {
        self.buffer.push(object);

        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Objects buffered and not yet flushed
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let size = batch.len();
        self.target.add_batch(batch)?;
        self.loaded += size;
        debug!(batch = size, loaded = self.loaded, "flushed batch");
        Ok(())
    }

    /// Flush what is left. Returns how many objects were handed to the target.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.loaded)
    }
}
