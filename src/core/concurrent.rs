use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::Deref;
use parking_lot::{RwLock, RwLockReadGuard};
use crate::core::collection::IndexedCollection;
use crate::core::config::CollectionConfig;
use crate::core::error::Result;
use crate::core::stats::CollectionStats;
use crate::index::Index;
use crate::query::options::QueryOptions;
use crate::reader::reader_pool::{ReaderPool, ReaderSlot};

/// Collection shared between threads: many readers or one writer at a time.
///
/// Reads happen inside a read section opened with [`reader`](Self::reader). A mutation
/// blocks until every open read section has ended, then applies storage and every
/// index as one unit, so a reader never observes a half-applied batch.
///
/// A thread must not mutate while it holds a `CollectionReader` of the same collection;
/// the mutation would wait on its own read section forever. Nested read sections on one
/// thread are fine: read sections and `stats` enter even while a writer is queued, so a
/// waiting writer can starve behind a steady stream of readers.
pub struct ConcurrentIndexedCollection<O: 'static> {
    inner: RwLock<IndexedCollection<O>>,
    readers: ReaderPool,
}

/// Open read section. Queries run against the collection through `Deref`; result sets
/// borrow the reader and cannot outlive it.
pub struct CollectionReader<'c, O: 'static> {
    guard: RwLockReadGuard<'c, IndexedCollection<O>>,
    _slot: ReaderSlot<'c>,
}

impl<O: Eq + Hash + Send + Sync + 'static> ConcurrentIndexedCollection<O> {
    pub fn new() -> Self {
        Self::from_collection(IndexedCollection::new())
    }

    pub fn with_config(config: CollectionConfig) -> Result<Self> {
        Ok(Self::from_collection(IndexedCollection::with_config(config)?))
    }

    /// Share an existing collection, keeping its objects and indexes
    pub fn from_collection(collection: IndexedCollection<O>) -> Self {
        let config = collection.config();
        let readers = ReaderPool::new(config.max_readers, config.reader_wait_ms);
        ConcurrentIndexedCollection {
            inner: RwLock::new(collection),
            readers,
        }
    }

    /// Open a read section. Fails with `ResourceExhausted` when every slot stays busy
    /// for longer than `reader_wait_ms`.
    pub fn reader(&self) -> Result<CollectionReader<'_, O>> {
        let slot = self.readers.acquire()?;
        Ok(CollectionReader {
            guard: self.inner.read_recursive(),
            _slot: slot,
        })
    }

    pub fn add(&self, object: O) -> Result<bool> {
        self.inner.write().add(object)
    }

    pub fn add_all<I: IntoIterator<Item = O>>(&self, objects: I) -> Result<bool> {
        self.inner.write().add_all(objects)
    }

    pub fn remove(&self, object: &O) -> Result<bool> {
        self.inner.write().remove(object)
    }

    pub fn remove_all<I>(&self, objects: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Borrow<O>,
    {
        self.inner.write().remove_all(objects)
    }

    pub fn update<R, A>(&self, to_remove: R, to_add: A, options: &QueryOptions<O>) -> Result<bool>
    where
        R: IntoIterator,
        R::Item: Borrow<O>,
        A: IntoIterator<Item = O>,
    {
        self.inner.write().update(to_remove, to_add, options)
    }

    pub fn clear(&self) {
        self.inner.write().clear()
    }

    pub fn add_index<I: Index<O> + 'static>(&self, index: I, options: &QueryOptions<O>) -> Result<()> {
        self.inner.write().add_index(index, options)
    }

    pub fn remove_index(&self, name: &str) -> Result<Box<dyn Index<O>>> {
        self.inner.write().remove_index(name)
    }

    pub fn stats(&self) -> CollectionStats {
        let mut stats = self.inner.read_recursive().stats();
        stats.active_readers = Some(self.readers.active());
        stats.max_readers = Some(self.readers.max_readers());
        stats
    }

    /// Take the collection back out, e.g. to hand it to a single owner again
    pub fn into_inner(self) -> IndexedCollection<O> {
        self.inner.into_inner()
    }
}

impl<O: Eq + Hash + Send + Sync + 'static> Default for ConcurrentIndexedCollection<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: 'static> Deref for CollectionReader<'_, O> {
    type Target = IndexedCollection<O>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::index::hash::HashIndex;
    use crate::query::ast::Query;
    use crate::query::attribute::Attribute;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Car {
        id: u32,
        model: &'static str,
    }

    fn model() -> Attribute<Car> {
        Attribute::simple("model", |c: &Car| c.model)
    }

    #[test]
    fn readers_see_committed_batches() {
        let collection = ConcurrentIndexedCollection::new();
        collection.add_index(HashIndex::on(&model()), &QueryOptions::new()).unwrap();
        collection.add_all((0..10).map(|id| Car { id, model: "Civic" })).unwrap();

        let reader = collection.reader().unwrap();
        let set = reader.retrieve(&Query::equal(&model(), "Civic"), &QueryOptions::new()).unwrap();
        assert_eq!(set.size(), 10);
        assert_eq!(collection.stats().active_readers, Some(1));
        drop(set);
        drop(reader);

        collection.remove(&Car { id: 0, model: "Civic" }).unwrap();
        assert_eq!(collection.reader().unwrap().len(), 9);
        assert!(collection.stats().health().is_healthy());
    }

    #[test]
    fn reader_slots_are_bounded() {
        let config = CollectionConfig { max_readers: 1, reader_wait_ms: 5, ..CollectionConfig::default() };
        let collection: ConcurrentIndexedCollection<Car> = ConcurrentIndexedCollection::with_config(config).unwrap();
        let _open = collection.reader().unwrap();
        let err = collection.reader().err().unwrap();
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);
        assert!(!collection.stats().health().is_healthy());
    }

    #[test]
    fn writer_waits_for_open_readers() {
        let collection = ConcurrentIndexedCollection::new();
        collection.add(Car { id: 0, model: "Civic" }).unwrap();
        std::thread::scope(|s| {
            let reader = collection.reader().unwrap();
            let writer = s.spawn(|| collection.add(Car { id: 1, model: "Focus" }));
            std::thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(reader.len(), 1);
            drop(reader);
            assert!(writer.join().unwrap().unwrap());
        });
        assert_eq!(collection.reader().unwrap().len(), 2);
    }

    #[test]
    fn nested_reader_does_not_queue_behind_writer() {
        let collection = ConcurrentIndexedCollection::new();
        collection.add(Car { id: 0, model: "Civic" }).unwrap();
        std::thread::scope(|s| {
            let outer = collection.reader().unwrap();
            let writer = s.spawn(|| collection.add(Car { id: 1, model: "Focus" }));
            std::thread::sleep(std::time::Duration::from_millis(20));

            // The writer is now waiting on `outer`
            let inner = collection.reader().unwrap();
            assert_eq!(inner.len(), 1);
            assert_eq!(collection.stats().active_readers, Some(2));
            drop(inner);
            drop(outer);
            assert!(writer.join().unwrap().unwrap());
        });
        assert_eq!(collection.reader().unwrap().len(), 2);
    }
}
