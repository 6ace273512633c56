use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use crate::core::collection::IndexedCollection;
use crate::core::error::{Error, ErrorKind, Result};

/// Transaction ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// One committed version of a collection. Immutable once published.
pub struct Snapshot<O: 'static> {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    collection: Arc<IndexedCollection<O>>,
}

impl<O: 'static> Deref for Snapshot<O> {
    type Target = IndexedCollection<O>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

/// Multi-version control over one collection.
///
/// Writers are serialized. Each write clones the current version, applies the change to
/// the private copy and publishes it; readers holding an older snapshot keep it until
/// they drop it.
pub struct MvccController<O: 'static> {
    current: RwLock<Arc<Snapshot<O>>>,
    writer: Mutex<()>,
    next_tx: AtomicU64,
}

impl<O: Eq + Hash + 'static> MvccController<O> {
    pub fn new(collection: IndexedCollection<O>) -> Self {
        MvccController {
            current: RwLock::new(Arc::new(Snapshot {
                version: 0,
                timestamp: Utc::now(),
                collection: Arc::new(collection),
            })),
            writer: Mutex::new(()),
            next_tx: AtomicU64::new(1),
        }
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot<O>> {
        self.current.read().clone()
    }

    pub fn current_version(&self) -> u64 {
        self.current.read().version
    }

    pub fn next_tx_id(&self) -> TxId {
        TxId(self.next_tx.fetch_add(1, Ordering::SeqCst))
    }

    /// Apply `f` to a copy of the latest version and publish it. Nothing is published when
    /// `f` fails or changes nothing.
    pub fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut IndexedCollection<O>) -> Result<R>,
    {
        let _writer = self.writer.lock();
        self.apply(f)
    }

    /// Like `write`, but fails with `Conflict` if a version newer than `expected` has been
    /// published.
    pub fn write_if_version<R, F>(&self, expected: u64, f: F) -> Result<R>
    where
        F: FnOnce(&mut IndexedCollection<O>) -> Result<R>,
    {
        let _writer = self.writer.lock();
        let current = self.current_version();
        if current != expected {
            return Err(Error::new(
                ErrorKind::Conflict,
                format!("version {} was published after snapshot {}", current, expected),
            ));
        }
        self.apply(f)
    }

    fn apply<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut IndexedCollection<O>) -> Result<R>,
    {
        let base = self.current_snapshot();
        let mut working = IndexedCollection::clone(&base.collection);
        let result = f(&mut working)?;

        if working.mutation_count() != base.collection.mutation_count() {
            let version = base.version + 1;
            *self.current.write() = Arc::new(Snapshot {
                version,
                timestamp: Utc::now(),
                collection: Arc::new(working),
            });
            debug!(version, "published version");
        }
        Ok(result)
    }
}
